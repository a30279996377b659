use routing_service::RoutingError;
use shared::VehicleId;
use telemetry_service::TelemetryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(VehicleId),

    #[error("Unknown hub: {0}")]
    UnknownHub(String),

    #[error("Catalog has no {0}")]
    EmptyCatalog(&'static str),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid speed multiplier: {0}")]
    InvalidSpeed(f64),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Route index {index} outside route of {len} waypoints")]
    RouteIndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl SimulationError {
    /// True for errors caused by bad caller input rather than state or
    /// configuration.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SimulationError::InvalidInterval(_)
                | SimulationError::InvalidSpeed(_)
                | SimulationError::InvalidCoordinates(_)
        )
    }
}
