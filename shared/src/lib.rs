pub mod catalog;
pub mod config;
pub mod events;
pub mod logger;
pub mod types;


pub use catalog::{Catalog, Hub, VehicleModel};
pub use config::FleetConfig;
pub use events::{ChangeKind, EventPublisher, VehicleChanged};
pub use types::{
    GeoPoint, MetricKind, MetricPoint, MetricState, Route, RouteKind, SensorDefinition, Severity,
    TelemetryReading, Thresholds, Vehicle, VehicleDetails, VehicleId,
};
