use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use simulation_service::SimulationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Simulation(e) => match e {
                SimulationError::VehicleNotFound(_) | SimulationError::UnknownHub(_) => {
                    StatusCode::NOT_FOUND
                }
                SimulationError::InvalidInterval(_)
                | SimulationError::InvalidSpeed(_)
                | SimulationError::InvalidCoordinates(_) => StatusCode::BAD_REQUEST,
                SimulationError::Routing(_) => StatusCode::BAD_GATEWAY,
                SimulationError::EmptyCatalog(_)
                | SimulationError::RouteIndexOutOfRange { .. }
                | SimulationError::Telemetry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
