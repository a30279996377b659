use crate::error::ApiError;
use crate::websocket::forward_events;
use alerts_service::{MaintenanceRecord, Notification, TimelineEvent};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use prediction_service::Prediction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{ChangeKind, GeoPoint, Vehicle, VehicleId};
use simulation_service::{RegisterVehicle, SimulationClock, SimulationError, TickPipeline};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<SimulationClock>,
}

impl AppState {
    pub fn new(clock: Arc<SimulationClock>) -> Self {
        Self { clock }
    }

    fn pipeline(&self) -> &Arc<TickPipeline> {
        self.clock.pipeline()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/simulation/interval", get(get_interval).put(set_interval))
        .route("/simulation/speed", put(set_speed))
        .route("/simulation/start", post(start_simulation))
        .route("/simulation/stop", post(stop_simulation))
        .route("/vehicles", get(list_vehicles).post(create_vehicle))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/vehicles/:id/route", post(create_route))
        .route("/vehicles/:id/telemetry", post(measure_vehicle))
        .route("/predictions", get(list_predictions))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        .route("/notifications/:id", delete(dismiss_notification))
        .route("/timeline", get(get_timeline))
        .route("/maintenance-history", post(seed_maintenance_history))
        .route("/events", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub interval: u64,
    pub running: bool,
    pub ticks: u64,
}

async fn status(state: &AppState) -> SimulationStatus {
    SimulationStatus {
        interval: state.clock.configured_interval(),
        running: state.clock.is_running().await,
        ticks: state.clock.tick_count(),
    }
}

async fn get_interval(State(state): State<AppState>) -> Json<SimulationStatus> {
    Json(status(&state).await)
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub interval: Value,
}

/// Accepts a positive whole number of milliseconds, as a JSON number or a
/// numeric string.
fn parse_interval(value: &Value) -> Result<u64, ApiError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ApiError::Simulation(SimulationError::InvalidInterval(format!(
            "interval must be a positive whole number of milliseconds, got {value}"
        )))
    })
}

async fn set_interval(
    State(state): State<AppState>,
    Json(req): Json<IntervalRequest>,
) -> Result<Json<SimulationStatus>, ApiError> {
    let ms = parse_interval(&req.interval)?;
    state.clock.set_interval(ms).await?;
    Ok(Json(status(&state).await))
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    pub multiplier: f64,
}

async fn set_speed(
    State(state): State<AppState>,
    Json(req): Json<SpeedRequest>,
) -> Result<Json<SimulationStatus>, ApiError> {
    state.clock.set_speed(req.multiplier).await?;
    Ok(Json(status(&state).await))
}

async fn start_simulation(State(state): State<AppState>) -> Json<SimulationStatus> {
    state.clock.start().await;
    Json(status(&state).await)
}

async fn stop_simulation(State(state): State<AppState>) -> Json<SimulationStatus> {
    state.clock.stop().await;
    Json(status(&state).await)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVehicleRequest {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TryFrom<CreateVehicleRequest> for RegisterVehicle {
    type Error = ApiError;

    fn try_from(req: CreateVehicleRequest) -> Result<Self, Self::Error> {
        let position = match (req.latitude, req.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            (None, None) => None,
            _ => {
                return Err(SimulationError::InvalidCoordinates(
                    "latitude and longitude must be given together".to_string(),
                )
                .into())
            }
        };
        Ok(RegisterVehicle {
            name: req.name,
            position,
        })
    }
}

async fn create_vehicle(
    State(state): State<AppState>,
    Json(req): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    let pipeline = state.pipeline();
    let vehicle = pipeline.fleet().register_vehicle(req.try_into()?)?;
    pipeline.publisher().publish(vehicle.id, ChangeKind::Registered);
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<Vehicle>> {
    Json(state.pipeline().fleet().snapshot())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleView {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub predictions: Vec<Prediction>,
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Result<Json<VehicleView>, ApiError> {
    let pipeline = state.pipeline();
    let vehicle = pipeline
        .fleet()
        .get(id)
        .ok_or(SimulationError::VehicleNotFound(id))?;
    Ok(Json(VehicleView {
        vehicle,
        predictions: pipeline.board().for_vehicle(id),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteRequest {
    pub destination: Option<String>,
}

async fn create_route(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    body: Option<Json<RouteRequest>>,
) -> Result<Json<Vehicle>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let pipeline = state.pipeline();
    let vehicle = pipeline
        .fleet()
        .create_route(pipeline.routes(), id, req.destination.as_deref())
        .await?;
    pipeline.publisher().publish(id, ChangeKind::RouteAssigned);
    Ok(Json(vehicle))
}

async fn measure_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Result<Json<Vehicle>, ApiError> {
    Ok(Json(state.pipeline().measure(id)?))
}

async fn list_predictions(State(state): State<AppState>) -> Json<Vec<Prediction>> {
    Json(state.pipeline().board().all())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

async fn list_notifications(State(state): State<AppState>) -> Json<NotificationList> {
    let store = state.pipeline().deriver().store();
    Json(NotificationList {
        notifications: store.live(),
        unread_count: store.unread_count(),
    })
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.pipeline().deriver().store().mark_read(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Notification {id} not found")))
    }
}

async fn dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.pipeline().deriver().store().dismiss(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Notification {id} not found")))
    }
}

async fn get_timeline(State(state): State<AppState>) -> Json<Vec<TimelineEvent>> {
    Json(state.pipeline().deriver().timeline().snapshot())
}

async fn seed_maintenance_history(
    State(state): State<AppState>,
    Json(records): Json<Vec<MaintenanceRecord>>,
) -> Json<Value> {
    let seeded = state.pipeline().deriver().timeline().seed_history(records);
    Json(serde_json::json!({ "seeded": seeded }))
}

async fn events(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.pipeline().publisher().subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}
