use crate::engine::RouteEngine;
use crate::provider::{OsrmClient, ResolvedPath, RouteProvider, RoutingError};
use crate::synthetic::curved_route;
use async_trait::async_trait;
use serde_json::json;
use shared::config::RoutingConfig;
use shared::{GeoPoint, Route, Vehicle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Provider doubles
// ============================================================================

struct FixedProvider {
    points: usize,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn new(points: usize) -> Self {
        Self {
            points,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RouteProvider for FixedProvider {
    async fn route(&self, from: GeoPoint, _to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResolvedPath {
            waypoints: line(from, self.points),
            distance_m: 1000.0 * self.points as f64,
            duration_s: 60.0 * self.points as f64,
        })
    }
}

struct FailingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl RouteProvider for FailingProvider {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RoutingError::Provider {
            code: "NoRoute".to_string(),
            message: "Impossible route between points".to_string(),
        })
    }
}

/// Holds every request until released.
struct GatedProvider {
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl RouteProvider for GatedProvider {
    async fn route(&self, from: GeoPoint, _to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(ResolvedPath {
            waypoints: line(from, 8),
            distance_m: 8000.0,
            duration_s: 480.0,
        })
    }
}

struct PanickingProvider;

#[async_trait]
impl RouteProvider for PanickingProvider {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        panic!("provider bug")
    }
}

fn line(start: GeoPoint, n: usize) -> Vec<GeoPoint> {
    (0..n).map(|i| start.offset(0.001 * i as f64, 0.0)).collect()
}

fn vehicle_on(route: Route) -> Vehicle {
    let mut vehicle = Vehicle::new("Van", GeoPoint::new(52.0, 13.0));
    vehicle.assign_route(route);
    vehicle
}

fn engine_with(provider: Arc<dyn RouteProvider>) -> RouteEngine {
    RouteEngine::new(provider, Duration::from_secs(30))
}

async fn settle(engine: &RouteEngine) {
    for _ in 0..100 {
        if engine.pending_count() == 0 {
            return;
        }
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Advance
// ============================================================================

#[test]
fn test_advance_without_route_is_noop() {
    let engine = engine_with(Arc::new(FixedProvider::new(3)));
    let mut vehicle = Vehicle::new("Van", GeoPoint::new(52.0, 13.0));
    let before = vehicle.clone();

    engine.advance(&mut vehicle);

    assert_eq!(vehicle, before);
}

#[test]
fn test_advance_moves_one_waypoint() {
    let engine = engine_with(Arc::new(FixedProvider::new(3)));
    let points = line(GeoPoint::new(52.0, 13.0), 5);
    let mut vehicle = vehicle_on(Route::resolved(points.clone(), 0.0, 0.0));

    engine.advance(&mut vehicle);

    assert_eq!(vehicle.route_index, 1);
    assert_eq!(vehicle.position, points[1]);
    assert!(vehicle.moving);
}

#[test]
fn test_advance_loops_past_last_waypoint() {
    let engine = engine_with(Arc::new(FixedProvider::new(3)));
    let points = line(GeoPoint::new(52.0, 13.0), 5);
    let mut vehicle = vehicle_on(Route::resolved(points.clone(), 0.0, 0.0));

    for _ in 0..4 {
        engine.advance(&mut vehicle);
    }
    assert_eq!(vehicle.route_index, 4);

    engine.advance(&mut vehicle);
    assert_eq!(vehicle.route_index, 0);
    assert_eq!(vehicle.position, points[0]);
    assert!(vehicle.moving);
    assert!(vehicle.route.is_some());
}

#[test]
fn test_route_index_stays_in_range() {
    let engine = engine_with(Arc::new(FixedProvider::new(3)));
    let mut vehicle = vehicle_on(Route::resolved(line(GeoPoint::new(0.0, 0.0), 7), 0.0, 0.0));

    for _ in 0..100 {
        engine.advance(&mut vehicle);
        let len = vehicle.route.as_ref().map(|r| r.len()).unwrap_or(0);
        assert!(vehicle.route_index < len);
    }
}

#[test]
fn test_advance_outside_runtime_does_not_dispatch() {
    let provider = Arc::new(FixedProvider::new(3));
    let engine = engine_with(provider.clone());
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    engine.advance(&mut vehicle);

    assert_eq!(vehicle.route_index, 1);
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// External resolution
// ============================================================================

#[tokio::test]
async fn test_resolution_preserves_progress() {
    let engine = engine_with(Arc::new(FixedProvider::new(40)));
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 10)));
    vehicle.route_index = 5;

    let handle = engine.resolve_external_route(&vehicle).expect("dispatched");
    handle.await.unwrap();

    assert!(engine.apply_resolved(&mut vehicle));
    let route = vehicle.route.as_ref().unwrap();
    assert!(!route.is_synthetic());
    assert_eq!(route.len(), 40);
    assert_eq!(vehicle.route_index, 20);
    assert_eq!(vehicle.position, route.waypoints[20]);
}

#[tokio::test]
async fn test_resolution_index_matches_progress_ratio() {
    for (old_len, old_index, new_len) in [(10, 0, 7), (10, 9, 7), (3, 1, 100), (25, 13, 26), (7, 6, 2)] {
        let engine = engine_with(Arc::new(FixedProvider::new(new_len)));
        let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), old_len)));
        vehicle.route_index = old_index;

        engine.resolve_external_route(&vehicle).unwrap().await.unwrap();
        engine.apply_resolved(&mut vehicle);

        let ratio = old_index as f64 / old_len as f64;
        let expected = (ratio * new_len as f64).floor() as i64;
        let actual = vehicle.route_index as i64;
        assert!((actual - expected).abs() <= 1, "{} vs {}", actual, expected);
        assert!(vehicle.route_index < new_len);
    }
}

#[tokio::test]
async fn test_second_request_while_pending_is_noop() {
    let provider = Arc::new(GatedProvider {
        gate: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(provider.clone());
    let vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    let first = engine.resolve_external_route(&vehicle);
    let second = engine.resolve_external_route(&vehicle);

    assert!(first.is_some());
    assert!(second.is_none());
    assert!(engine.is_pending(vehicle.id));

    provider.gate.notify_one();
    first.unwrap().await.unwrap();

    assert!(!engine.is_pending(vehicle.id));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_advance_applies_resolution_on_next_step() {
    let engine = engine_with(Arc::new(FixedProvider::new(20)));
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 10)));

    engine.advance(&mut vehicle); // index 1, dispatches
    settle(&engine).await;
    assert!(vehicle.route.as_ref().unwrap().is_synthetic());

    engine.advance(&mut vehicle); // applies at index 1 -> 2, then steps to 3
    let route = vehicle.route.as_ref().unwrap();
    assert!(!route.is_synthetic());
    assert_eq!(vehicle.route_index, 3);
}

#[tokio::test]
async fn test_failed_resolution_keeps_synthetic_route() {
    let provider = Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(provider.clone());
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    engine.advance(&mut vehicle);
    settle(&engine).await;
    engine.advance(&mut vehicle);

    assert!(vehicle.route.as_ref().unwrap().is_synthetic());
    assert_eq!(vehicle.route_index, 2);
    assert!(!engine.is_pending(vehicle.id));
}

#[tokio::test(start_paused = true)]
async fn test_failed_resolution_backs_off() {
    let provider = Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(provider.clone());
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    engine.advance(&mut vehicle);
    settle(&engine).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    engine.advance(&mut vehicle);
    settle(&engine).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    engine.advance(&mut vehicle);
    settle(&engine).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_panicking_provider_releases_vehicle() {
    let engine = engine_with(Arc::new(PanickingProvider));
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    let handle = engine.resolve_external_route(&vehicle).unwrap();
    assert!(handle.await.unwrap_err().is_panic());
    assert!(!engine.is_pending(vehicle.id));

    // counted as a failure, so the next step waits out the backoff
    engine.advance(&mut vehicle);
    assert_eq!(engine.pending_count(), 0);
    assert!(vehicle.route.as_ref().unwrap().is_synthetic());
    assert_eq!(vehicle.route_index, 1);
}

#[tokio::test]
async fn test_aborted_resolution_releases_vehicle() {
    let provider = Arc::new(GatedProvider {
        gate: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(provider.clone());
    let vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    let handle = engine.resolve_external_route(&vehicle).unwrap();
    assert!(engine.is_pending(vehicle.id));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(!engine.is_pending(vehicle.id));
}

#[tokio::test]
async fn test_resolution_for_replaced_route_is_discarded() {
    let engine = engine_with(Arc::new(FixedProvider::new(30)));
    let mut vehicle = vehicle_on(Route::synthetic(line(GeoPoint::new(0.0, 0.0), 5)));

    engine.resolve_external_route(&vehicle).unwrap().await.unwrap();
    let replacement = Route::synthetic(line(GeoPoint::new(1.0, 1.0), 6));
    let replacement_id = replacement.id;
    vehicle.assign_route(replacement);

    assert!(!engine.apply_resolved(&mut vehicle));
    assert_eq!(vehicle.route.as_ref().unwrap().id, replacement_id);
}

#[tokio::test]
async fn test_resolved_route_is_not_resolved_again() {
    let provider = Arc::new(FixedProvider::new(12));
    let engine = engine_with(provider.clone());
    let mut vehicle = vehicle_on(Route::resolved(line(GeoPoint::new(0.0, 0.0), 5), 0.0, 0.0));

    assert!(engine.resolve_external_route(&vehicle).is_none());
    engine.advance(&mut vehicle);
    settle(&engine).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_request_route_surfaces_errors() {
    let engine = engine_with(Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    }));
    let result = engine
        .request_route(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0))
        .await;
    assert!(matches!(result, Err(RoutingError::Provider { .. })));
}

// ============================================================================
// Synthetic routes
// ============================================================================

#[test]
fn test_curved_route_starts_and_ends_at_endpoints() {
    let cfg = RoutingConfig::default();
    let origin = GeoPoint::new(52.52, 13.405);
    let destination = GeoPoint::new(53.5511, 9.9937);
    let route = curved_route(origin, destination, &cfg);

    assert!(route.is_synthetic());
    assert_eq!(route.origin(), Some(origin));
    assert_eq!(route.destination(), Some(destination));
}

#[test]
fn test_curved_route_point_count_scales_with_distance() {
    let cfg = RoutingConfig::default();
    let origin = GeoPoint::new(50.0, 8.0);
    let near = curved_route(origin, GeoPoint::new(50.2, 8.0), &cfg);
    let far = curved_route(origin, GeoPoint::new(51.5, 8.0), &cfg);

    assert!(far.len() > near.len());
    // roughly one waypoint per 0.01 deg
    assert!((20..=22).contains(&near.len()), "near has {}", near.len());
    assert!((150..=152).contains(&far.len()), "far has {}", far.len());
}

#[test]
fn test_curved_route_respects_waypoint_bounds() {
    let cfg = RoutingConfig::default();
    let origin = GeoPoint::new(50.0, 8.0);

    let tiny = curved_route(origin, GeoPoint::new(50.001, 8.0), &cfg);
    assert_eq!(tiny.len(), cfg.min_waypoints);

    let huge = curved_route(origin, GeoPoint::new(70.0, 30.0), &cfg);
    assert_eq!(huge.len(), cfg.max_waypoints);
}

#[test]
fn test_curved_route_bows_sideways() {
    let cfg = RoutingConfig::default();
    // due north, so the sideways offset shows up in longitude
    let origin = GeoPoint::new(50.0, 8.0);
    let route = curved_route(origin, GeoPoint::new(51.0, 8.0), &cfg);

    let peak = route
        .waypoints
        .iter()
        .map(|p| (p.lng - 8.0).abs())
        .fold(0.0, f64::max);
    assert!((peak - cfg.curve_amplitude_deg).abs() < 1e-3, "peak offset {}", peak);

    let mid = route.waypoints[route.len() / 2];
    assert!((mid.lng - 8.0).abs() > 0.019);
}

#[test]
fn test_curved_route_same_point() {
    let cfg = RoutingConfig::default();
    let p = GeoPoint::new(50.0, 8.0);
    let route = curved_route(p, p, &cfg);
    assert_eq!(route.len(), cfg.min_waypoints);
    assert!(route.waypoints.iter().all(|w| *w == p));
}

// ============================================================================
// OSRM client
// ============================================================================

fn osrm_client(server: &MockServer) -> OsrmClient {
    OsrmClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_osrm_parses_geojson_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/route/v1/driving/13\.4,52\.5;9\.99,53\.55$"))
        .and(query_param("overview", "full"))
        .and(query_param("geometries", "geojson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "Ok",
            "routes": [{
                "distance": 289000.5,
                "duration": 10800.0,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[13.4, 52.5], [11.0, 53.0], [9.99, 53.55]]
                }
            }]
        })))
        .mount(&server)
        .await;

    let path = osrm_client(&server)
        .route(GeoPoint::new(52.5, 13.4), GeoPoint::new(53.55, 9.99))
        .await
        .unwrap();

    assert_eq!(path.waypoints.len(), 3);
    assert_eq!(path.waypoints[0], GeoPoint::new(52.5, 13.4));
    assert_eq!(path.waypoints[2], GeoPoint::new(53.55, 9.99));
    assert_eq!(path.distance_m, 289000.5);
    assert_eq!(path.duration_s, 10800.0);
}

#[tokio::test]
async fn test_osrm_non_ok_code_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "NoRoute",
            "message": "Impossible route between points"
        })))
        .mount(&server)
        .await;

    let err = osrm_client(&server)
        .route(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0))
        .await
        .unwrap_err();

    match err {
        RoutingError::Provider { code, .. } => assert_eq!(code, "NoRoute"),
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_osrm_empty_routes_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "Ok", "routes": [] })))
        .mount(&server)
        .await;

    let err = osrm_client(&server)
        .route(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::Malformed(_)));
}

#[tokio::test]
async fn test_osrm_garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = osrm_client(&server)
        .route(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::Malformed(_)));
}
