//! End-to-end runs of the tick pipeline across routing, telemetry,
//! prediction and alerts.

use integration_tests::{
    at, five_waypoint_route, five_waypoint_synthetic_route, pipeline, pipeline_with,
    StraightLineProvider, UnreachableProvider,
};
use routing_service::OsrmClient;
use serde_json::json;
use shared::{Catalog, ChangeKind, MetricKind};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Route following
// =============================================================================

#[tokio::test]
async fn test_vehicle_loops_five_waypoint_route() {
    let pipeline = pipeline();
    let fleet = pipeline.fleet();
    let vehicle = fleet.register_vehicle(at("Van 1", 50.0, 8.0)).unwrap();
    let route = five_waypoint_route();
    let waypoints = route.waypoints.clone();
    fleet.assign_route(vehicle.id, route).unwrap();

    for expected in 1..=4 {
        let report = pipeline.tick();
        assert_eq!(report.processed, 1);
        let v = fleet.get(vehicle.id).unwrap();
        assert_eq!(v.route_index, expected);
        assert_eq!(v.position, waypoints[expected]);
        assert!(v.moving);
    }

    pipeline.tick();
    let v = fleet.get(vehicle.id).unwrap();
    assert_eq!(v.route_index, 0);
    assert_eq!(v.position, waypoints[0]);
    assert!(v.moving);

    // one reading per sensor per tick
    for kind in MetricKind::ALL {
        assert_eq!(v.metrics[&kind].history.len(), 5);
    }
}

#[tokio::test]
async fn test_vehicle_loops_synthetic_route_when_provider_unreachable() {
    let pipeline = pipeline_with(Catalog::european_fleet(), Arc::new(UnreachableProvider));
    let fleet = pipeline.fleet();
    let vehicle = fleet.register_vehicle(at("Van 1", 50.0, 8.0)).unwrap();
    let route = five_waypoint_synthetic_route();
    let waypoints = route.waypoints.clone();
    fleet.assign_route(vehicle.id, route).unwrap();

    let mut steps = Vec::new();
    for _ in 0..5 {
        let report = pipeline.tick();
        assert_eq!((report.processed, report.failed), (1, 0));
        // let the background lookup fail before the next step
        tokio::time::sleep(Duration::from_millis(10)).await;

        let v = fleet.get(vehicle.id).unwrap();
        assert!(v.route.as_ref().unwrap().is_synthetic());
        assert_eq!(v.position, waypoints[v.route_index]);
        steps.push((v.route_index, v.moving));
    }

    assert_eq!(
        steps,
        vec![(1, true), (2, true), (3, true), (4, true), (0, true)]
    );
    assert!(!pipeline.routes().is_pending(vehicle.id));
}

#[tokio::test]
async fn test_every_step_is_announced() {
    let pipeline = pipeline();
    let fleet = pipeline.fleet();
    let a = fleet.register_vehicle(at("Van 1", 50.0, 8.0)).unwrap();
    let b = fleet.register_vehicle(at("Van 2", 51.0, 9.0)).unwrap();
    let mut events = pipeline.publisher().subscribe();

    pipeline.tick();
    pipeline.tick();

    let mut stepped = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.change_kind, ChangeKind::Stepped);
        stepped.push(event.vehicle_id);
    }
    assert_eq!(stepped, vec![a.id, b.id, a.id, b.id]);
}

#[tokio::test]
async fn test_unrouted_vehicle_still_measured() {
    let pipeline = pipeline();
    let vehicle = pipeline
        .fleet()
        .register_vehicle(at("Parked", 50.0, 8.0))
        .unwrap();

    pipeline.tick();

    let v = pipeline.fleet().get(vehicle.id).unwrap();
    assert!(!v.moving);
    assert_eq!(v.position, vehicle.position);
    assert_eq!(v.metrics.len(), MetricKind::ALL.len());
}

// =============================================================================
// Fault isolation
// =============================================================================

#[tokio::test]
async fn test_broken_vehicle_does_not_stop_tick() {
    let pipeline = pipeline();
    let fleet = pipeline.fleet();
    let broken = fleet.register_vehicle(at("Broken", 50.0, 8.0)).unwrap();
    let healthy = fleet.register_vehicle(at("Healthy", 50.0, 8.0)).unwrap();
    fleet.assign_route(broken.id, five_waypoint_route()).unwrap();
    fleet.assign_route(healthy.id, five_waypoint_route()).unwrap();
    fleet.with_vehicle_mut(broken.id, |v, _| v.route_index = 99);

    let report = pipeline.tick();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(fleet.get(healthy.id).unwrap().route_index, 1);
    assert!(fleet.get(broken.id).unwrap().metrics.is_empty());

    // the failure repeats but never spreads
    let report = pipeline.tick();
    assert_eq!((report.processed, report.failed), (1, 1));
    assert_eq!(fleet.get(healthy.id).unwrap().route_index, 2);
}

// =============================================================================
// Background route resolution
// =============================================================================

fn osrm_body(points: usize) -> serde_json::Value {
    let coordinates: Vec<[f64; 2]> = (0..points)
        .map(|i| [13.405 - 0.1 * i as f64, 52.52 + 0.05 * i as f64])
        .collect();
    json!({
        "code": "Ok",
        "routes": [{
            "distance": 289000.0,
            "duration": 10800.0,
            "geometry": { "type": "LineString", "coordinates": coordinates }
        }]
    })
}

#[tokio::test]
async fn test_seeded_route_upgraded_from_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/route/v1/driving/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(osrm_body(21)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OsrmClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
    let pipeline = pipeline_with(Catalog::european_fleet(), Arc::new(provider));
    let seeded = pipeline.fleet().seed(1).unwrap();
    let id = seeded[0].id;
    assert!(seeded[0].route.as_ref().unwrap().is_synthetic());

    pipeline.tick();
    for _ in 0..200 {
        if !pipeline.routes().is_pending(id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!pipeline.routes().is_pending(id));

    let before = pipeline.fleet().get(id).unwrap();
    let old_len = before.route.as_ref().unwrap().len();
    assert_eq!(before.route_index, 1);

    pipeline.tick();

    let after = pipeline.fleet().get(id).unwrap();
    let route = after.route.as_ref().unwrap();
    assert!(!route.is_synthetic());
    assert_eq!(route.len(), 21);
    // progress carried over, then one step forward
    assert_eq!(after.route_index, 21 / old_len + 1);
    assert_eq!(after.position, route.waypoints[after.route_index]);
}

#[tokio::test]
async fn test_unreachable_provider_keeps_synthetic_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "NoRoute",
            "message": "Impossible route between points"
        })))
        .mount(&server)
        .await;

    let provider = OsrmClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
    let pipeline = pipeline_with(Catalog::european_fleet(), Arc::new(provider));
    let id = pipeline.fleet().seed(1).unwrap()[0].id;

    for step in 1..=3 {
        let report = pipeline.tick();
        assert_eq!(report.failed, 0);
        let v = pipeline.fleet().get(id).unwrap();
        assert!(v.route.as_ref().unwrap().is_synthetic());
        assert_eq!(v.route_index, step);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_explicit_route_request_replaces_seeded_route() {
    let pipeline = pipeline_with(Catalog::european_fleet(), Arc::new(StraightLineProvider));
    let fleet = pipeline.fleet();
    let vehicle = fleet.register_vehicle(at("Van 1", 52.52, 13.405)).unwrap();
    fleet.assign_synthetic_route(vehicle.id, Some("Munich")).unwrap();

    let routed = fleet
        .create_route(pipeline.routes(), vehicle.id, Some("Hamburg"))
        .await
        .unwrap();
    let route = routed.route.unwrap();
    assert!(!route.is_synthetic());
    assert_eq!(route.len(), 11);
    let end = route.destination().unwrap();
    let hamburg = fleet.catalog().hub("Hamburg").unwrap().position;
    assert!(end.degree_distance(&hamburg) < 1e-9);
}
