//! Fixtures shared by the cross-crate scenarios under `tests/`.

use async_trait::async_trait;
use routing_service::{ResolvedPath, RouteProvider, RoutingError};
use shared::{Catalog, FleetConfig, GeoPoint, MetricKind, Route, SensorDefinition, Thresholds};
use simulation_service::{RegisterVehicle, TickPipeline};
use std::sync::Arc;

/// Answers every request with a ten-segment straight line.
pub struct StraightLineProvider;

#[async_trait]
impl RouteProvider for StraightLineProvider {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        let waypoints = (0..=10)
            .map(|i| {
                let t = i as f64 / 10.0;
                GeoPoint::new(
                    from.lat + (to.lat - from.lat) * t,
                    from.lng + (to.lng - from.lng) * t,
                )
            })
            .collect();
        Ok(ResolvedPath {
            waypoints,
            distance_m: 100_000.0,
            duration_s: 3_600.0,
        })
    }
}

/// Refuses every request, as a routing backend with no road between the
/// points would.
pub struct UnreachableProvider;

#[async_trait]
impl RouteProvider for UnreachableProvider {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        Err(RoutingError::Provider {
            code: "NoRoute".to_string(),
            message: "Impossible route between points".to_string(),
        })
    }
}

pub fn test_config() -> FleetConfig {
    let mut cfg = FleetConfig::default();
    cfg.simulation.rng_seed = Some(42);
    cfg
}

pub fn pipeline_with(catalog: Catalog, provider: Arc<dyn RouteProvider>) -> Arc<TickPipeline> {
    Arc::new(TickPipeline::from_config(&test_config(), catalog, provider))
}

pub fn pipeline() -> Arc<TickPipeline> {
    pipeline_with(Catalog::european_fleet(), Arc::new(StraightLineProvider))
}

/// A catalog whose only sensor always reads an oil level of 5%, deep in
/// the critical band.
pub fn critical_oil_catalog() -> Catalog {
    Catalog {
        sensors: vec![SensorDefinition {
            kind: MetricKind::OilLevel,
            name: "Engine oil level".to_string(),
            unit: "%".to_string(),
            min: 5.0,
            max: 5.0,
            reference: Some(5.0),
            thresholds: Thresholds::low(50.0, 20.0),
        }],
        ..Catalog::european_fleet()
    }
}

/// Five waypoints heading north from 50°N 8°E.
pub fn five_waypoints() -> Vec<GeoPoint> {
    (0..5)
        .map(|i| GeoPoint::new(50.0 + 0.01 * i as f64, 8.0))
        .collect()
}

pub fn five_waypoint_route() -> Route {
    Route::resolved(five_waypoints(), 4_400.0, 300.0)
}

/// The same five waypoints as a placeholder route, which the route engine
/// tries to upgrade through its provider.
pub fn five_waypoint_synthetic_route() -> Route {
    Route::synthetic(five_waypoints())
}

pub fn at(name: &str, lat: f64, lng: f64) -> RegisterVehicle {
    RegisterVehicle {
        name: Some(name.to_string()),
        position: Some(GeoPoint::new(lat, lng)),
    }
}
