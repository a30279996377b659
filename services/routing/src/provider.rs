//! Client for an OSRM-compatible routing provider.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{GeoPoint, Route};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Routing provider answered {code}: {message}")]
    Provider { code: String, message: String },
    #[error("Malformed routing response: {0}")]
    Malformed(String),
}

/// A path returned by the provider, already converted to lat/lng order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub waypoints: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl ResolvedPath {
    pub fn into_route(self) -> Route {
        Route::resolved(self.waypoints, self.distance_m, self.duration_s)
    }
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<ResolvedPath, RoutingError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        // OSRM expects lng,lat pairs
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<ResolvedPath, RoutingError> {
        let url = self.route_url(from, to);
        tracing::debug!(url = %url, "Requesting route");

        // OSRM reports "no route" and friends as 4xx with a JSON body, so
        // the body is parsed regardless of status.
        let body = self.http.get(&url).send().await?.text().await?;
        let parsed: OsrmResponse = serde_json::from_str(&body)
            .map_err(|e| RoutingError::Malformed(e.to_string()))?;

        if parsed.code != "Ok" {
            return Err(RoutingError::Provider {
                code: parsed.code,
                message: parsed.message.unwrap_or_default(),
            });
        }

        let route = parsed
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::Malformed("response contains no routes".to_string()))?;

        if route.geometry.coordinates.is_empty() {
            return Err(RoutingError::Malformed("route geometry is empty".to_string()));
        }

        let waypoints = route
            .geometry
            .coordinates
            .iter()
            .map(|[lng, lat]| GeoPoint::new(*lat, *lng))
            .collect();

        Ok(ResolvedPath {
            waypoints,
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}
