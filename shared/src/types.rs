use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

pub type VehicleId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn offset(&self, d_lat: f64, d_lng: f64) -> Self {
        Self {
            lat: self.lat + d_lat,
            lng: self.lng + d_lng,
        }
    }

    /// Planar distance in degrees. Good enough for spacing waypoints and
    /// rejecting trips that go nowhere; not a geodesic.
    pub fn degree_distance(&self, other: &GeoPoint) -> f64 {
        (other.lat - self.lat).hypot(other.lng - self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    EngineTemp,
    OilLevel,
    TyrePressure,
    BatteryHealth,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::EngineTemp,
        MetricKind::OilLevel,
        MetricKind::TyrePressure,
        MetricKind::BatteryHealth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::EngineTemp => "Engine temperature",
            MetricKind::OilLevel => "Oil level",
            MetricKind::TyrePressure => "Tyre pressure",
            MetricKind::BatteryHealth => "Battery capacity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Warn/critical bounds for one sensor. A metric where low values are bad
/// sets the `*_low` bounds, one where high values are bad sets `*_high`.
/// Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub warn_low: Option<f64>,
    pub warn_high: Option<f64>,
    pub crit_low: Option<f64>,
    pub crit_high: Option<f64>,
}

impl Thresholds {
    pub fn low(warn: f64, crit: f64) -> Self {
        Self {
            warn_low: Some(warn),
            crit_low: Some(crit),
            ..Self::default()
        }
    }

    pub fn high(warn: f64, crit: f64) -> Self {
        Self {
            warn_high: Some(warn),
            crit_high: Some(crit),
            ..Self::default()
        }
    }

    pub fn severity(&self, value: f64) -> Severity {
        let breached = |low: Option<f64>, high: Option<f64>| {
            low.map_or(false, |b| value <= b) || high.map_or(false, |b| value >= b)
        };

        if breached(self.crit_low, self.crit_high) {
            Severity::Critical
        } else if breached(self.warn_low, self.warn_high) {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDefinition {
    pub kind: MetricKind,
    pub name: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub reference: Option<f64>,
    pub thresholds: Thresholds,
}

impl SensorDefinition {
    /// Typical value: the reference if one is defined, else the midpoint.
    pub fn center(&self) -> f64 {
        self.reference.unwrap_or((self.min + self.max) / 2.0)
    }

    /// Spread used by the sampler. A third of the distance to the nearest
    /// bound, or a sixth of the range when the reference sits on or outside
    /// the bounds.
    pub fn deviation(&self) -> f64 {
        let center = self.center();
        let sd = (center - self.min).min(self.max - center) / 3.0;
        if sd.is_finite() && sd > 0.0 {
            sd
        } else {
            (self.max - self.min) / 6.0
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    pub vehicle_id: VehicleId,
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricState {
    pub value: f64,
    pub history: VecDeque<MetricPoint>,
    pub warning: bool,
}

impl MetricState {
    /// Stores `point` as the current value and keeps only the newest
    /// `capacity` points of history.
    pub fn record(&mut self, point: MetricPoint, capacity: usize) {
        self.value = point.value;
        self.history.push_back(point);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RouteKind {
    Synthetic,
    Resolved { distance_m: f64, duration_s: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub waypoints: Vec<GeoPoint>,
    pub kind: RouteKind,
}

impl Route {
    pub fn synthetic(waypoints: Vec<GeoPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            waypoints,
            kind: RouteKind::Synthetic,
        }
    }

    pub fn resolved(waypoints: Vec<GeoPoint>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            waypoints,
            kind: RouteKind::Resolved {
                distance_m,
                duration_s,
            },
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, RouteKind::Synthetic)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.waypoints.first().copied()
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.waypoints.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    pub model: String,
    pub year: u16,
    pub mileage_km: u32,
    pub last_service: DateTime<Utc>,
    pub next_service: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub details: Option<VehicleDetails>,
    pub origin: GeoPoint,
    pub position: GeoPoint,
    pub route: Option<Route>,
    pub route_index: usize,
    pub metrics: BTreeMap<MetricKind, MetricState>,
    pub moving: bool,
}

impl Vehicle {
    pub fn new(name: impl Into<String>, position: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            details: None,
            origin: position,
            position,
            route: None,
            route_index: 0,
            metrics: BTreeMap::new(),
            moving: false,
        }
    }

    /// Puts the vehicle at the start of `route`. An empty route clears it.
    pub fn assign_route(&mut self, route: Route) {
        match route.origin() {
            Some(start) => {
                self.position = start;
                self.route = Some(route);
                self.route_index = 0;
                self.moving = true;
            }
            None => self.clear_route(),
        }
    }

    pub fn clear_route(&mut self) {
        self.route = None;
        self.route_index = 0;
        self.moving = false;
    }

    pub fn current_value(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind).map(|m| m.value)
    }

    pub fn warning(&self, kind: MetricKind) -> bool {
        self.metrics.get(&kind).map_or(false, |m| m.warning)
    }
}
