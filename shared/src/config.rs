//! Layered configuration: compiled-in defaults, overridden by `FLEET__*`
//! environment variables (`FLEET__SIMULATION__BASE_INTERVAL_MS=500`).

use crate::types::MetricKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub simulation: SimulationConfig,
    pub telemetry: TelemetryConfig,
    pub routing: RoutingConfig,
    pub alerts: AlertsConfig,
    pub prediction: PredictionConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub base_interval_ms: u64,
    pub speed_multiplier: f64,
    pub seed_vehicles: usize,
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            speed_multiplier: 1.0,
            seed_vehicles: 2,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub history_len: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { history_len: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub provider_url: String,
    pub request_timeout_ms: u64,
    pub retry_after_secs: u64,
    pub waypoint_spacing_deg: f64,
    pub curve_amplitude_deg: f64,
    pub min_waypoints: usize,
    pub max_waypoints: usize,
    pub min_trip_deg: f64,
    pub placement_jitter_deg: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://router.project-osrm.org".to_string(),
            request_timeout_ms: 5000,
            retry_after_secs: 30,
            waypoint_spacing_deg: 0.01,
            curve_amplitude_deg: 0.02,
            min_waypoints: 5,
            max_waypoints: 400,
            min_trip_deg: 0.05,
            placement_jitter_deg: 0.02,
        }
    }
}

impl RoutingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub notification_ttl_ms: u64,
    pub max_prediction_notifications: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            notification_ttl_ms: 8000,
            max_prediction_notifications: 5,
        }
    }
}

impl AlertsConfig {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

/// Tuning constants of the prediction rules. Flat so that a single
/// constant can be overridden from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub oil_confidence: f64,
    pub oil_safety_margin_days: u32,
    pub cooling_confidence: f64,
    pub cooling_safety_margin_days: u32,
    pub tyre_confidence: f64,
    pub tyre_safety_margin_days: u32,
    pub battery_confidence: f64,
    pub battery_safety_margin_days: u32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            oil_confidence: 95.0,
            oil_safety_margin_days: 7,
            cooling_confidence: 87.0,
            cooling_safety_margin_days: 5,
            tyre_confidence: 78.0,
            tyre_safety_margin_days: 3,
            battery_confidence: 85.0,
            battery_safety_margin_days: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleTuning {
    pub confidence: f64,
    pub safety_margin_days: u32,
}

impl PredictionConfig {
    pub fn tuning(&self, kind: MetricKind) -> RuleTuning {
        let (confidence, safety_margin_days) = match kind {
            MetricKind::OilLevel => (self.oil_confidence, self.oil_safety_margin_days),
            MetricKind::EngineTemp => (self.cooling_confidence, self.cooling_safety_margin_days),
            MetricKind::TyrePressure => (self.tyre_confidence, self.tyre_safety_margin_days),
            MetricKind::BatteryHealth => (self.battery_confidence, self.battery_safety_margin_days),
        };
        RuleTuning {
            confidence,
            safety_margin_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub push_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4004".to_string(),
            push_capacity: 1024,
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLEET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: FleetConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.simulation.base_interval_ms == 0 {
            anyhow::bail!("simulation.base_interval_ms must be greater than zero");
        }
        let speed = self.simulation.speed_multiplier;
        if !speed.is_finite() || speed <= 0.0 {
            anyhow::bail!("simulation.speed_multiplier must be a positive number, got {}", speed);
        }
        if self.telemetry.history_len == 0 {
            anyhow::bail!("telemetry.history_len must be greater than zero");
        }
        if self.routing.min_waypoints < 2 || self.routing.max_waypoints < self.routing.min_waypoints {
            anyhow::bail!(
                "routing waypoint bounds are inconsistent: min {} max {}",
                self.routing.min_waypoints,
                self.routing.max_waypoints
            );
        }
        if self.routing.waypoint_spacing_deg <= 0.0 {
            anyhow::bail!("routing.waypoint_spacing_deg must be positive");
        }
        let jitter = self.routing.placement_jitter_deg;
        if !jitter.is_finite() || jitter < 0.0 {
            anyhow::bail!("routing.placement_jitter_deg must be zero or positive");
        }
        if self.alerts.notification_ttl_ms == 0 {
            anyhow::bail!("alerts.notification_ttl_ms must be greater than zero");
        }
        if self.gateway.push_capacity == 0 {
            anyhow::bail!("gateway.push_capacity must be greater than zero");
        }
        Ok(())
    }

    /// Tick interval for the configured speed: `base / multiplier`, never
    /// below one millisecond.
    pub fn effective_interval_ms(&self) -> u64 {
        scaled_interval_ms(self.simulation.base_interval_ms, self.simulation.speed_multiplier)
    }
}

pub fn scaled_interval_ms(base_ms: u64, multiplier: f64) -> u64 {
    ((base_ms as f64 / multiplier).round() as u64).max(1)
}
