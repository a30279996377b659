use chrono::{DateTime, Utc};
use rand::Rng;
use shared::{MetricPoint, SensorDefinition, Severity, TelemetryReading, Vehicle};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("No sensors configured")]
    NoSensors,
}

/// Draws one normally distributed value (Box-Muller).
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // gen() is in [0, 1); flip it so ln never sees zero
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + z * std_dev
}

/// Produces plausible sensor readings and keeps each vehicle's bounded
/// per-metric history.
#[derive(Debug, Clone)]
pub struct TelemetrySampler {
    sensors: Vec<SensorDefinition>,
    history_len: usize,
}

impl TelemetrySampler {
    pub fn new(sensors: Vec<SensorDefinition>, history_len: usize) -> Self {
        Self {
            sensors,
            history_len: history_len.max(1),
        }
    }

    pub fn sensors(&self) -> &[SensorDefinition] {
        &self.sensors
    }

    /// One value for `sensor`, drawn around its center and clamped into its
    /// legal range.
    pub fn sample<R: Rng + ?Sized>(&self, sensor: &SensorDefinition, rng: &mut R) -> f64 {
        let raw = gaussian(rng, sensor.center(), sensor.deviation());
        if raw.is_finite() {
            sensor.clamp(raw)
        } else {
            sensor.clamp(sensor.center())
        }
    }

    /// Samples every sensor for `vehicle`, records the values into its
    /// history and refreshes the per-metric warning flags.
    pub fn measure<R: Rng + ?Sized>(
        &self,
        vehicle: &mut Vehicle,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Vec<TelemetryReading>, TelemetryError> {
        if self.sensors.is_empty() {
            return Err(TelemetryError::NoSensors);
        }

        let mut readings = Vec::with_capacity(self.sensors.len());
        for sensor in &self.sensors {
            let value = self.sample(sensor, rng);
            let state = vehicle.metrics.entry(sensor.kind).or_default();
            state.record(
                MetricPoint {
                    timestamp: now,
                    value,
                },
                self.history_len,
            );
            state.warning = sensor.thresholds.severity(value) != Severity::Normal;

            readings.push(TelemetryReading {
                vehicle_id: vehicle.id,
                kind: sensor.kind,
                value,
                timestamp: now,
            });
        }

        tracing::debug!(vehicle_id = %vehicle.id, readings = readings.len(), "Vehicle measured");
        Ok(readings)
    }
}
