use crate::rules::{MetricRule, Prediction};
use shared::config::PredictionConfig;
use shared::{SensorDefinition, Vehicle};

/// Applies one [`MetricRule`] per known sensor to a vehicle's latest
/// readings.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    rules: Vec<MetricRule>,
}

impl PredictionEngine {
    pub fn new(sensors: &[SensorDefinition], cfg: &PredictionConfig) -> Self {
        Self {
            rules: sensors.iter().map(|s| MetricRule::for_sensor(s, cfg)).collect(),
        }
    }

    /// Full prediction set for `vehicle`, soonest failure first. Metrics
    /// without a reading yet are skipped.
    pub fn classify(&self, vehicle: &Vehicle) -> Vec<Prediction> {
        let mut predictions: Vec<Prediction> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let value = vehicle.current_value(rule.metric())?;
                rule.evaluate(vehicle.id, value)
            })
            .collect();

        predictions.sort_by_key(|p| p.predicted_failure_in_days);
        if !predictions.is_empty() {
            tracing::debug!(vehicle_id = %vehicle.id, count = predictions.len(), "Maintenance predicted");
        }
        predictions
    }
}
