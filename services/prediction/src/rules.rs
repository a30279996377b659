//! Per-metric maintenance rules.
//!
//! Every metric has its own failure-horizon formula.

use serde::{Deserialize, Serialize};
use shared::config::PredictionConfig;
use shared::{MetricKind, SensorDefinition, Severity, Thresholds, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Priority::High,
            Severity::Warning => Priority::Medium,
            Severity::Normal => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub vehicle_id: VehicleId,
    pub metric: MetricKind,
    pub component: String,
    pub priority: Priority,
    pub confidence: f64,
    pub predicted_failure_in_days: u32,
    pub recommended_maintenance_in_days: u32,
    pub reason: String,
}

/// Constants a rule carries: where its bounds sit, how sure it is and how
/// many days ahead of the predicted failure maintenance is due.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleParams {
    pub thresholds: Thresholds,
    pub unit: String,
    pub confidence: f64,
    pub safety_margin_days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricRule {
    OilChange(RuleParams),
    CoolingSystem(RuleParams),
    TyrePressure(RuleParams),
    BatteryReplacement(RuleParams),
}

impl MetricRule {
    /// Builds the rule for `sensor`'s metric, taking thresholds from the
    /// sensor and the tuning constants from `cfg`.
    pub fn for_sensor(sensor: &SensorDefinition, cfg: &PredictionConfig) -> Self {
        let tuning = cfg.tuning(sensor.kind);
        let params = RuleParams {
            thresholds: sensor.thresholds,
            unit: sensor.unit.clone(),
            confidence: tuning.confidence,
            safety_margin_days: tuning.safety_margin_days,
        };
        match sensor.kind {
            MetricKind::OilLevel => MetricRule::OilChange(params),
            MetricKind::EngineTemp => MetricRule::CoolingSystem(params),
            MetricKind::TyrePressure => MetricRule::TyrePressure(params),
            MetricKind::BatteryHealth => MetricRule::BatteryReplacement(params),
        }
    }

    pub fn metric(&self) -> MetricKind {
        match self {
            MetricRule::OilChange(_) => MetricKind::OilLevel,
            MetricRule::CoolingSystem(_) => MetricKind::EngineTemp,
            MetricRule::TyrePressure(_) => MetricKind::TyrePressure,
            MetricRule::BatteryReplacement(_) => MetricKind::BatteryHealth,
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            MetricRule::OilChange(_) => "Oil change",
            MetricRule::CoolingSystem(_) => "Cooling system",
            MetricRule::TyrePressure(_) => "Tyre pressure",
            MetricRule::BatteryReplacement(_) => "Battery replacement",
        }
    }

    pub fn params(&self) -> &RuleParams {
        match self {
            MetricRule::OilChange(p)
            | MetricRule::CoolingSystem(p)
            | MetricRule::TyrePressure(p)
            | MetricRule::BatteryReplacement(p) => p,
        }
    }

    /// Days until the component is expected to fail at `value`. Never
    /// below one.
    pub fn predicted_failure_in_days(&self, value: f64) -> u32 {
        let raw = match self {
            MetricRule::OilChange(_) => value / 2.0,
            MetricRule::CoolingSystem(_) => (100.0 - value) * 2.0,
            MetricRule::TyrePressure(_) => value / 5.0,
            MetricRule::BatteryReplacement(_) => 20.0 / value,
        };
        // a flat battery divides by zero
        if !raw.is_finite() {
            return 1;
        }
        raw.floor().max(1.0) as u32
    }

    pub fn recommended_maintenance_in_days(&self, failure_in_days: u32) -> u32 {
        failure_in_days
            .saturating_sub(self.params().safety_margin_days)
            .max(1)
    }

    /// Classifies `value`. Readings inside the warning bounds produce no
    /// prediction at all.
    pub fn evaluate(&self, vehicle_id: VehicleId, value: f64) -> Option<Prediction> {
        let params = self.params();
        let priority = Priority::from_severity(params.thresholds.severity(value));
        if priority == Priority::Low {
            return None;
        }

        let failure = self.predicted_failure_in_days(value);
        Some(Prediction {
            vehicle_id,
            metric: self.metric(),
            component: self.component().to_string(),
            priority,
            confidence: params.confidence,
            predicted_failure_in_days: failure,
            recommended_maintenance_in_days: self.recommended_maintenance_in_days(failure),
            reason: format!("{} at {:.1}{}", self.metric().label(), value, params.unit),
        })
    }
}
