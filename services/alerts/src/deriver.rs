use crate::notifications::{NotificationKind, NotificationStore};
use crate::timeline::{Timeline, TimelineEvent, TimelineKind};
use chrono::Utc;
use parking_lot::Mutex;
use prediction_service::{Prediction, Priority};
use shared::{MetricKind, Vehicle, VehicleId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeriveOutcome {
    pub warnings: usize,
    pub predictions: usize,
}

/// Turns warning edges and high-priority predictions into notifications
/// and timeline entries.
pub struct NotificationDeriver {
    store: Arc<NotificationStore>,
    timeline: Arc<Timeline>,
    last_flags: Mutex<HashMap<(VehicleId, MetricKind), bool>>,
    prediction_budget: AtomicUsize,
    max_prediction_notifications: usize,
}

impl NotificationDeriver {
    pub fn new(
        store: Arc<NotificationStore>,
        timeline: Arc<Timeline>,
        max_prediction_notifications: usize,
    ) -> Self {
        Self {
            store,
            timeline,
            last_flags: Mutex::new(HashMap::new()),
            prediction_budget: AtomicUsize::new(max_prediction_notifications),
            max_prediction_notifications,
        }
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    /// Refills the per-tick allowance of high-priority predictions that may
    /// turn into notifications. Called once at the start of every tick.
    pub fn begin_tick(&self) {
        self.prediction_budget
            .store(self.max_prediction_notifications, Ordering::SeqCst);
    }

    pub fn derive(&self, vehicle: &Vehicle, predictions: &[Prediction]) -> DeriveOutcome {
        DeriveOutcome {
            warnings: self.derive_warnings(vehicle),
            predictions: self.derive_predictions(vehicle, predictions),
        }
    }

    fn derive_warnings(&self, vehicle: &Vehicle) -> usize {
        let mut raised = Vec::new();
        {
            let mut last = self.last_flags.lock();
            for (kind, state) in &vehicle.metrics {
                let previous = last.insert((vehicle.id, *kind), state.warning).unwrap_or(false);
                if state.warning && !previous {
                    raised.push((*kind, state.value));
                }
            }
        }

        let mut created = 0;
        for (kind, value) in raised {
            let message = format!("{}: warning! {} at {:.1}", vehicle.name, kind.label(), value);
            if self
                .store
                .push(NotificationKind::Warning, message.clone(), vehicle.id)
                .is_some()
            {
                created += 1;
                self.timeline.record(TimelineEvent {
                    timestamp: Utc::now(),
                    kind: TimelineKind::Warning,
                    title: "Sensor warning".to_string(),
                    description: message,
                    vehicle_id: Some(vehicle.id),
                });
            }
        }
        created
    }

    fn derive_predictions(&self, vehicle: &Vehicle, predictions: &[Prediction]) -> usize {
        let mut created = 0;
        for prediction in predictions.iter().filter(|p| p.priority == Priority::High) {
            let took = self
                .prediction_budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
            if took.is_err() {
                tracing::debug!(vehicle_id = %vehicle.id, "Prediction notification budget spent for this tick");
                break;
            }

            let message = format!(
                "{}: {} ({} days)",
                prediction.component,
                prediction.metric.label(),
                prediction.predicted_failure_in_days
            );
            if self
                .store
                .push(NotificationKind::Prediction, message, vehicle.id)
                .is_some()
            {
                created += 1;
                self.timeline.record(TimelineEvent {
                    timestamp: Utc::now(),
                    kind: TimelineKind::Prediction,
                    title: "High failure probability".to_string(),
                    description: format!("{} | {}", prediction.component, prediction.reason),
                    vehicle_id: Some(vehicle.id),
                });
            }
        }
        created
    }
}
