use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::VehicleId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineKind {
    Warning,
    Prediction,
    History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    pub title: String,
    pub description: String,
    pub vehicle_id: Option<VehicleId>,
}

/// A maintenance job done in the past, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRecord {
    pub date: DateTime<Utc>,
    pub component: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
}

/// Append-only event log, newest first.
#[derive(Debug, Default)]
pub struct Timeline {
    events: RwLock<VecDeque<TimelineEvent>>,
    seeded: AtomicBool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TimelineEvent) {
        self.events.write().push_front(event);
    }

    /// Puts past maintenance in front of the timeline, most recent job
    /// first. Only the first call has an effect; later calls return 0.
    pub fn seed_history(&self, mut records: Vec<MaintenanceRecord>) -> usize {
        if self.seeded.swap(true, Ordering::SeqCst) {
            tracing::debug!("Maintenance history already seeded");
            return 0;
        }

        records.sort_by(|a, b| b.date.cmp(&a.date));
        let count = records.len();

        let mut events = self.events.write();
        for record in records.into_iter().rev() {
            events.push_front(TimelineEvent {
                timestamp: record.date,
                kind: TimelineKind::History,
                title: "Maintenance completed".to_string(),
                description: format!("{} | {}", record.component, record.kind),
                vehicle_id: record.vehicle_id,
            });
        }

        tracing::info!(count, "Maintenance history seeded");
        count
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<TimelineEvent> {
        self.events.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
