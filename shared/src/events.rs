//! Push channel announcing that a vehicle changed.
//!
//! Delivery is fire-and-forget: no acknowledgement, no retry, and a
//! subscriber that falls behind loses the oldest messages. Subscribers
//! re-fetch vehicle state when they need detail.

use crate::types::VehicleId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Registered,
    RouteAssigned,
    Measured,
    Stepped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleChanged {
    pub vehicle_id: VehicleId,
    pub change_kind: ChangeKind,
    pub source_hint: String,
}

impl VehicleChanged {
    pub fn new(vehicle_id: VehicleId, change_kind: ChangeKind) -> Self {
        Self {
            vehicle_id,
            change_kind,
            source_hint: format!("/vehicles/{}", vehicle_id),
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<VehicleChanged>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers the message reached. Zero subscribers
    /// is not an error.
    pub fn publish(&self, vehicle_id: VehicleId, change_kind: ChangeKind) -> usize {
        let event = VehicleChanged::new(vehicle_id, change_kind);
        tracing::debug!(vehicle_id = %vehicle_id, kind = ?change_kind, "Publishing vehicle change");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VehicleChanged> {
        self.sender.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}
