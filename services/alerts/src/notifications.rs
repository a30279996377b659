use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::VehicleId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Warning,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub vehicle_id: VehicleId,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Live notifications. Each one removes itself once its time-to-live has
/// passed, whether or not the simulation keeps ticking.
pub struct NotificationStore {
    live: Arc<RwLock<Vec<Notification>>>,
    ttl: Duration,
    sender: broadcast::Sender<Notification>,
}

impl NotificationStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            live: Arc::new(RwLock::new(Vec::new())),
            ttl,
            sender,
        }
    }

    /// Adds a notification unless an identical (message, vehicle) pair is
    /// already live. Returns the new notification, or `None` for a
    /// duplicate.
    pub fn push(
        &self,
        kind: NotificationKind,
        message: String,
        vehicle_id: VehicleId,
    ) -> Option<Notification> {
        let notification = {
            let mut live = self.live.write();
            if live
                .iter()
                .any(|n| n.message == message && n.vehicle_id == vehicle_id)
            {
                return None;
            }
            let notification = Notification {
                id: Uuid::new_v4(),
                message,
                kind,
                vehicle_id,
                read: false,
                created_at: Utc::now(),
            };
            live.push(notification.clone());
            notification
        };

        self.schedule_expiry(notification.id);
        let _ = self.sender.send(notification.clone());

        tracing::info!(
            notification_id = %notification.id,
            vehicle_id = %vehicle_id,
            kind = ?notification.kind,
            "Notification created"
        );
        Some(notification)
    }

    fn schedule_expiry(&self, id: Uuid) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(notification_id = %id, "No runtime, notification will not expire");
                return;
            }
        };

        let live = self.live.clone();
        let deadline = tokio::time::Instant::now() + self.ttl;
        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut live = live.write();
            let before = live.len();
            live.retain(|n| n.id != id);
            if live.len() < before {
                tracing::debug!(notification_id = %id, "Notification expired");
            }
        });
    }

    pub fn mark_read(&self, id: Uuid) -> bool {
        match self.live.write().iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut live = self.live.write();
        let before = live.len();
        live.retain(|n| n.id != id);
        live.len() < before
    }

    pub fn unread_count(&self) -> usize {
        self.live.read().iter().filter(|n| !n.read).count()
    }

    /// Live notifications, oldest first.
    pub fn live(&self) -> Vec<Notification> {
        self.live.read().clone()
    }

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}
