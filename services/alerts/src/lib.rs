pub mod deriver;
pub mod notifications;
pub mod timeline;


pub use deriver::{DeriveOutcome, NotificationDeriver};
pub use notifications::{Notification, NotificationKind, NotificationStore};
pub use timeline::{MaintenanceRecord, Timeline, TimelineEvent, TimelineKind};
