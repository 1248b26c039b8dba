//! Reference classification and reachability tracking.
//!
//! Objects are registered in an explicit graph and linked through slots
//! classified as strong, soft, weak or phantom. A reachability pass walks the
//! graph from a set of named roots, reclaims whatever no strong path (or soft
//! path, when memory is not short) reaches, clears soft and weak slots that
//! pointed at reclaimed objects, and queues a notification for every phantom
//! slot whose target was reclaimed. Passes only run when asked to.

pub mod collector;
pub mod config;
pub mod error;
pub mod gc;
pub mod notification;
pub mod object;
pub mod reference;
pub mod roots;
pub mod traversal;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub passes: usize,
    pub reclaimed: usize,
    pub notified: usize,
    pub cleared: usize,
    pub live_objects: usize,
    pub live_bytes: usize,
    pub roots: usize,
    /// Slot counts indexed strong, soft, weak, phantom.
    pub slot_counts: [usize; 4],
}

pub use collector::{PassReport, PassState};
pub use config::TrackerConfig;
pub use error::TrackerError;
pub use gc::Tracker;
pub use notification::{Notification, NotificationQueue};
pub use object::{ObjectData, ObjectId};
pub use reference::{SlotId, SlotState, Strength};

pub type TrackerResult<T> = Result<T, TrackerError>;
