use crate::object::ObjectId;
use crate::reference::SlotId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Unknown or reclaimed object: {0}")]
    UnknownObject(ObjectId),

    #[error("Unknown reference slot: {0}")]
    UnknownSlot(SlotId),

    #[error("Reachability pass already in progress")]
    PassInProgress,

    /// Traversal marked a rooted object as unreachable. This is a bug in the
    /// tracker, not something callers should retry.
    #[error("Rooted object {0} selected for reclamation")]
    RootStillLive(ObjectId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::RootStillLive(_) | TrackerError::Internal(_))
    }
}
