use thiserror::Error;

use crate::model::{GroupId, PageId, WindowId};

/// Errors reported by a resource fabric
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FabricError {
    #[error("Window creation rejected: {0}")]
    WindowCreation(String),

    #[error("Page creation rejected for {url}: {reason}")]
    PageCreation { url: String, reason: String },

    #[error("Page {0} no longer exists")]
    StalePage(PageId),

    #[error("Unknown window {0}")]
    UnknownWindow(WindowId),

    #[error("Unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("Host error: {0}")]
    Host(String),
}

impl FabricError {
    /// The target was already gone; callers treat this as success
    pub fn is_stale(&self) -> bool {
        matches!(self, FabricError::StalePage(_))
    }
}
