//! Supervisory channel between a page agent and the relay host

use tokio::sync::mpsc;

use super::error::RelayError;
use super::host::RelayHost;
use crate::model::{AssignmentEntry, PageId};

/// Transport-level identity attached to every request by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin {
    /// Page the request came from, when the runtime can tell
    pub page: Option<PageId>,
}

impl Origin {
    pub fn page(page_id: PageId) -> Self {
        Self {
            page: Some(page_id),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Page visibility as reported by the page itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Notification pushed from the relay to a page agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Render(AssignmentEntry),
}

/// A page agent's registration with the relay for the life of its page.
///
/// Dropping the channel releases the port without any cleanup; `disconnect`
/// reports the page's visibility so the relay can garbage-collect its assignment.
pub struct SupervisorChannel {
    page_id: PageId,
    serial: u64,
    rx: mpsc::UnboundedReceiver<RelayMessage>,
    host: RelayHost,
    released: bool,
}

impl SupervisorChannel {
    pub(super) fn new(
        page_id: PageId,
        serial: u64,
        rx: mpsc::UnboundedReceiver<RelayMessage>,
        host: RelayHost,
    ) -> Self {
        Self {
            page_id,
            serial,
            rx,
            host,
            released: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Next pushed notification; `ChannelClosed` once the host dropped the port
    pub async fn recv(&mut self) -> Result<RelayMessage, RelayError> {
        self.rx.recv().await.ok_or(RelayError::ChannelClosed)
    }

    /// Close the channel, telling the relay whether the page was visible at the time
    pub fn disconnect(mut self, visibility: Visibility) {
        self.released = true;
        self.host
            .handle_disconnect(self.page_id, self.serial, visibility);
    }
}

impl Drop for SupervisorChannel {
    fn drop(&mut self) {
        if !self.released {
            self.host.release_port(self.page_id, self.serial);
        }
    }
}

impl std::fmt::Debug for SupervisorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorChannel")
            .field("page_id", &self.page_id)
            .field("serial", &self.serial)
            .finish()
    }
}
