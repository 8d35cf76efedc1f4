//! Relay host process

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::channel::{Origin, RelayMessage, SupervisorChannel, Visibility};
use super::error::RelayError;
use crate::data::{AssignmentStore, SharedStore};
use crate::model::{AssignmentEntry, PageId};

/// Counters describing what the host has done since it was created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    pub restarts: u64,
    pub resolved: u64,
    pub pushes_delivered: u64,
    pub pushes_dropped: u64,
    pub collected_assignments: u64,
    pub pings: u64,
    pub keepalive_rearms: u64,
}

struct Port {
    serial: u64,
    tx: mpsc::UnboundedSender<RelayMessage>,
}

struct HostState {
    running: bool,
    next_serial: u64,
    /// Open ports, owned by the host runtime rather than the relay's handlers
    ports: HashMap<PageId, Port>,
    stats: HostStats,
}

/// The suspendable process the relay runs in.
///
/// Handlers never keep data between calls: identity comes from the request's
/// `Origin`, assignments come from the shared store, and pushes go to whatever
/// port happens to be open at that moment.
#[derive(Clone)]
pub struct RelayHost {
    state: Arc<Mutex<HostState>>,
    assignments: AssignmentStore,
}

impl RelayHost {
    pub fn new(store: SharedStore) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                running: true,
                next_serial: 0,
                ports: HashMap::new(),
                stats: HostStats::default(),
            })),
            assignments: AssignmentStore::new(store),
        }
    }

    /// Tear the process down: every port closes and calls fail until `resume`
    pub fn suspend(&self) {
        let mut state = self.state.lock();
        let dropped = state.ports.len();
        state.running = false;
        state.ports.clear();
        tracing::info!(ports = dropped, "Relay host suspended");
    }

    /// Start a fresh process
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if !state.running {
            state.running = true;
            state.stats.restarts += 1;
            tracing::info!(restarts = state.stats.restarts, "Relay host resumed");
        }
    }

    pub fn restart(&self) {
        self.suspend();
        self.resume();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Tell a page agent which page it lives in, from the request's origin alone
    pub fn resolve_self(&self, origin: &Origin) -> Result<PageId, RelayError> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(RelayError::NotReady);
        }
        let page_id = origin.page.ok_or(RelayError::Unidentified)?;
        state.stats.resolved += 1;
        Ok(page_id)
    }

    /// Register a page agent for the life of its page, replacing any older port
    pub fn open_supervisory_channel(
        &self,
        page_id: PageId,
    ) -> Result<SupervisorChannel, RelayError> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(RelayError::NotReady);
        }

        state.next_serial += 1;
        let serial = state.next_serial;
        let (tx, rx) = mpsc::unbounded_channel();
        if state.ports.insert(page_id, Port { serial, tx }).is_some() {
            tracing::debug!(page_id = %page_id, "Replaced supervisory port");
        }
        drop(state);

        Ok(SupervisorChannel::new(page_id, serial, rx, self.clone()))
    }

    /// Forward a render notification if the page is listening right now.
    ///
    /// Nothing is buffered: a missed push is recovered by the page's own pull.
    /// Returns whether the notification was handed to a live port.
    pub fn push_render(&self, page_id: PageId, entry: &AssignmentEntry) -> bool {
        let mut state = self.state.lock();
        let delivered = state.running
            && match state.ports.get(&page_id) {
                Some(port) => port.tx.send(RelayMessage::Render(entry.clone())).is_ok(),
                None => false,
            };

        if delivered {
            state.stats.pushes_delivered += 1;
        } else {
            state.stats.pushes_dropped += 1;
            // A failed send means the receiving side is gone
            state.ports.remove(&page_id);
            tracing::debug!(page_id = %page_id, "Dropped render push, page not listening");
        }
        delivered
    }

    /// No-op call that keeps the host from idling out
    pub fn ping(&self) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(RelayError::NotReady);
        }
        state.stats.pings += 1;
        Ok(())
    }

    /// Re-open the keep-alive port before the host's idle timeout elapses
    pub fn rearm_keepalive(&self) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(RelayError::NotReady);
        }
        state.stats.keepalive_rearms += 1;
        Ok(())
    }

    pub fn connected_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.state.lock().ports.keys().copied().collect();
        pages.sort();
        pages
    }

    pub fn stats(&self) -> HostStats {
        self.state.lock().stats.clone()
    }

    pub(super) fn handle_disconnect(&self, page_id: PageId, serial: u64, visibility: Visibility) {
        let running = {
            let mut state = self.state.lock();
            remove_port(&mut state, page_id, serial);
            state.running
        };

        if !running || visibility != Visibility::Hidden {
            return;
        }

        // The page went away while hidden: its assignment will not be rendered again
        match self.assignments.remove(page_id) {
            Ok(true) => {
                self.state.lock().stats.collected_assignments += 1;
                tracing::debug!(page_id = %page_id, "Collected assignment of closed page");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(page_id = %page_id, error = %e, "Failed to collect assignment");
            }
        }
    }

    pub(super) fn release_port(&self, page_id: PageId, serial: u64) {
        remove_port(&mut self.state.lock(), page_id, serial);
    }
}

fn remove_port(state: &mut HostState, page_id: PageId, serial: u64) {
    if state
        .ports
        .get(&page_id)
        .is_some_and(|port| port.serial == serial)
    {
        state.ports.remove(&page_id);
    }
}

impl std::fmt::Debug for RelayHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RelayHost")
            .field("running", &state.running)
            .field("ports", &state.ports.len())
            .finish()
    }
}
