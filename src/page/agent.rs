//! Per-page agent lifecycle
//!
//! `Uninitialized -> ResolvingId -> Connecting -> Connected { overlay }`
//!
//! The agent learns its page id from the relay, holds a supervisory channel for the
//! life of the page and renders the persona overlay from the shared store. Rendering
//! is triggered by the initial pull, by every hidden-to-visible transition and by
//! pushed notifications; all three read the store and funnel into the same idempotent render.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::dom::{Editable, OverlayView, PageDom};
use crate::config::{AgentConfig, KeyPress};
use crate::data::{AssignmentStore, SharedStore};
use crate::model::{AssignmentEntry, PageId};
use crate::relay::{Origin, RelayError, RelayHost, RelayMessage, SupervisorChannel, Visibility};

/// Where the agent is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentState {
    #[default]
    Uninitialized,
    ResolvingId,
    /// Id known, supervisory channel not (yet or any longer) open
    Connecting { page_id: PageId },
    Connected { page_id: PageId, overlay: bool },
    Unloaded,
}

impl AgentState {
    pub fn page_id(&self) -> Option<PageId> {
        match self {
            AgentState::Connecting { page_id } | AgentState::Connected { page_id, .. } => {
                Some(*page_id)
            }
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, AgentState::Connected { .. })
    }
}

/// Things that happen inside the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Visibility(Visibility),
    Key(KeyPress),
    Focus(Editable),
    Blur,
    /// User closed the overlay
    Dismiss,
    Unload,
}

/// Observable state of a page, published after every change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub state: AgentState,
    pub overlay: Option<OverlayView>,
    pub overlay_nodes: usize,
    pub overlays_built: u32,
    pub focused: Option<Editable>,
    pub resolve_attempts: u32,
    pub connect_attempts: u32,
}

impl PageSnapshot {
    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn persona_name(&self) -> Option<&str> {
        self.overlay.as_ref().map(|view| view.persona.name.as_str())
    }
}

/// Handle to a running page agent
pub struct PageHandle {
    events: mpsc::UnboundedSender<PageEvent>,
    status: watch::Receiver<PageSnapshot>,
    task: JoinHandle<()>,
}

impl PageHandle {
    /// Deliver a page event. Returns false once the agent has stopped.
    pub fn send(&self, event: PageEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.status.borrow().clone()
    }

    /// Independent receiver of the published snapshots
    pub fn subscribe(&self) -> watch::Receiver<PageSnapshot> {
        self.status.clone()
    }

    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_until<F>(&self, predicate: F) -> Option<PageSnapshot>
    where
        F: FnMut(&PageSnapshot) -> bool,
    {
        let mut status = self.status.clone();
        status.wait_for(predicate).await.ok().map(|s| s.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Unload the page and wait for the agent to stop
    pub async fn unload(self) {
        let _ = self.events.send(PageEvent::Unload);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Page agent task failed");
        }
    }
}

enum Wake {
    Relay(Result<RelayMessage, RelayError>),
    Page(Option<PageEvent>),
}

enum Exit {
    Unloaded,
    ChannelLost,
}

/// The code injected into one visited page
pub struct PageAgent {
    origin: Origin,
    relay: RelayHost,
    assignments: AssignmentStore,
    config: AgentConfig,
    dom: PageDom,
    state: AgentState,
    resolve_attempts: u32,
    connect_attempts: u32,
    events: mpsc::UnboundedReceiver<PageEvent>,
    status: watch::Sender<PageSnapshot>,
}

impl PageAgent {
    /// Start the agent for a freshly loaded page
    pub fn spawn(
        origin: Origin,
        relay: RelayHost,
        store: SharedStore,
        config: AgentConfig,
    ) -> PageHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(PageSnapshot::default());

        let agent = PageAgent {
            origin,
            relay,
            assignments: AssignmentStore::new(store),
            config,
            dom: PageDom::new(),
            state: AgentState::Uninitialized,
            resolve_attempts: 0,
            connect_attempts: 0,
            events: events_rx,
            status: status_tx,
        };
        let task = tokio::spawn(agent.run());

        PageHandle {
            events: events_tx,
            status: status_rx,
            task,
        }
    }

    async fn run(mut self) {
        self.set_state(AgentState::ResolvingId);
        let Some(page_id) = self.resolve_page_id().await else {
            self.set_state(AgentState::Unloaded);
            return;
        };

        loop {
            self.set_state(AgentState::Connecting { page_id });
            let Some(channel) = self.connect(page_id).await else {
                break;
            };

            self.set_state(AgentState::Connected {
                page_id,
                overlay: self.dom.has_overlay(),
            });
            self.pull(page_id);

            if let Exit::Unloaded = self.serve(page_id, channel).await {
                break;
            }
        }

        self.set_state(AgentState::Unloaded);
    }

    /// Ask the relay who we are until it answers. `None` if the page unloads first.
    async fn resolve_page_id(&mut self) -> Option<PageId> {
        loop {
            self.resolve_attempts += 1;
            match self.relay.resolve_self(&self.origin) {
                Ok(page_id) => return Some(page_id),
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(attempt = self.resolve_attempts, error = %e, "Page id not resolved yet");
                }
                Err(e) => {
                    tracing::warn!(attempt = self.resolve_attempts, error = %e, "Page id resolution failed");
                }
            }
            self.publish();

            if !self.idle(self.config.retry_delay).await {
                return None;
            }
        }
    }

    async fn connect(&mut self, page_id: PageId) -> Option<SupervisorChannel> {
        loop {
            self.connect_attempts += 1;
            match self.relay.open_supervisory_channel(page_id) {
                Ok(channel) => return Some(channel),
                Err(e) => {
                    tracing::debug!(page_id = %page_id, attempt = self.connect_attempts, error = %e, "Supervisory channel not established");
                }
            }
            self.publish();

            if !self.idle(self.config.retry_delay).await {
                return None;
            }
        }
    }

    /// Wait out a backoff while still handling page events. False if the page unloaded.
    async fn idle(&mut self, delay: std::time::Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                event = self.events.recv() => match event {
                    None | Some(PageEvent::Unload) => return false,
                    Some(event) => self.handle_local(event),
                },
            }
        }
    }

    async fn serve(&mut self, page_id: PageId, mut channel: SupervisorChannel) -> Exit {
        loop {
            let wake = tokio::select! {
                message = channel.recv() => Wake::Relay(message),
                event = self.events.recv() => Wake::Page(event),
            };

            match wake {
                // The push is only a trigger; the store decides what is shown
                Wake::Relay(Ok(RelayMessage::Render(_))) => self.pull(page_id),
                Wake::Relay(Err(e)) => {
                    tracing::debug!(page_id = %page_id, error = %e, "Supervisory channel lost");
                    return Exit::ChannelLost;
                }
                Wake::Page(None) | Wake::Page(Some(PageEvent::Unload)) => {
                    channel.disconnect(self.dom.visibility());
                    return Exit::Unloaded;
                }
                Wake::Page(Some(PageEvent::Visibility(visibility))) => {
                    let was_hidden = self.dom.visibility() == Visibility::Hidden;
                    self.dom.set_visibility(visibility);
                    if was_hidden && visibility == Visibility::Visible {
                        self.pull(page_id);
                    }
                }
                Wake::Page(Some(PageEvent::Dismiss)) => self.dismiss(Some(page_id)),
                Wake::Page(Some(event)) => self.handle_local(event),
            }
        }
    }

    /// Events that need no relay or store access
    fn handle_local(&mut self, event: PageEvent) {
        match event {
            PageEvent::Visibility(visibility) => self.dom.set_visibility(visibility),
            PageEvent::Key(press) => self.handle_key(press),
            PageEvent::Focus(field) => self.dom.focus(field),
            PageEvent::Blur => self.dom.blur(),
            PageEvent::Dismiss => self.dismiss(self.state.page_id()),
            PageEvent::Unload => {}
        }
        self.publish();
    }

    /// Read this page's assignment and reconcile the overlay with it
    fn pull(&mut self, page_id: PageId) {
        match self.assignments.get(page_id) {
            Ok(Some(entry)) => self.render(page_id, &entry),
            Ok(None) => {
                if self.dom.remove_overlay() {
                    tracing::debug!(page_id = %page_id, "Assignment cleared, overlay removed");
                    self.set_overlay_state(page_id);
                }
            }
            Err(e) => {
                tracing::warn!(page_id = %page_id, error = %e, "Failed to read assignment");
            }
        }
    }

    fn render(&mut self, page_id: PageId, entry: &AssignmentEntry) {
        if self.dom.render(OverlayView::from(entry)) {
            tracing::debug!(page_id = %page_id, persona = %entry.persona.name, "Overlay rendered");
            self.set_overlay_state(page_id);
        }
    }

    fn dismiss(&mut self, page_id: Option<PageId>) {
        if !self.dom.remove_overlay() {
            return;
        }
        if let Some(page_id) = page_id {
            if self.config.forget_on_dismiss {
                if let Err(e) = self.assignments.remove(page_id) {
                    tracing::warn!(page_id = %page_id, error = %e, "Failed to forget assignment");
                }
            }
            self.set_overlay_state(page_id);
        }
    }

    fn handle_key(&mut self, press: KeyPress) {
        let Some(digit) = self.config.hotkey.digit_for(&press) else {
            return;
        };
        let Some(text) = self
            .dom
            .overlay()
            .and_then(|view| view.persona.canned_text(digit))
            .map(str::to_owned)
        else {
            return;
        };
        if !self.dom.inject_text(&text) {
            tracing::debug!(digit, "No focused field for canned text");
        }
    }

    fn set_overlay_state(&mut self, page_id: PageId) {
        if let AgentState::Connected { .. } = self.state {
            self.state = AgentState::Connected {
                page_id,
                overlay: self.dom.has_overlay(),
            };
        }
        self.publish();
    }

    fn set_state(&mut self, state: AgentState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(PageSnapshot {
            state: self.state,
            overlay: self.dom.overlay().cloned(),
            overlay_nodes: self.dom.overlay_nodes(),
            overlays_built: self.dom.overlays_built(),
            focused: self.dom.focused().cloned(),
            resolve_attempts: self.resolve_attempts,
            connect_attempts: self.connect_attempts,
        });
    }
}
