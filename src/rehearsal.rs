//! End-to-end rehearsal of a demo script
//!
//! Wires the orchestrator to an in-memory fabric, runs the relay host with its
//! keep-alive, and injects one page agent into every page the fabric creates, the
//! way a content-script host would.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::{AgentConfig, Config, KeepAliveConfig};
use crate::data::SharedStore;
use crate::fabric::{FabricEvent, MockFabric, MockFabricConfig};
use crate::model::{DemoScript, PageId};
use crate::orchestrator::{ClearReport, Orchestrator, PlayError, RunHandle, RunSummary};
use crate::page::{PageAgent, PageEvent, PageHandle, PageSnapshot};
use crate::relay::{HostStats, KeepAlive, KeepAliveStats, Origin, RelayHost, Visibility};

/// How long a finished run waits for agents to show their overlays
const OVERLAY_WAIT: Duration = Duration::from_secs(5);

type Agents = Arc<Mutex<HashMap<PageId, PageHandle>>>;

/// What a rehearsal did
#[derive(Debug, Clone, Default)]
pub struct RehearsalReport {
    pub summary: RunSummary,
    /// Persona shown on each page that received an assignment
    pub overlays: BTreeMap<PageId, String>,
    /// Delivered pages whose agent never showed the overlay
    pub missing_overlays: Vec<PageId>,
    pub host: HostStats,
    pub keepalive: Option<KeepAliveStats>,
}

/// A simulated browser with live page agents around one orchestrator
pub struct Rehearsal {
    fabric: Arc<MockFabric>,
    relay: RelayHost,
    orchestrator: Orchestrator<MockFabric>,
    agents: Agents,
    keepalive_config: KeepAliveConfig,
    cancel: CancellationToken,
    injector: JoinHandle<()>,
}

impl Rehearsal {
    /// Build a rehearsal from the loaded configuration. Must run inside a Tokio runtime.
    pub fn new(store: SharedStore, config: &Config) -> Self {
        let fabric_config = MockFabricConfig::default()
            .with_load_delay(config.rehearsal.load_delay)
            .with_jitter(config.rehearsal.load_jitter);
        Self::with_fabric(store, config, MockFabric::new(fabric_config))
    }

    pub fn with_fabric(store: SharedStore, config: &Config, fabric: MockFabric) -> Self {
        let fabric = Arc::new(fabric);
        let relay = RelayHost::new(store.clone());
        let orchestrator = Orchestrator::new(
            Arc::clone(&fabric),
            store.clone(),
            relay.clone(),
            config.playback.clone(),
        );

        let agents: Agents = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();
        // Subscribe before anything can create a page
        let events = fabric.subscribe();
        let injector = tokio::spawn(inject_agents(
            events,
            relay.clone(),
            store,
            config.agent.clone(),
            Arc::clone(&agents),
            cancel.clone(),
        ));

        Self {
            fabric,
            relay,
            orchestrator,
            agents,
            keepalive_config: config.keepalive,
            cancel,
            injector,
        }
    }

    pub fn fabric(&self) -> &MockFabric {
        &self.fabric
    }

    pub fn relay(&self) -> &RelayHost {
        &self.relay
    }

    pub fn orchestrator(&self) -> &Orchestrator<MockFabric> {
        &self.orchestrator
    }

    /// Current state of the agent living in `page_id`
    pub fn snapshot(&self, page_id: PageId) -> Option<PageSnapshot> {
        self.agents.lock().get(&page_id).map(PageHandle::snapshot)
    }

    /// Deliver a page event to the agent living in `page_id`
    pub fn send(&self, page_id: PageId, event: PageEvent) -> bool {
        self.agents
            .lock()
            .get(&page_id)
            .is_some_and(|agent| agent.send(event))
    }

    pub fn agent_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.agents.lock().keys().copied().collect();
        pages.sort();
        pages
    }

    /// Play `script` and wait until every persona is on screen
    pub async fn play(&self, script: DemoScript) -> Result<RehearsalReport, PlayError> {
        let keepalive = self.start_keepalive();
        let played = self.orchestrator.play(script).await;
        self.finish(played, keepalive).await
    }

    /// Play the pending (or active) script from the store
    pub async fn play_stored(&self) -> Result<RehearsalReport, PlayError> {
        let keepalive = self.start_keepalive();
        let played = self.orchestrator.play_stored().await;
        self.finish(played, keepalive).await
    }

    pub async fn clear(&self) -> Result<ClearReport, PlayError> {
        self.orchestrator.clear(None).await
    }

    /// Stop injecting agents and unload every live one
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.injector.await {
            tracing::warn!(error = %e, "Agent injector failed");
        }
        let agents: Vec<PageHandle> = self.agents.lock().drain().map(|(_, a)| a).collect();
        for agent in agents {
            agent.unload().await;
        }
    }

    fn start_keepalive(&self) -> Option<KeepAlive> {
        self.keepalive_config
            .enabled
            .then(|| KeepAlive::spawn(self.relay.clone(), self.keepalive_config))
    }

    async fn finish(
        &self,
        played: Result<RunHandle, PlayError>,
        keepalive: Option<KeepAlive>,
    ) -> Result<RehearsalReport, PlayError> {
        let handle = match played {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(keepalive) = keepalive {
                    keepalive.stop().await;
                }
                return Err(e);
            }
        };

        let summary = handle.settle().await;
        let (overlays, missing_overlays) = self.await_overlays(&summary.delivered).await;

        let keepalive = match keepalive {
            Some(keepalive) => Some(keepalive.stop().await),
            None => None,
        };

        Ok(RehearsalReport {
            summary,
            overlays,
            missing_overlays,
            host: self.relay.stats(),
            keepalive,
        })
    }

    async fn await_overlays(&self, pages: &[PageId]) -> (BTreeMap<PageId, String>, Vec<PageId>) {
        let mut overlays = BTreeMap::new();
        let mut missing = Vec::new();

        for page_id in pages {
            let shown = timeout(OVERLAY_WAIT, self.overlay_shown(*page_id)).await;
            match shown {
                Ok(Some(name)) => {
                    overlays.insert(*page_id, name);
                }
                _ => {
                    tracing::warn!(page_id = %page_id, "Overlay not shown");
                    missing.push(*page_id);
                }
            }
        }

        (overlays, missing)
    }

    /// Persona shown in `page_id` once its agent has rendered one
    async fn overlay_shown(&self, page_id: PageId) -> Option<String> {
        // The injector may not have seen the page yet
        let mut status = loop {
            let status = self.agents.lock().get(&page_id).map(PageHandle::subscribe);
            match status {
                Some(status) => break status,
                None => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };
        let snapshot = status.wait_for(PageSnapshot::has_overlay).await.ok()?;
        snapshot.persona_name().map(str::to_owned)
    }
}

/// Start an agent in every created page and unload it when the page goes away
async fn inject_agents(
    mut events: broadcast::Receiver<FabricEvent>,
    relay: RelayHost,
    store: SharedStore,
    config: AgentConfig,
    agents: Agents,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(FabricEvent::PageCreated { page, url, .. }) => {
                tracing::debug!(page_id = %page, url = %url, "Injecting page agent");
                let agent = PageAgent::spawn(
                    Origin::page(page),
                    relay.clone(),
                    store.clone(),
                    config.clone(),
                );
                agents.lock().insert(page, agent);
            }
            Ok(FabricEvent::PageRemoved(page)) => {
                let agent = agents.lock().remove(&page);
                if let Some(agent) = agent {
                    // A closed tab is no longer visible when its page unloads
                    agent.send(PageEvent::Visibility(Visibility::Hidden));
                    agent.unload().await;
                }
            }
            Ok(FabricEvent::PageLoaded(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Agent injector lagged behind fabric events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
