//! In-memory resource fabric for rehearsals and deterministic testing
//!
//! Implements `ResourceFabric` without a browser: windows, pages and groups live in a
//! table, page loads complete after a simulated (jittered) latency, and every call is
//! captured for later verification.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use demoflow::fabric::{MockFabric, MockFabricConfig, ResourceFabric};
//!
//! # async fn demo() -> Result<(), demoflow::fabric::FabricError> {
//! let fabric = MockFabric::new(MockFabricConfig::default().with_load_delay(Duration::ZERO));
//! let window = fabric.current_window().await?;
//! let page = fabric.create_page(window, "https://a.example").await?;
//! fabric.on_page_load_complete(page).await?.await.ok();
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::broadcast;

use super::load::{ready_signal, LoadListeners, LoadSignal};
use super::{CreatedWindow, FabricError, ResourceFabric, WindowOptions};
use crate::model::{GroupId, PageId, TabColor, WindowId};

/// URL of the blank page every new window opens with
pub const BLANK_URL: &str = "about:blank";

/// A call made against the fabric, in issue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FabricCall {
    CreateWindow { isolated: bool },
    CreatePage { window: WindowId, url: String },
    RemovePages(Vec<PageId>),
    GroupPages { pages: Vec<PageId>, window: WindowId },
    LabelGroup { group: GroupId, title: String, color: TabColor },
    WaitLoad(PageId),
    Focus(WindowId),
    Activate(PageId),
}

/// Lifecycle notifications, as a content-script host would observe them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FabricEvent {
    PageCreated {
        page: PageId,
        window: WindowId,
        url: String,
    },
    PageLoaded(PageId),
    PageRemoved(PageId),
}

/// Configuration for mock fabric behavior
#[derive(Debug, Clone)]
pub struct MockFabricConfig {
    /// Base latency before a page reports load-complete
    pub load_delay: Duration,
    /// Extra random latency in `[0, load_jitter]`
    pub load_jitter: Duration,
    /// Pages never complete on their own; tests call `complete_load`
    pub hold_loads: bool,
    /// URLs whose creation is rejected
    pub failing_urls: HashSet<String>,
    /// Reject isolated window creation
    pub fail_isolated_windows: bool,
}

impl Default for MockFabricConfig {
    fn default() -> Self {
        Self {
            load_delay: Duration::from_millis(10),
            load_jitter: Duration::ZERO,
            hold_loads: false,
            failing_urls: HashSet::new(),
            fail_isolated_windows: false,
        }
    }
}

impl MockFabricConfig {
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.load_jitter = jitter;
        self
    }

    pub fn holding_loads(mut self) -> Self {
        self.hold_loads = true;
        self
    }

    pub fn failing_url(mut self, url: impl Into<String>) -> Self {
        self.failing_urls.insert(url.into());
        self
    }

    pub fn failing_isolated_windows(mut self) -> Self {
        self.fail_isolated_windows = true;
        self
    }
}

/// Snapshot of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub window: WindowId,
    pub url: String,
    pub loaded: bool,
    pub group: Option<GroupId>,
}

/// Snapshot of a tab group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: GroupId,
    pub window: WindowId,
    pub pages: Vec<PageId>,
    pub title: String,
    pub color: Option<TabColor>,
}

#[derive(Debug)]
struct WindowRecord {
    isolated: bool,
}

#[derive(Debug)]
struct FabricState {
    next_id: i64,
    main_window: WindowId,
    windows: BTreeMap<WindowId, WindowRecord>,
    pages: BTreeMap<PageId, PageInfo>,
    groups: BTreeMap<GroupId, GroupInfo>,
    focused_window: Option<WindowId>,
    active_page: Option<PageId>,
    calls: Vec<FabricCall>,
}

impl FabricState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_page(&mut self, window: WindowId, url: &str, loaded: bool) -> PageId {
        let id = PageId(self.next_id());
        self.pages.insert(
            id,
            PageInfo {
                id,
                window,
                url: url.to_string(),
                loaded,
                group: None,
            },
        );
        id
    }

    fn drop_page(&mut self, page_id: PageId) -> Option<PageInfo> {
        let page = self.pages.remove(&page_id)?;
        if let Some(group_id) = page.group {
            let empty = match self.groups.get_mut(&group_id) {
                Some(group) => {
                    group.pages.retain(|id| *id != page_id);
                    group.pages.is_empty()
                }
                None => false,
            };
            if empty {
                self.groups.remove(&group_id);
            }
        }

        // Closing the last page of a secondary window closes the window
        let window_empty = !self.pages.values().any(|p| p.window == page.window);
        if window_empty && page.window != self.main_window {
            self.windows.remove(&page.window);
            if self.focused_window == Some(page.window) {
                self.focused_window = None;
            }
        }
        if self.active_page == Some(page_id) {
            self.active_page = None;
        }
        Some(page)
    }
}

/// Mock fabric for rehearsals and tests
#[derive(Clone)]
pub struct MockFabric {
    state: Arc<Mutex<FabricState>>,
    listeners: Arc<LoadListeners>,
    events: broadcast::Sender<FabricEvent>,
    config: MockFabricConfig,
}

impl MockFabric {
    /// Create a fabric with one ordinary window holding one existing page
    pub fn new(config: MockFabricConfig) -> Self {
        let mut state = FabricState {
            next_id: 0,
            main_window: WindowId(0),
            windows: BTreeMap::new(),
            pages: BTreeMap::new(),
            groups: BTreeMap::new(),
            focused_window: None,
            active_page: None,
            calls: Vec::new(),
        };
        let main_window = WindowId(state.next_id());
        state.main_window = main_window;
        state
            .windows
            .insert(main_window, WindowRecord { isolated: false });
        let existing = state.add_page(main_window, BLANK_URL, true);
        state.focused_window = Some(main_window);
        state.active_page = Some(existing);

        let (events, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(state)),
            listeners: Arc::new(LoadListeners::new()),
            events,
            config,
        }
    }

    /// Subscribe to page lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<FabricEvent> {
        self.events.subscribe()
    }

    /// Mark a page loaded and fire its listener. Returns false for unknown pages.
    pub fn complete_load(&self, page_id: PageId) -> bool {
        {
            let mut state = self.state.lock();
            match state.pages.get_mut(&page_id) {
                Some(page) if !page.loaded => page.loaded = true,
                _ => return false,
            }
            // Fired under the state lock so a concurrent registration cannot slip between
            self.listeners.fire(page_id);
        }
        let _ = self.events.send(FabricEvent::PageLoaded(page_id));
        true
    }

    /// Close a page the way a user would, outside of any playback call
    pub fn close_page_externally(&self, page_id: PageId) -> bool {
        let removed = self.state.lock().drop_page(page_id).is_some();
        if removed {
            self.listeners.cancel(page_id);
            let _ = self.events.send(FabricEvent::PageRemoved(page_id));
        }
        removed
    }

    /// Captured calls, in issue order
    pub fn calls(&self) -> Vec<FabricCall> {
        self.state.lock().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn main_window(&self) -> WindowId {
        self.state.lock().main_window
    }

    pub fn pages(&self) -> Vec<PageInfo> {
        self.state.lock().pages.values().cloned().collect()
    }

    pub fn page(&self, page_id: PageId) -> Option<PageInfo> {
        self.state.lock().pages.get(&page_id).cloned()
    }

    pub fn groups(&self) -> Vec<GroupInfo> {
        self.state.lock().groups.values().cloned().collect()
    }

    pub fn is_isolated(&self, window: WindowId) -> Option<bool> {
        self.state.lock().windows.get(&window).map(|w| w.isolated)
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.state.lock().focused_window
    }

    pub fn active_page(&self) -> Option<PageId> {
        self.state.lock().active_page
    }

    pub fn pending_loads(&self) -> usize {
        self.listeners.pending()
    }

    fn record(&self, call: FabricCall) {
        self.state.lock().calls.push(call);
    }

    fn schedule_load(&self, page_id: PageId) {
        if self.config.hold_loads {
            return;
        }

        let jitter_ms = self.config.load_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        let delay = self.config.load_delay + jitter;

        let fabric = self.clone();
        tokio::spawn(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            fabric.complete_load(page_id);
        });
    }
}

#[async_trait]
impl ResourceFabric for MockFabric {
    async fn current_window(&self) -> Result<WindowId, FabricError> {
        Ok(self.state.lock().main_window)
    }

    async fn create_window(&self, opts: WindowOptions) -> Result<CreatedWindow, FabricError> {
        self.record(FabricCall::CreateWindow {
            isolated: opts.isolated,
        });

        if opts.isolated && self.config.fail_isolated_windows {
            return Err(FabricError::WindowCreation(
                "isolated windows are not allowed".to_string(),
            ));
        }

        let (window, initial_page) = {
            let mut state = self.state.lock();
            let window = WindowId(state.next_id());
            state.windows.insert(
                window,
                WindowRecord {
                    isolated: opts.isolated,
                },
            );
            let initial_page = state.add_page(window, BLANK_URL, true);
            (window, initial_page)
        };

        let _ = self.events.send(FabricEvent::PageCreated {
            page: initial_page,
            window,
            url: BLANK_URL.to_string(),
        });

        Ok(CreatedWindow {
            id: window,
            initial_page: Some(initial_page),
        })
    }

    async fn create_page(&self, window: WindowId, url: &str) -> Result<PageId, FabricError> {
        self.record(FabricCall::CreatePage {
            window,
            url: url.to_string(),
        });

        if self.config.failing_urls.contains(url) {
            return Err(FabricError::PageCreation {
                url: url.to_string(),
                reason: "navigation blocked".to_string(),
            });
        }

        let page_id = {
            let mut state = self.state.lock();
            if !state.windows.contains_key(&window) {
                return Err(FabricError::UnknownWindow(window));
            }
            state.add_page(window, url, false)
        };

        let _ = self.events.send(FabricEvent::PageCreated {
            page: page_id,
            window,
            url: url.to_string(),
        });
        self.schedule_load(page_id);

        Ok(page_id)
    }

    async fn remove_pages(&self, pages: &[PageId]) -> Result<(), FabricError> {
        self.record(FabricCall::RemovePages(pages.to_vec()));

        let mut stale = None;
        for page_id in pages {
            let removed = self.state.lock().drop_page(*page_id).is_some();
            if removed {
                self.listeners.cancel(*page_id);
                let _ = self.events.send(FabricEvent::PageRemoved(*page_id));
            } else if stale.is_none() {
                stale = Some(*page_id);
            }
        }

        match stale {
            Some(page_id) => Err(FabricError::StalePage(page_id)),
            None => Ok(()),
        }
    }

    async fn group_pages(
        &self,
        pages: &[PageId],
        window: WindowId,
    ) -> Result<GroupId, FabricError> {
        self.record(FabricCall::GroupPages {
            pages: pages.to_vec(),
            window,
        });

        let mut state = self.state.lock();
        if !state.windows.contains_key(&window) {
            return Err(FabricError::UnknownWindow(window));
        }
        for page_id in pages {
            match state.pages.get(page_id) {
                Some(page) if page.window == window => {}
                Some(_) => {
                    return Err(FabricError::Host(format!(
                        "page {} is not in window {}",
                        page_id, window
                    )))
                }
                None => return Err(FabricError::StalePage(*page_id)),
            }
        }

        let group_id = GroupId(state.next_id());
        for page_id in pages {
            if let Some(page) = state.pages.get_mut(page_id) {
                page.group = Some(group_id);
            }
        }
        state.groups.insert(
            group_id,
            GroupInfo {
                id: group_id,
                window,
                pages: pages.to_vec(),
                title: String::new(),
                color: None,
            },
        );
        Ok(group_id)
    }

    async fn label_group(
        &self,
        group: GroupId,
        title: &str,
        color: TabColor,
    ) -> Result<(), FabricError> {
        self.record(FabricCall::LabelGroup {
            group,
            title: title.to_string(),
            color,
        });

        let mut state = self.state.lock();
        let info = state
            .groups
            .get_mut(&group)
            .ok_or(FabricError::UnknownGroup(group))?;
        info.title = title.to_string();
        info.color = Some(color);
        Ok(())
    }

    async fn on_page_load_complete(&self, page: PageId) -> Result<LoadSignal, FabricError> {
        let mut state = self.state.lock();
        state.calls.push(FabricCall::WaitLoad(page));
        match state.pages.get(&page) {
            None => Err(FabricError::StalePage(page)),
            Some(info) if info.loaded => Ok(ready_signal()),
            Some(_) => Ok(self.listeners.register(page)),
        }
    }

    async fn focus(&self, window: WindowId) -> Result<(), FabricError> {
        let mut state = self.state.lock();
        state.calls.push(FabricCall::Focus(window));
        if !state.windows.contains_key(&window) {
            return Err(FabricError::UnknownWindow(window));
        }
        state.focused_window = Some(window);
        Ok(())
    }

    async fn activate(&self, page: PageId) -> Result<(), FabricError> {
        let mut state = self.state.lock();
        state.calls.push(FabricCall::Activate(page));
        if !state.pages.contains_key(&page) {
            return Err(FabricError::StalePage(page));
        }
        state.active_page = Some(page);
        Ok(())
    }
}
