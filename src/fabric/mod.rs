//! Resource fabric: the capability surface for windows, pages and tab groups
//!
//! The orchestrator only ever talks to a `ResourceFabric`. A browser-extension host,
//! a DevTools bridge or the in-memory [`mock::MockFabric`] can sit behind it.

mod error;
mod load;
pub mod mock;

use async_trait::async_trait;

use crate::model::{GroupId, PageId, TabColor, WindowId};

pub use error::FabricError;
pub use load::{ready_signal, LoadListeners, LoadSignal};
pub use mock::{FabricCall, FabricEvent, MockFabric, MockFabricConfig};

/// Options for `create_window`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowOptions {
    /// Isolated (incognito) browsing context
    pub isolated: bool,
}

/// A window returned by `create_window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedWindow {
    pub id: WindowId,
    /// Blank page the host opens with every new window
    pub initial_page: Option<PageId>,
}

/// Capability surface for creating and removing browser resources
#[async_trait]
pub trait ResourceFabric: Send + Sync {
    /// Ordinary window that non-isolated pages open in
    async fn current_window(&self) -> Result<WindowId, FabricError>;

    async fn create_window(&self, opts: WindowOptions) -> Result<CreatedWindow, FabricError>;

    async fn create_page(&self, window: WindowId, url: &str) -> Result<PageId, FabricError>;

    /// Remove pages; already-removed ids are reported as `FabricError::StalePage`
    async fn remove_pages(&self, pages: &[PageId]) -> Result<(), FabricError>;

    async fn group_pages(&self, pages: &[PageId], window: WindowId)
        -> Result<GroupId, FabricError>;

    async fn label_group(
        &self,
        group: GroupId,
        title: &str,
        color: TabColor,
    ) -> Result<(), FabricError>;

    /// One-shot wait for the page's navigation-complete transition
    async fn on_page_load_complete(&self, page: PageId) -> Result<LoadSignal, FabricError>;

    async fn focus(&self, window: WindowId) -> Result<(), FabricError>;

    async fn activate(&self, page: PageId) -> Result<(), FabricError>;
}
