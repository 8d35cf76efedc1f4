//! Bookkeeping of every resource a run created.

use serde::{Deserialize, Serialize};

use super::ids::{PageId, RunId, WindowId};

/// Resource ids created by the current playback, used for bulk teardown
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Option<RunId>,
    pub created_page_ids: Vec<PageId>,
    pub created_window_ids: Vec<WindowId>,
}

impl RunState {
    pub fn is_empty(&self) -> bool {
        self.run_id.is_none()
            && self.created_page_ids.is_empty()
            && self.created_window_ids.is_empty()
    }
}
