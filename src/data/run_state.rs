//! RunState data access object

use crate::model::{PageId, RunId, RunState, WindowId};

use super::database::StoreError;
use super::keys::{DEMO_RUN_ID, DEMO_TAB_IDS, DEMO_WINDOW_IDS};
use super::store::SharedStore;

/// Incrementally persisted bookkeeping of resources created by the current run
#[derive(Clone, Debug)]
pub struct RunStateStore {
    store: SharedStore,
}

impl RunStateStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Start a fresh record for `run_id`, dropping whatever the previous run left
    pub fn begin(&self, run_id: RunId) -> Result<(), StoreError> {
        self.store.remove(&[DEMO_TAB_IDS, DEMO_WINDOW_IDS])?;
        self.store.put_json(DEMO_RUN_ID, &run_id)
    }

    /// Append a page id; re-reads the list immediately before writing it back
    pub fn append_page(&self, page_id: PageId) -> Result<(), StoreError> {
        self.store.update::<Vec<PageId>, _>(DEMO_TAB_IDS, |current| {
            let mut ids = current.unwrap_or_default();
            ids.push(page_id);
            Some(ids)
        })?;
        Ok(())
    }

    pub fn append_window(&self, window_id: WindowId) -> Result<(), StoreError> {
        self.store.update::<Vec<WindowId>, _>(DEMO_WINDOW_IDS, |current| {
            let mut ids = current.unwrap_or_default();
            ids.push(window_id);
            Some(ids)
        })?;
        Ok(())
    }

    pub fn run_id(&self) -> Result<Option<RunId>, StoreError> {
        self.store.get_json(DEMO_RUN_ID)
    }

    pub fn load(&self) -> Result<RunState, StoreError> {
        Ok(RunState {
            run_id: self.run_id()?,
            created_page_ids: self.store.get_json(DEMO_TAB_IDS)?.unwrap_or_default(),
            created_window_ids: self.store.get_json(DEMO_WINDOW_IDS)?.unwrap_or_default(),
        })
    }

    /// Erase the record
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&[DEMO_RUN_ID, DEMO_TAB_IDS, DEMO_WINDOW_IDS])
    }
}
