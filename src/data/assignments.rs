//! AssignmentMap data access object

use std::collections::BTreeMap;

use crate::model::{AssignmentEntry, PageId};

use super::database::StoreError;
use super::keys::PERSONA_TABS;
use super::store::SharedStore;

type EntryMap = BTreeMap<String, AssignmentEntry>;

/// Durable page id -> persona mapping consulted by every page agent
#[derive(Clone, Debug)]
pub struct AssignmentStore {
    store: SharedStore,
}

impl AssignmentStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Write the entry for `page_id`, validating it first
    pub fn put(&self, page_id: PageId, entry: &AssignmentEntry) -> Result<(), AssignmentWriteError> {
        entry.validate()?;
        self.store.update::<EntryMap, _>(PERSONA_TABS, |current| {
            let mut entries = current.unwrap_or_default();
            entries.insert(page_id.to_string(), entry.clone());
            Some(entries)
        })?;
        Ok(())
    }

    pub fn get(&self, page_id: PageId) -> Result<Option<AssignmentEntry>, StoreError> {
        let entries: Option<EntryMap> = self.store.get_json(PERSONA_TABS)?;
        Ok(entries.and_then(|mut entries| entries.remove(&page_id.to_string())))
    }

    /// Remove the entry for `page_id`; returns whether one existed
    pub fn remove(&self, page_id: PageId) -> Result<bool, StoreError> {
        self.remove_many(&[page_id]).map(|removed| removed > 0)
    }

    /// Remove entries for several pages; returns how many existed
    pub fn remove_many(&self, page_ids: &[PageId]) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.store.update::<EntryMap, _>(PERSONA_TABS, |current| {
            let mut entries = current?;
            for page_id in page_ids {
                if entries.remove(&page_id.to_string()).is_some() {
                    removed += 1;
                }
            }
            Some(entries)
        })?;
        Ok(removed)
    }

    /// All entries, skipping keys that are not page ids
    pub fn all(&self) -> Result<BTreeMap<PageId, AssignmentEntry>, StoreError> {
        let entries: EntryMap = self.store.get_json(PERSONA_TABS)?.unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter_map(|(key, entry)| match key.parse::<PageId>() {
                Ok(page_id) => Some((page_id, entry)),
                Err(_) => {
                    tracing::debug!(key = %key, "Ignoring malformed assignment key");
                    None
                }
            })
            .collect())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&[PERSONA_TABS])
    }
}

/// Failure to write an assignment entry
#[derive(Debug, thiserror::Error)]
pub enum AssignmentWriteError {
    #[error("Invalid assignment: {0}")]
    Invalid(#[from] crate::model::ScriptError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
