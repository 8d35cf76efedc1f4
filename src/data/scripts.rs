//! Script and template data access objects

use std::collections::BTreeMap;

use crate::model::DemoScript;

use super::database::StoreError;
use super::keys::{DEMO, PENDING_TEMPLATE, USER_TEMPLATES};
use super::store::SharedStore;

/// Active and pending scripts
#[derive(Clone, Debug)]
pub struct ScriptStore {
    store: SharedStore,
}

impl ScriptStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Persist the script of the run that is starting
    pub fn save_active(&self, script: &DemoScript) -> Result<(), StoreError> {
        self.store.put_json(DEMO, script)
    }

    pub fn active(&self) -> Result<Option<DemoScript>, StoreError> {
        self.store.get_json(DEMO)
    }

    /// Queue an imported script for the next run
    pub fn save_pending(&self, script: &DemoScript) -> Result<(), StoreError> {
        self.store.put_json(PENDING_TEMPLATE, script)
    }

    pub fn pending(&self) -> Result<Option<DemoScript>, StoreError> {
        self.store.get_json(PENDING_TEMPLATE)
    }

    /// Drop the pending script once a run has started from it
    pub fn clear_pending(&self) -> Result<(), StoreError> {
        self.store.remove(&[PENDING_TEMPLATE])
    }
}

/// Scripts saved by name from the authoring UI
#[derive(Clone, Debug)]
pub struct TemplateStore {
    store: SharedStore,
}

impl TemplateStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn save(&self, name: &str, script: &DemoScript) -> Result<(), StoreError> {
        self.store
            .update::<BTreeMap<String, DemoScript>, _>(USER_TEMPLATES, |current| {
                let mut templates = current.unwrap_or_default();
                templates.insert(name.to_string(), script.clone());
                Some(templates)
            })?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Option<DemoScript>, StoreError> {
        let templates: Option<BTreeMap<String, DemoScript>> = self.store.get_json(USER_TEMPLATES)?;
        Ok(templates.and_then(|mut templates| templates.remove(name)))
    }

    /// Template names in alphabetical order
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let templates: BTreeMap<String, DemoScript> =
            self.store.get_json(USER_TEMPLATES)?.unwrap_or_default();
        Ok(templates.into_keys().collect())
    }

    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut existed = false;
        self.store
            .update::<BTreeMap<String, DemoScript>, _>(USER_TEMPLATES, |current| {
                let mut templates = current?;
                existed = templates.remove(name).is_some();
                Some(templates)
            })?;
        Ok(existed)
    }
}
