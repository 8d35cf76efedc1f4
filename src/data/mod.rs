//! Data persistence layer
//!
//! A SQLite-backed key-value store shared by every playback context, plus typed
//! accessors for the keys each concern owns.

mod assignments;
mod database;
pub mod keys;
mod migrations;
mod run_state;
mod scripts;
mod store;

pub use assignments::{AssignmentStore, AssignmentWriteError};
pub use database::{Database, StoreError};
pub use run_state::RunStateStore;
pub use scripts::{ScriptStore, TemplateStore};
pub use store::{Record, SharedStore};
