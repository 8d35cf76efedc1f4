//! Domain types shared by the orchestrator, relay and page agents.

mod assignment;
mod ids;
mod run_state;
mod script;

pub use assignment::AssignmentEntry;
pub use ids::{GroupId, PageId, RunId, WindowId};
pub use run_state::RunState;
pub use script::{
    DemoScript, Persona, PersonaKey, ScriptError, Step, TabColor, Theme, MAX_FAKE_TEXTS,
};
