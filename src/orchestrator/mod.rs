//! Playback orchestrator: plays demo scripts and tears runs down

mod error;
mod playback;
mod run;

pub use error::PlayError;
pub use playback::Orchestrator;
pub use run::{ClearReport, RunHandle, RunSummary};
