use thiserror::Error;

use crate::data::StoreError;
use crate::fabric::FabricError;
use crate::model::ScriptError;

/// Terminal playback failures.
///
/// Per-resource failures never surface here; they are logged and the run continues.
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("No script to play")]
    NoScript,

    #[error("Invalid script: {0}")]
    InvalidScript(#[from] ScriptError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The fabric has no ordinary window to open pages in
    #[error("No window to play into: {0}")]
    NoWindow(#[source] FabricError),
}
