//! Handles and reports for a playback run

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::model::{PageId, RunId, WindowId};

/// Outcome of one persona delivery task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Entry written; `pushed` tells whether a live agent received the notification
    Written { page_id: PageId, pushed: bool },
    /// The page went away (or the write failed) before the entry could be stored
    Missed { page_id: PageId },
}

/// What a run created and what it had to skip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Option<RunId>,
    /// Every tracked page, in tracking order
    pub pages: Vec<PageId>,
    pub windows: Vec<WindowId>,
    /// Zero-based indices of steps whose isolated window could not be created
    pub skipped_steps: Vec<usize>,
    pub failed_urls: Vec<String>,
    /// Pages whose assignment was written
    pub delivered: Vec<PageId>,
    /// Pages whose agent received the push directly
    pub pushed: usize,
    pub missed: Vec<PageId>,
}

/// A started run. Persona deliveries may still be pending.
///
/// Dropping the handle detaches the delivery tasks; they still complete.
#[derive(Debug)]
pub struct RunHandle {
    summary: RunSummary,
    deliveries: Vec<JoinHandle<Delivery>>,
}

impl RunHandle {
    pub(crate) fn new(summary: RunSummary, deliveries: Vec<JoinHandle<Delivery>>) -> Self {
        Self {
            summary,
            deliveries,
        }
    }

    pub fn id(&self) -> Option<RunId> {
        self.summary.run_id
    }

    /// Pages tracked so far; complete once `play` has returned
    pub fn pages(&self) -> &[PageId] {
        &self.summary.pages
    }

    /// Wait for every persona delivery and report the run
    pub async fn settle(self) -> RunSummary {
        let mut summary = self.summary;
        for result in join_all(self.deliveries).await {
            match result {
                Ok(Delivery::Written { page_id, pushed }) => {
                    summary.delivered.push(page_id);
                    if pushed {
                        summary.pushed += 1;
                    }
                }
                Ok(Delivery::Missed { page_id }) => summary.missed.push(page_id),
                Err(e) => tracing::warn!(error = %e, "Persona delivery task failed"),
            }
        }
        summary.delivered.sort();
        summary.missed.sort();
        summary
    }
}

/// Result of a `clear`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// One entry per removal attempt, in tracking order
    pub attempted: Vec<PageId>,
    pub removed: usize,
    pub already_gone: usize,
    pub failed: usize,
    pub assignments_removed: usize,
    /// The requested run was not the recorded one; nothing was touched
    pub superseded: bool,
}
