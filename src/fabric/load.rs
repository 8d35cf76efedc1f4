//! One-shot "navigation complete" listeners keyed by page id

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::model::PageId;

/// Resolves when the page finishes loading; errors if the page goes away first
pub type LoadSignal = oneshot::Receiver<()>;

/// Registry of single-use continuations, one per page id.
///
/// An entry is removed the first time it fires, so a page's listener never
/// triggers twice and the map never grows beyond the pages still loading.
#[derive(Default)]
pub struct LoadListeners {
    waiting: Mutex<HashMap<PageId, oneshot::Sender<()>>>,
}

impl LoadListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the listener for `page_id`, replacing any earlier one
    pub fn register(&self, page_id: PageId) -> LoadSignal {
        let (tx, rx) = oneshot::channel();
        if self.waiting.lock().insert(page_id, tx).is_some() {
            tracing::debug!(page_id = %page_id, "Replaced pending load listener");
        }
        rx
    }

    /// Fire and remove the listener for `page_id`. Returns whether one was waiting.
    pub fn fire(&self, page_id: PageId) -> bool {
        match self.waiting.lock().remove(&page_id) {
            // The waiter may have given up; that is not an error
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Drop the listener without firing (the page went away)
    pub fn cancel(&self, page_id: PageId) {
        self.waiting.lock().remove(&page_id);
    }

    pub fn pending(&self) -> usize {
        self.waiting.lock().len()
    }
}

/// A signal that has already fired
pub fn ready_signal() -> LoadSignal {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(());
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fires_once_and_self_removes() {
        let listeners = LoadListeners::new();
        let signal = listeners.register(PageId(1));
        assert_eq!(listeners.pending(), 1);

        assert!(listeners.fire(PageId(1)));
        assert_eq!(listeners.pending(), 0);
        assert!(signal.await.is_ok());

        // Second completion of the same page finds nobody waiting
        assert!(!listeners.fire(PageId(1)));
    }

    #[tokio::test]
    async fn test_listeners_are_keyed_per_page() {
        let listeners = LoadListeners::new();
        let first = listeners.register(PageId(1));
        let second = listeners.register(PageId(2));

        // Completion order differs from registration order
        listeners.fire(PageId(2));
        assert!(second.await.is_ok());
        assert_eq!(listeners.pending(), 1);

        listeners.fire(PageId(1));
        assert!(first.await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter_with_error() {
        let listeners = LoadListeners::new();
        let signal = listeners.register(PageId(5));
        listeners.cancel(PageId(5));
        assert!(signal.await.is_err());
        assert_eq!(listeners.pending(), 0);
    }

    #[tokio::test]
    async fn test_ready_signal() {
        assert!(ready_signal().await.is_ok());
    }
}
