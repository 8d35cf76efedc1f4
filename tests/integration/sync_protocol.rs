//! Integration tests for the page sync protocol
//!
//! Runs full rehearsals (orchestrator, relay host and one agent per page) and checks
//! that every page converges on exactly one overlay whatever order pushes, pulls,
//! visibility changes and relay restarts happen in.

use std::time::Duration;

use demoflow::config::{Config, KeyPress, Modifiers};
use demoflow::data::AssignmentStore;
use demoflow::fabric::{MockFabric, MockFabricConfig};
use demoflow::model::PageId;
use demoflow::page::{Editable, PageEvent, PageSnapshot};
use demoflow::relay::Visibility;
use demoflow::Rehearsal;

use super::common::fixtures::{single_step_script, tour_script, TestStore};

fn config() -> Config {
    let mut config = Config::default();
    config.agent.retry_delay = Duration::from_millis(20);
    config.keepalive.enabled = false;
    config
}

fn fast_fabric() -> MockFabric {
    MockFabric::new(
        MockFabricConfig::default()
            .with_load_delay(Duration::from_millis(2))
            .with_jitter(Duration::from_millis(15)),
    )
}

/// Poll the agent in `page` until `predicate` holds
async fn wait_for_page<F>(rehearsal: &Rehearsal, page: PageId, mut predicate: F) -> PageSnapshot
where
    F: FnMut(&PageSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(snapshot) = rehearsal.snapshot(page) {
                if predicate(&snapshot) {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("page never reached the expected state")
}

#[tokio::test]
async fn test_every_persona_page_shows_one_overlay() {
    let test_store = TestStore::new();
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fast_fabric());

    let report = rehearsal.play(tour_script()).await.unwrap();

    assert_eq!(report.summary.delivered.len(), 4);
    assert!(report.missing_overlays.is_empty());
    for page in &report.summary.delivered {
        let snapshot = rehearsal.snapshot(*page).unwrap();
        assert_eq!(snapshot.overlay_nodes, 1);
        assert_eq!(snapshot.overlays_built, 1);
    }

    // Pages of steps without a persona stay bare
    let bare: Vec<_> = report
        .summary
        .pages
        .iter()
        .filter(|page| !report.summary.delivered.contains(page))
        .collect();
    assert!(!bare.is_empty());
    for page in bare {
        assert!(!rehearsal.snapshot(*page).unwrap().has_overlay());
    }

    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_racing_triggers_never_duplicate_the_overlay() {
    let test_store = TestStore::new();
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fast_fabric());
    let report = rehearsal.play(single_step_script()).await.unwrap();
    let page = report.summary.delivered[0];
    let entry = AssignmentStore::new(test_store.store.clone())
        .get(page)
        .unwrap()
        .unwrap();

    for _ in 0..10 {
        rehearsal.relay().push_render(page, &entry);
        rehearsal.send(page, PageEvent::Visibility(Visibility::Hidden));
        rehearsal.send(page, PageEvent::Visibility(Visibility::Visible));
    }
    // Marker event: once the focus is visible, every earlier trigger was handled
    rehearsal.send(page, PageEvent::Focus(Editable::new("done")));
    let snapshot = wait_for_page(&rehearsal, page, |s| s.focused.is_some()).await;

    assert_eq!(snapshot.overlay_nodes, 1);
    assert_eq!(snapshot.overlays_built, 1);

    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_agents_recover_after_relay_restart() {
    let test_store = TestStore::new();
    let fabric = MockFabric::new(MockFabricConfig::default().holding_loads());
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fabric);

    let handle = rehearsal
        .orchestrator()
        .play(single_step_script())
        .await
        .unwrap();
    let page = handle.pages()[2];
    wait_for_page(&rehearsal, page, |s| s.state.is_connected()).await;

    // The host goes away before the page finishes loading: the push is lost
    rehearsal.relay().suspend();
    rehearsal.fabric().complete_load(page);
    let summary = handle.settle().await;
    assert_eq!(summary.delivered, vec![page]);
    assert_eq!(summary.pushed, 0);

    // A fresh host process; the agent reconnects and pulls the stored assignment
    rehearsal.relay().resume();
    let snapshot = wait_for_page(&rehearsal, page, |s| s.has_overlay()).await;
    assert_eq!(snapshot.persona_name(), Some("John Doe"));
    assert!(snapshot.connect_attempts >= 2);
    assert_eq!(rehearsal.relay().stats().restarts, 1);

    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_push_reaches_connected_agent() {
    let test_store = TestStore::new();
    let fabric = MockFabric::new(MockFabricConfig::default().holding_loads());
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fabric);

    let handle = rehearsal
        .orchestrator()
        .play(single_step_script())
        .await
        .unwrap();
    let page = handle.pages()[2];
    wait_for_page(&rehearsal, page, |s| s.state.is_connected()).await;

    rehearsal.fabric().complete_load(page);
    let summary = handle.settle().await;

    assert_eq!(summary.pushed, 1);
    wait_for_page(&rehearsal, page, |s| s.has_overlay()).await;
    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_closing_a_hidden_page_collects_its_assignment() {
    let test_store = TestStore::new();
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fast_fabric());
    let report = rehearsal.play(tour_script()).await.unwrap();
    let assignments = AssignmentStore::new(test_store.store.clone());

    let closed = report.summary.delivered[0];
    let kept = report.summary.delivered[1];
    rehearsal.fabric().close_page_externally(closed);

    tokio::time::timeout(Duration::from_secs(5), async {
        while assignments.get(closed).unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("assignment of the closed page was not collected");
    assert!(assignments.get(kept).unwrap().is_some());

    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_hotkey_types_canned_text_into_focused_field() {
    let test_store = TestStore::new();
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fast_fabric());
    let report = rehearsal.play(single_step_script()).await.unwrap();
    let page = report.summary.delivered[0];

    rehearsal.send(page, PageEvent::Focus(Editable::new("Reply: ")));
    rehearsal.send(
        page,
        PageEvent::Key(KeyPress::new(Modifiers::ctrl_shift(), '1')),
    );

    let snapshot = wait_for_page(&rehearsal, page, |s| {
        s.focused
            .as_ref()
            .is_some_and(|field| field.text() != "Reply: ")
    })
    .await;
    assert_eq!(
        snapshot.focused.unwrap().text(),
        "Reply: Approved, ship it."
    );

    rehearsal.shutdown().await;
}

#[tokio::test]
async fn test_clear_unloads_agents_and_forgets_assignments() {
    let test_store = TestStore::new();
    let rehearsal = Rehearsal::with_fabric(test_store.store.clone(), &config(), fast_fabric());
    let report = rehearsal.play(tour_script()).await.unwrap();

    let cleared = rehearsal.clear().await.unwrap();
    assert_eq!(cleared.attempted, report.summary.pages);

    assert!(AssignmentStore::new(test_store.store.clone())
        .all()
        .unwrap()
        .is_empty());
    rehearsal.shutdown().await;
}
