//! Integration tests for playback and teardown
//!
//! Drives the orchestrator against the in-memory fabric and checks the resources
//! it issues, in order, and what ends up in the shared store.

use std::sync::Arc;

use demoflow::config::PlaybackConfig;
use demoflow::data::{AssignmentStore, RunStateStore};
use demoflow::fabric::mock::BLANK_URL;
use demoflow::fabric::{FabricCall, MockFabric, MockFabricConfig, ResourceFabric};
use demoflow::model::{PageId, RunId, Step, TabColor};
use demoflow::{Orchestrator, RelayHost};

use super::common::fixtures::{base_script, single_step_script, tour_script, TestStore};

fn orchestrator(
    test_store: &TestStore,
    fabric: MockFabric,
    config: PlaybackConfig,
) -> (Arc<MockFabric>, Orchestrator<MockFabric>) {
    let fabric = Arc::new(fabric);
    let orchestrator = Orchestrator::new(
        Arc::clone(&fabric),
        test_store.store.clone(),
        RelayHost::new(test_store.store.clone()),
        config,
    );
    (fabric, orchestrator)
}

fn held() -> MockFabric {
    MockFabric::new(MockFabricConfig::default().holding_loads())
}

/// Step index encoded in a tour url (`https://s<step>-<n>.example`)
fn step_of(url: &str) -> Option<usize> {
    let rest = url.strip_prefix("https://s")?;
    rest.split('-').next()?.parse().ok()
}

#[tokio::test]
async fn test_single_step_tracks_three_pages_and_assigns_persona() {
    let test_store = TestStore::new();
    let config = PlaybackConfig {
        completion_url: String::new(),
        ..PlaybackConfig::default()
    };
    let (fabric, orchestrator) = orchestrator(&test_store, held(), config);

    let handle = orchestrator.play(single_step_script()).await.unwrap();

    let tracked = RunStateStore::new(test_store.store.clone()).load().unwrap();
    assert_eq!(tracked.created_page_ids.len(), 3);
    assert_eq!(tracked.run_id, handle.id());

    let assignments = AssignmentStore::new(test_store.store.clone());
    assert!(assignments.all().unwrap().is_empty(), "nothing before load");

    let step_page = tracked.created_page_ids[2];
    assert_eq!(
        fabric.page(step_page).unwrap().url,
        "https://a.example".to_string()
    );
    fabric.complete_load(step_page);
    let summary = handle.settle().await;

    let all = assignments.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&step_page].persona.name, "John Doe");
    assert_eq!(
        all[&step_page].persona.picture_ref.as_deref(),
        Some("personas/john.png")
    );
    assert_eq!(summary.delivered, vec![step_page]);
}

#[tokio::test]
async fn test_completion_page_is_tracked_last() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());

    let handle = orchestrator.play(single_step_script()).await.unwrap();

    let pages = handle.pages().to_vec();
    assert_eq!(pages.len(), 4);
    assert_eq!(
        fabric.page(pages[3]).unwrap().url,
        "demoflow://overview?complete=true"
    );
    assert_eq!(fabric.active_page(), Some(pages[0]));
}

#[tokio::test]
async fn test_clear_attempts_every_page_when_one_is_already_closed() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());

    let window = fabric.current_window().await.unwrap();
    let runs = RunStateStore::new(test_store.store.clone());
    let run_id = RunId::new();
    runs.begin(run_id).unwrap();
    let mut pages = Vec::new();
    for url in ["https://1.example", "https://2.example", "https://3.example"] {
        let page = fabric.create_page(window, url).await.unwrap();
        runs.append_page(page).unwrap();
        pages.push(page);
    }
    fabric.close_page_externally(pages[1]);
    fabric.reset_calls();

    let report = orchestrator.clear(None).await.unwrap();

    let removals: Vec<Vec<PageId>> = fabric
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            FabricCall::RemovePages(ids) => Some(ids),
            _ => None,
        })
        .collect();
    assert_eq!(
        removals,
        vec![vec![pages[0]], vec![pages[1]], vec![pages[2]]]
    );
    assert_eq!(report.removed, 2);
    assert_eq!(report.already_gone, 1);
    assert!(fabric.page(pages[0]).is_none());
    assert!(fabric.page(pages[2]).is_none());
    assert!(runs.load().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_after_partial_failures_removes_everything_tracked() {
    let test_store = TestStore::new();
    let fabric = MockFabric::new(
        MockFabricConfig::default()
            .holding_loads()
            .failing_url("https://s2-1.example"),
    );
    let (fabric, orchestrator) = orchestrator(&test_store, fabric, PlaybackConfig::default());

    let handle = orchestrator.play(tour_script()).await.unwrap();
    let tracked = handle.pages().to_vec();
    assert!(!tracked.is_empty());

    let report = orchestrator.clear(handle.id()).await.unwrap();

    assert_eq!(report.attempted, tracked);
    assert_eq!(report.failed, 0);
    // Only the pre-existing page of the main window is left
    let remaining: Vec<_> = fabric.pages().into_iter().map(|p| p.url).collect();
    assert_eq!(remaining, vec![BLANK_URL.to_string()]);
}

#[tokio::test]
async fn test_steps_are_issued_in_order() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());
    let script = tour_script();
    let step_count = script.steps.len();

    orchestrator.play(script).await.unwrap();

    let mut groups_seen = 0;
    let mut labels_seen = 0;
    let mut isolated_windows = 0;
    let mut last_step = 0;
    for call in fabric.calls() {
        match call {
            FabricCall::CreatePage { url, .. } => {
                let Some(step) = step_of(&url) else {
                    continue;
                };
                assert!(step >= last_step, "step {step} issued after step {last_step}");
                assert_eq!(groups_seen, step, "step {step} started before earlier steps were grouped");
                assert_eq!(labels_seen, step);
                last_step = step;
            }
            FabricCall::CreateWindow { isolated: true } => {
                // Isolated windows open at the start of steps 1 and 3
                let expected = [1, 3][isolated_windows];
                assert_eq!(groups_seen, expected);
                isolated_windows += 1;
            }
            FabricCall::GroupPages { .. } => groups_seen += 1,
            FabricCall::LabelGroup { .. } => labels_seen += 1,
            _ => {}
        }
    }
    assert_eq!(groups_seen, step_count);
    assert_eq!(labels_seen, step_count);
    assert_eq!(isolated_windows, 2);
}

#[tokio::test]
async fn test_page_creation_follows_url_order_within_step() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());

    orchestrator.play(tour_script()).await.unwrap();

    let urls: Vec<String> = fabric
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            FabricCall::CreatePage { url, .. } if step_of(&url) == Some(2) => Some(url),
            _ => None,
        })
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://s2-0.example",
            "https://s2-1.example",
            "https://s2-2.example"
        ]
    );
}

#[tokio::test]
async fn test_colors_outside_palette_become_green() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());

    let authored = ["mauve", "", "Blue", "purple", "ORANGE", "cyan"];
    let mut script = base_script();
    for (index, color) in authored.iter().enumerate() {
        script.steps.push(
            Step::new(format!("Step {index}"))
                .with_urls([format!("https://c{index}.example")])
                .with_tab_color(*color),
        );
    }

    orchestrator.play(script).await.unwrap();

    let colors: Vec<Option<TabColor>> = fabric.groups().into_iter().map(|g| g.color).collect();
    assert_eq!(
        colors,
        vec![
            Some(TabColor::Green),
            Some(TabColor::Green),
            Some(TabColor::Green),
            Some(TabColor::Purple),
            Some(TabColor::Green),
            Some(TabColor::Cyan),
        ]
    );
}

#[tokio::test]
async fn test_incognito_steps_are_isolated() {
    let test_store = TestStore::new();
    let (fabric, orchestrator) =
        orchestrator(&test_store, held(), PlaybackConfig::default());

    orchestrator.play(tour_script()).await.unwrap();

    let main = fabric.main_window();
    let pages = fabric.pages();
    let window_of = |prefix: &str| -> Vec<_> {
        pages
            .iter()
            .filter(|p| p.url.starts_with(prefix))
            .map(|p| p.window)
            .collect()
    };

    let private = window_of("https://s1-");
    let second_private = window_of("https://s3-");
    assert_eq!(private.len(), 2);
    assert!(private.iter().all(|w| *w == private[0]));
    assert_ne!(private[0], main);
    assert_ne!(second_private[0], main);
    assert_ne!(second_private[0], private[0]);
    assert_eq!(fabric.is_isolated(private[0]), Some(true));

    // Ordinary steps share the main window
    assert!(window_of("https://s0-").iter().all(|w| *w == main));
    assert!(window_of("https://s2-").iter().all(|w| *w == main));

    // No blank page survives in the isolated windows
    assert!(pages
        .iter()
        .filter(|p| p.window != main)
        .all(|p| p.url != BLANK_URL));

    let tracked = RunStateStore::new(test_store.store.clone()).load().unwrap();
    assert_eq!(tracked.created_window_ids, vec![private[0], second_private[0]]);
}

#[tokio::test]
async fn test_loads_completing_out_of_order_assign_each_page() {
    let test_store = TestStore::new();
    let fabric = MockFabric::new(
        MockFabricConfig::default()
            .with_load_delay(std::time::Duration::from_millis(1))
            .with_jitter(std::time::Duration::from_millis(30)),
    );
    let (_fabric, orchestrator) =
        orchestrator(&test_store, fabric, PlaybackConfig::default());

    let summary = orchestrator.play(tour_script()).await.unwrap().settle().await;

    let assignments = AssignmentStore::new(test_store.store.clone()).all().unwrap();
    // Two pages for John, two for Ana; the other steps carry no persona
    assert_eq!(summary.delivered.len(), 4);
    assert_eq!(assignments.len(), 4);
    let mut names: Vec<&str> = assignments
        .values()
        .map(|entry| entry.persona.name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Ana Lima", "Ana Lima", "John Doe", "John Doe"]);
    assert!(assignments.values().all(|entry| entry.theme.as_str() == "light"));
}
