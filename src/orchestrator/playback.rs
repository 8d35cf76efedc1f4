//! Playback orchestrator
//!
//! Turns a `DemoScript` into windows, pages and tab groups through a `ResourceFabric`,
//! one step at a time, and hands personas to page agents through the shared store
//! and the relay. Every created id is written to the store before the next call is
//! issued, so `clear` can tear down whatever a run managed to create.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;

use super::error::PlayError;
use super::run::{ClearReport, Delivery, RunHandle, RunSummary};
use crate::config::PlaybackConfig;
use crate::data::{AssignmentStore, RunStateStore, ScriptStore, SharedStore};
use crate::fabric::{ResourceFabric, WindowOptions};
use crate::model::{AssignmentEntry, DemoScript, PageId, RunId, Step, WindowId};
use crate::relay::RelayHost;

/// Drives playback and teardown of demo runs
pub struct Orchestrator<F> {
    fabric: Arc<F>,
    relay: RelayHost,
    scripts: ScriptStore,
    runs: RunStateStore,
    assignments: AssignmentStore,
    config: PlaybackConfig,
}

/// Mutable bookkeeping of a run while `play` is executing
struct RunProgress {
    summary: RunSummary,
    deliveries: Vec<JoinHandle<Delivery>>,
    first_page: Option<(PageId, WindowId)>,
}

impl<F> Orchestrator<F>
where
    F: ResourceFabric + 'static,
{
    pub fn new(
        fabric: Arc<F>,
        store: SharedStore,
        relay: RelayHost,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            fabric,
            relay,
            scripts: ScriptStore::new(store.clone()),
            runs: RunStateStore::new(store.clone()),
            assignments: AssignmentStore::new(store),
            config,
        }
    }

    pub fn fabric(&self) -> &Arc<F> {
        &self.fabric
    }

    /// Play the pending script, falling back to the active one.
    ///
    /// The pending script stays queued until its run has started.
    pub async fn play_stored(&self) -> Result<RunHandle, PlayError> {
        let (script, pending) = match self.scripts.pending()? {
            Some(script) => (script, true),
            None => (self.scripts.active()?.ok_or(PlayError::NoScript)?, false),
        };
        let handle = self.play(script).await?;
        if pending {
            self.scripts.clear_pending()?;
        }
        Ok(handle)
    }

    /// Materialise `script`. Returns once every resource-creation call has been issued;
    /// persona deliveries continue in the background (see [`RunHandle::settle`]).
    pub async fn play(&self, script: DemoScript) -> Result<RunHandle, PlayError> {
        script.validate()?;

        if self.config.clear_before_play {
            self.clear(None).await?;
        }

        let run_id = RunId::new();
        self.runs.begin(run_id)?;
        self.scripts.save_active(&script)?;

        let window = self
            .fabric
            .current_window()
            .await
            .map_err(PlayError::NoWindow)?;

        tracing::info!(
            run_id = %run_id,
            steps = script.steps.len(),
            product = %script.product,
            "Starting playback"
        );

        let mut run = RunProgress {
            summary: RunSummary {
                run_id: Some(run_id),
                ..RunSummary::default()
            },
            deliveries: Vec::new(),
            first_page: None,
        };

        for url in [&self.config.overview_url, &self.config.personas_url] {
            self.create_tracked_page(&mut run, window, url).await?;
        }

        for (index, step) in script.steps.iter().enumerate() {
            self.play_step(&mut run, &script, index, step, window).await?;
        }

        if !self.config.completion_url.is_empty() {
            self.create_tracked_page(&mut run, window, &self.config.completion_url)
                .await?;
        }

        if let Some((page_id, window_id)) = run.first_page {
            if let Err(e) = self.fabric.activate(page_id).await {
                tracing::warn!(page_id = %page_id, error = %e, "Failed to activate first page");
            }
            if let Err(e) = self.fabric.focus(window_id).await {
                tracing::warn!(window_id = %window_id, error = %e, "Failed to focus window");
            }
        }

        tracing::info!(
            run_id = %run_id,
            pages = run.summary.pages.len(),
            skipped_steps = run.summary.skipped_steps.len(),
            failed_urls = run.summary.failed_urls.len(),
            "Playback issued"
        );

        Ok(RunHandle::new(run.summary, run.deliveries))
    }

    async fn play_step(
        &self,
        run: &mut RunProgress,
        script: &DemoScript,
        index: usize,
        step: &Step,
        main_window: WindowId,
    ) -> Result<(), PlayError> {
        if step.urls.is_empty() {
            tracing::debug!(step = index, title = %step.title, "Step has no pages");
            return Ok(());
        }

        let (window, blank_page) = if step.needs_isolated_window() {
            match self
                .fabric
                .create_window(WindowOptions { isolated: true })
                .await
            {
                Ok(created) => {
                    self.runs.append_window(created.id)?;
                    run.summary.windows.push(created.id);
                    (created.id, created.initial_page)
                }
                Err(e) => {
                    tracing::warn!(
                        step = index,
                        title = %step.title,
                        error = %e,
                        "Isolated window rejected, skipping step"
                    );
                    run.summary.skipped_steps.push(index);
                    return Ok(());
                }
            }
        } else {
            (main_window, None)
        };

        // Issued in url order; completion order is up to the fabric
        let created = join_all(
            step.urls
                .iter()
                .map(|url| self.create_page_in_step(index, window, url)),
        )
        .await;

        let mut pages = Vec::with_capacity(created.len());
        for (url, result) in step.urls.iter().zip(created) {
            match result? {
                Some(page_id) => {
                    run.summary.pages.push(page_id);
                    if run.first_page.is_none() {
                        run.first_page = Some((page_id, window));
                    }
                    pages.push(page_id);
                }
                None => run.summary.failed_urls.push(url.clone()),
            }
        }

        if let Some(blank) = blank_page {
            match self.fabric.remove_pages(&[blank]).await {
                Ok(()) => {}
                Err(e) if e.is_stale() => {
                    tracing::debug!(page_id = %blank, "Initial blank page already gone");
                }
                Err(e) => {
                    tracing::warn!(page_id = %blank, error = %e, "Failed to close initial blank page");
                }
            }
        }

        if let Some(entry) = AssignmentEntry::for_step(script, step) {
            for page_id in &pages {
                run.deliveries.push(self.spawn_delivery(*page_id, entry.clone()));
            }
        }

        if pages.is_empty() {
            return Ok(());
        }

        match self.fabric.group_pages(&pages, window).await {
            Ok(group) => {
                if let Err(e) = self
                    .fabric
                    .label_group(group, &step.title, step.group_color())
                    .await
                {
                    tracing::warn!(step = index, group_id = %group, error = %e, "Failed to label group");
                }
            }
            Err(e) => {
                tracing::warn!(step = index, error = %e, "Failed to group step pages");
            }
        }

        Ok(())
    }

    /// Create one page of a step and track it. `None` if the fabric rejected it.
    async fn create_page_in_step(
        &self,
        step: usize,
        window: WindowId,
        url: &str,
    ) -> Result<Option<PageId>, PlayError> {
        match self.fabric.create_page(window, url).await {
            Ok(page_id) => {
                self.runs.append_page(page_id)?;
                Ok(Some(page_id))
            }
            Err(e) => {
                tracing::warn!(step, url, error = %e, "Page creation failed");
                Ok(None)
            }
        }
    }

    async fn create_tracked_page(
        &self,
        run: &mut RunProgress,
        window: WindowId,
        url: &str,
    ) -> Result<(), PlayError> {
        match self.fabric.create_page(window, url).await {
            Ok(page_id) => {
                self.runs.append_page(page_id)?;
                run.summary.pages.push(page_id);
                if run.first_page.is_none() {
                    run.first_page = Some((page_id, window));
                }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Page creation failed");
                run.summary.failed_urls.push(url.to_string());
            }
        }
        Ok(())
    }

    /// Wait for the page's load, then write its assignment and notify its agent
    fn spawn_delivery(&self, page_id: PageId, entry: AssignmentEntry) -> JoinHandle<Delivery> {
        let fabric = Arc::clone(&self.fabric);
        let assignments = self.assignments.clone();
        let relay = self.relay.clone();

        tokio::spawn(async move {
            let loaded = match fabric.on_page_load_complete(page_id).await {
                Ok(signal) => signal.await.is_ok(),
                Err(e) => {
                    tracing::debug!(page_id = %page_id, error = %e, "Cannot wait for page load");
                    false
                }
            };
            if !loaded {
                tracing::debug!(page_id = %page_id, "Page gone before load completed");
                return Delivery::Missed { page_id };
            }

            if let Err(e) = assignments.put(page_id, &entry) {
                tracing::warn!(page_id = %page_id, error = %e, "Failed to write assignment");
                return Delivery::Missed { page_id };
            }
            let pushed = relay.push_render(page_id, &entry);
            tracing::debug!(page_id = %page_id, persona = %entry.persona.name, pushed, "Persona delivered");
            Delivery::Written { page_id, pushed }
        })
    }

    /// Remove every page the recorded run created and erase the record.
    ///
    /// With `Some(run_id)`, nothing happens unless that run is still the recorded one.
    pub async fn clear(&self, run_id: Option<RunId>) -> Result<ClearReport, PlayError> {
        let state = self.runs.load()?;
        let mut report = ClearReport::default();

        if let Some(requested) = run_id {
            if state.run_id != Some(requested) {
                tracing::debug!(run_id = %requested, "Run already superseded, nothing to clear");
                report.superseded = true;
                return Ok(report);
            }
        }

        for page_id in &state.created_page_ids {
            report.attempted.push(*page_id);
            match self.fabric.remove_pages(&[*page_id]).await {
                Ok(()) => report.removed += 1,
                Err(e) if e.is_stale() => {
                    tracing::debug!(page_id = %page_id, "Page already closed");
                    report.already_gone += 1;
                }
                Err(e) => {
                    tracing::warn!(page_id = %page_id, error = %e, "Failed to remove page");
                    report.failed += 1;
                }
            }
        }

        report.assignments_removed = self.assignments.remove_many(&state.created_page_ids)?;
        self.runs.clear()?;

        if !state.is_empty() {
            tracing::info!(
                removed = report.removed,
                already_gone = report.already_gone,
                failed = report.failed,
                "Cleared run"
            );
        }
        Ok(report)
    }
}
