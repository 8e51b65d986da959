//! crates/site_audit_core/src/orchestrator.rs
//!
//! The client-side scan orchestrator. It steps a server-side scan through one
//! batch at a time, keeps the results view in sync with partial results, and
//! owns the filter/search/page state of one admin screen.
//!
//! Lifecycle: `Idle -> Starting -> Polling -> Completing -> Idle`. Any failure
//! of a lifecycle call unwinds straight back to `Idle`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{
    BatchProgress, ClientViewState, EntryId, FixSummary, ResultFilter, ResultsPage, ScanId,
    DEFAULT_PER_PAGE,
};
use crate::ports::{
    Confirmation, Confirmer, Notice, PortError, PortResult, ResultsView, ScanService, Sleeper,
};

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

//=========================================================================================
// Settings, Phases and Outcomes
//=========================================================================================

/// Pacing and paging knobs. None of the delays affect correctness.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Pause between a batch response and the next batch request.
    pub batch_delay: Duration,
    /// How long "scan complete" stays up before the progress display is hidden.
    pub completion_delay: Duration,
    /// Upper bound on each call made while a scan runs: starting it, every
    /// batch, and every results refresh. `None` waits forever.
    pub batch_timeout: Option<Duration>,
    pub search_debounce: Duration,
    pub per_page: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_delay: DEFAULT_BATCH_DELAY,
            completion_delay: DEFAULT_COMPLETION_DELAY,
            batch_timeout: Some(DEFAULT_BATCH_TIMEOUT),
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Starting,
    Polling,
    Completing,
}

/// How a scan that was not rejected came to an end.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed {
        scan_id: ScanId,
        progress: BatchProgress,
    },
    /// `scan_id` is `None` when the stop came before the server opened a session.
    Cancelled {
        scan_id: Option<ScanId>,
        progress: Option<BatchProgress>,
    },
    /// The user said no at the confirmation prompt.
    Declined,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("A scan is already in progress")]
    ScanInProgress,
    #[error("No entries were selected")]
    EmptySelection,
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

struct OrchestratorState {
    phase: ScanPhase,
    scan_id: Option<ScanId>,
    view: ClientViewState,
    cancel: CancellationToken,
    search_generation: u64,
}

/// One per admin screen. Share it behind an `Arc`.
pub struct ScanOrchestrator {
    service: Arc<dyn ScanService>,
    view: Arc<dyn ResultsView>,
    confirmer: Arc<dyn Confirmer>,
    sleeper: Arc<dyn Sleeper>,
    settings: OrchestratorSettings,
    state: Mutex<OrchestratorState>,
}

impl ScanOrchestrator {
    pub fn new(
        service: Arc<dyn ScanService>,
        view: Arc<dyn ResultsView>,
        confirmer: Arc<dyn Confirmer>,
        sleeper: Arc<dyn Sleeper>,
        settings: OrchestratorSettings,
    ) -> Self {
        let view_state = ClientViewState::new(settings.per_page);
        Self {
            service,
            view,
            confirmer,
            sleeper,
            settings,
            state: Mutex::new(OrchestratorState {
                phase: ScanPhase::Idle,
                scan_id: None,
                view: view_state,
                cancel: CancellationToken::new(),
                search_generation: 0,
            }),
        }
    }

    pub async fn phase(&self) -> ScanPhase {
        self.state.lock().await.phase
    }

    pub async fn is_scanning(&self) -> bool {
        self.phase().await != ScanPhase::Idle
    }

    /// The most recent scan, kept after it ends so its results stay browsable.
    pub async fn current_scan_id(&self) -> Option<ScanId> {
        self.state.lock().await.scan_id.clone()
    }

    pub async fn view_state(&self) -> ClientViewState {
        self.state.lock().await.view.clone()
    }

    /// Runs `start_scan` on its own task.
    pub fn spawn_scan(self: &Arc<Self>) -> JoinHandle<Result<ScanOutcome, OrchestratorError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.start_scan().await })
    }

    /// Starts a new scan and drives it to completion, cancellation or failure.
    pub async fn start_scan(&self) -> Result<ScanOutcome, OrchestratorError> {
        let cancel = {
            let mut state = self.state.lock().await;
            if state.phase != ScanPhase::Idle {
                warn!(phase = ?state.phase, "Start requested while a scan is running.");
                drop(state);
                self.view.notify(&Notice::ScanAlreadyRunning);
                return Err(OrchestratorError::ScanInProgress);
            }
            // Claimed before the prompt so a second start cannot slip in while it is open.
            state.phase = ScanPhase::Starting;
            state.cancel = CancellationToken::new();
            state.cancel.clone()
        };

        if !self.confirmer.confirm(&Confirmation::StartScan).await {
            info!("Scan start declined by the user.");
            self.state.lock().await.phase = ScanPhase::Idle;
            return Ok(ScanOutcome::Declined);
        }
        if cancel.is_cancelled() {
            info!("Scan stopped before a session was opened.");
            self.state.lock().await.phase = ScanPhase::Idle;
            self.view.notify(&Notice::ScanCancelled);
            return Ok(ScanOutcome::Cancelled { scan_id: None, progress: None });
        }

        self.view.set_start_enabled(false);
        let scan_id = match self.bounded(self.service.start_scan()).await {
            Ok(scan_id) => scan_id,
            Err(e) => return Err(self.unwind(e).await),
        };
        info!(%scan_id, "Scan session started.");

        {
            let mut state = self.state.lock().await;
            state.scan_id = Some(scan_id.clone());
            state.view.set_page(1);
            state.phase = ScanPhase::Polling;
        }
        if cancel.is_cancelled() {
            return Ok(self.stop_cancelled(scan_id, None).await);
        }
        self.view.show_progress(&BatchProgress::default(), 0);

        self.poll(scan_id, cancel).await
    }

    /// Stops scheduling further batches. An in-flight call still finishes.
    /// A stop requested while the start is being confirmed or opened takes
    /// effect as soon as that step returns. Returns `false` when there is no
    /// scan to stop.
    pub async fn cancel_scan(&self) -> bool {
        let state = self.state.lock().await;
        if !matches!(state.phase, ScanPhase::Starting | ScanPhase::Polling) {
            return false;
        }
        info!("Cancellation requested.");
        state.cancel.cancel();
        true
    }

    async fn poll(
        &self,
        scan_id: ScanId,
        cancel: CancellationToken,
    ) -> Result<ScanOutcome, OrchestratorError> {
        let mut last: Option<BatchProgress> = None;

        loop {
            let progress = match self.next_batch(&scan_id).await {
                Ok(progress) => progress,
                Err(e) => return Err(self.unwind(e).await),
            };

            if let Some(previous) = last {
                if progress.pages_processed < previous.pages_processed {
                    warn!(
                        previous = previous.pages_processed,
                        reported = progress.pages_processed,
                        "Scan service reported fewer processed pages than before."
                    );
                }
            }
            // A finished scan reads 100 even when the page estimate fell short.
            let percent = if progress.completed { 100 } else { progress.percent() };
            debug!(
                %scan_id,
                pages_processed = progress.pages_processed,
                total_pages = progress.total_pages,
                percent,
                "Batch processed."
            );
            self.view.show_progress(&progress, percent);
            last = Some(progress);

            if progress.completed {
                return Ok(self.complete(scan_id, progress).await);
            }

            // Partial results; a failed refresh does not end the scan.
            let _ = self.refresh_results().await;

            if cancel.is_cancelled() {
                return Ok(self.stop_cancelled(scan_id, last).await);
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(self.stop_cancelled(scan_id, last).await);
                }
                _ = self.sleeper.sleep(self.settings.batch_delay) => {}
            }
        }
    }

    async fn next_batch(&self, scan_id: &ScanId) -> PortResult<BatchProgress> {
        self.bounded(self.service.process_batch(scan_id)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        match self.settings.batch_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| PortError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn complete(&self, scan_id: ScanId, progress: BatchProgress) -> ScanOutcome {
        self.state.lock().await.phase = ScanPhase::Completing;
        info!(%scan_id, pages = progress.pages_processed, "Scan complete.");
        self.view.notify(&Notice::ScanComplete);

        self.sleeper.sleep(self.settings.completion_delay).await;
        self.view.hide_progress();
        let _ = self.refresh_results().await;

        self.state.lock().await.phase = ScanPhase::Idle;
        self.view.set_start_enabled(true);
        ScanOutcome::Completed { scan_id, progress }
    }

    async fn stop_cancelled(&self, scan_id: ScanId, progress: Option<BatchProgress>) -> ScanOutcome {
        info!(%scan_id, "Scan stopped before completion.");
        self.state.lock().await.phase = ScanPhase::Idle;
        self.view.hide_progress();
        self.view.notify(&Notice::ScanCancelled);
        self.view.set_start_enabled(true);
        ScanOutcome::Cancelled { scan_id: Some(scan_id), progress }
    }

    /// Returns every piece of scan state to `Idle` after a failure.
    async fn unwind(&self, e: PortError) -> OrchestratorError {
        error!("Scan failed: {}", e);
        self.state.lock().await.phase = ScanPhase::Idle;
        self.view.notify(&Notice::Error(e.user_message()));
        self.view.hide_progress();
        self.view.set_start_enabled(true);
        OrchestratorError::Port(e)
    }

    //=====================================================================================
    // Results Listing
    //=====================================================================================

    async fn refresh_results(&self) -> PortResult<ResultsPage> {
        let query = {
            let state = self.state.lock().await;
            state.view.query(state.scan_id.clone())
        };
        match self.bounded(self.service.get_results(&query)).await {
            Ok(page) => {
                debug!(
                    total = page.total,
                    page = page.current_page,
                    pages = page.pages,
                    "Results loaded."
                );
                self.view.render_results(&page);
                Ok(page)
            }
            Err(e) => {
                warn!("Failed to load results: {}", e);
                self.view.notify(&Notice::Error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Applies several view-state changes at once without loading.
    /// The state's own setters still reset the page where they must.
    pub async fn edit_view<F>(&self, edit: F)
    where
        F: FnOnce(&mut ClientViewState),
    {
        edit(&mut self.state.lock().await.view);
    }

    /// Loads the page described by the current view state.
    pub async fn load_results(&self) -> Result<ResultsPage, OrchestratorError> {
        Ok(self.refresh_results().await?)
    }

    pub async fn set_filter(&self, filter: ResultFilter) -> Result<ResultsPage, OrchestratorError> {
        self.state.lock().await.view.set_filter(filter);
        self.load_results().await
    }

    pub async fn set_page(&self, page: u32) -> Result<ResultsPage, OrchestratorError> {
        self.state.lock().await.view.set_page(page);
        self.load_results().await
    }

    /// Debounced search. Returns `Ok(None)` when a newer search superseded
    /// this one while it was waiting.
    pub async fn search(
        &self,
        term: impl Into<String>,
    ) -> Result<Option<ResultsPage>, OrchestratorError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.view.set_search(term);
            state.search_generation += 1;
            state.search_generation
        };

        self.sleeper.sleep(self.settings.search_debounce).await;

        if self.state.lock().await.search_generation != generation {
            debug!(generation, "Search superseded.");
            return Ok(None);
        }
        self.load_results().await.map(Some)
    }

    //=====================================================================================
    // Point Edits
    //=====================================================================================

    /// Applies the stored suggestions to the selected entries. Returns
    /// `Ok(None)` when the user declined.
    pub async fn apply_fixes(
        &self,
        ids: &[EntryId],
    ) -> Result<Option<FixSummary>, OrchestratorError> {
        if ids.is_empty() {
            self.view.notify(&Notice::NothingSelected);
            return Err(OrchestratorError::EmptySelection);
        }
        if !self
            .confirmer
            .confirm(&Confirmation::ApplyFixes { count: ids.len() })
            .await
        {
            return Ok(None);
        }

        match self.service.apply_fixes(ids).await {
            Ok(summary) => {
                info!(fixed = summary.fixed, failed = summary.failed, "Fixes applied.");
                self.view.notify(&Notice::FixesApplied(summary));
                let _ = self.refresh_results().await;
                Ok(Some(summary))
            }
            Err(e) => {
                error!("Failed to apply fixes: {}", e);
                self.view.notify(&Notice::Error(e.user_message()));
                Err(e.into())
            }
        }
    }

    /// Deletes one entry. Returns `Ok(false)` when the user declined.
    pub async fn delete_entry(&self, id: EntryId) -> Result<bool, OrchestratorError> {
        if !self.confirmer.confirm(&Confirmation::DeleteEntry(id)).await {
            return Ok(false);
        }

        match self.service.delete_entry(id).await {
            Ok(()) => {
                info!(id, "Entry deleted.");
                self.view.remove_row(id);
                self.view.notify(&Notice::EntryDeleted);
                // Reload so totals and paging reflect the removal.
                let _ = self.refresh_results().await;
                Ok(true)
            }
            Err(e) => {
                warn!(id, "Failed to delete entry: {}", e);
                self.view.notify(&Notice::Error(e.user_message()));
                Err(e.into())
            }
        }
    }

    pub async fn update_suggestion(
        &self,
        id: EntryId,
        new_value: &str,
    ) -> Result<(), OrchestratorError> {
        let new_value = new_value.trim();
        match self.service.update_suggestion(id, new_value).await {
            Ok(()) => {
                info!(id, "Suggestion updated.");
                self.view.update_row(id, new_value);
                self.view.notify(&Notice::SuggestionSaved);
                Ok(())
            }
            Err(e) => {
                warn!(id, "Failed to update suggestion: {}", e);
                self.view.notify(&Notice::Error(e.user_message()));
                Err(e.into())
            }
        }
    }
}
