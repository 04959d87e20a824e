//! Stack-overview controller.
//!
//! [`StackOverview`] owns the screen lifecycle. Each activation creates one
//! [`Screen`]: the state record, the poll session, the reconfiguration
//! workflow and the pending focus restore. Deactivation cancels the poll,
//! unsubscribes the push listener and marks the screen dead; results that
//! arrive afterwards are dropped.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, EventSource, IndexingStatus, SourceFolder, StackSummary};
use crate::config::ControllerConfig;
use crate::decider::{decide_snapshot, AutoAction};
use crate::error::{Result, SyncError};
use crate::events::{EventBridge, StacksReloader};
use crate::focus::{FocusMemento, ListRender, PendingFocusRestore};
use crate::input_validation::{validate_folder_path, validate_project_slug};
use crate::logging::LogManager;
use crate::poll::{PollSession, PollTarget};
use crate::reconfigure::{CommitOutcome, ReconfigurationWorkflow, ReconfigureState};
use crate::snapshot::{fetch_snapshot, fetch_stacks, fetch_status, Snapshot};

/// Why a full fetch-decide cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Screen mount.
    Activation,
    /// Explicit user refresh.
    Refresh,
    /// A folder was attached or detached.
    FoldersChanged,
    /// A reconfiguration was committed.
    Reconfigured,
}

/// The in-memory view of one project, owned by one activation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenState {
    pub folders: Vec<SourceFolder>,
    pub stacks: Vec<StackSummary>,
    pub status: IndexingStatus,
    /// No full snapshot applied yet.
    pub loading: bool,
    pub last_error: Option<String>,
    pub auto_action_attempted: bool,
    /// A folder change or regroup went through but its reload failed; the
    /// next refresh must decide.
    pub decision_owed: bool,
    pub last_auto_action: Option<AutoAction>,
    /// Fetch sequence of the stacks currently held.
    #[serde(skip)]
    stacks_seq: u64,
}

pub struct Screen {
    slug: String,
    backend: Arc<dyn Backend>,
    logs: Arc<LogManager>,
    state: RwLock<ScreenState>,
    live: CancellationToken,
    /// Serialises every fetch-decide pass.
    decision_gate: AsyncMutex<()>,
    stacks_in_flight: AtomicBool,
    stacks_pending: AtomicBool,
    fetch_seq: AtomicU64,
    poll: Mutex<PollSession>,
    focus: Mutex<PendingFocusRestore>,
    reconfigure: Mutex<ReconfigurationWorkflow>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Screen {
    fn new(
        slug: &str,
        backend: Arc<dyn Backend>,
        logs: Arc<LogManager>,
        config: &ControllerConfig,
        focus: PendingFocusRestore,
    ) -> Self {
        Self {
            slug: slug.to_string(),
            backend,
            logs,
            state: RwLock::new(ScreenState {
                loading: true,
                ..Default::default()
            }),
            live: CancellationToken::new(),
            decision_gate: AsyncMutex::new(()),
            stacks_in_flight: AtomicBool::new(false),
            stacks_pending: AtomicBool::new(false),
            fetch_seq: AtomicU64::new(0),
            poll: Mutex::new(PollSession::new(config.poll_interval())),
            focus: Mutex::new(focus),
            reconfigure: Mutex::new(ReconfigurationWorkflow::new(config.default_burst_gap_secs)),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn is_active(&self) -> bool {
        !self.live.is_cancelled()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::Inactive)
        }
    }

    pub async fn state(&self) -> ScreenState {
        self.state.read().await.clone()
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poll).is_active()
    }

    /// Position to focus after the current render, once the list holds real
    /// data. Returns `Some` at most once per activation.
    pub async fn take_focus_restore(&self) -> Option<usize> {
        let render = {
            let state = self.state.read().await;
            if state.loading {
                ListRender::Loading
            } else {
                ListRender::Ready(state.stacks.len())
            }
        };
        lock(&self.focus).on_render(render)
    }

    /// Apply a mutation unless the screen died while the caller was awaiting.
    async fn apply(&self, f: impl FnOnce(&mut ScreenState)) -> Result<()> {
        let mut state = self.state.write().await;
        self.ensure_active()?;
        f(&mut state);
        Ok(())
    }

    async fn record_error(&self, err: &SyncError) {
        let message = err.to_string();
        let _ = self.apply(|state| state.last_error = Some(message)).await;
    }

    fn shutdown(&self) {
        self.live.cancel();
        lock(&self.poll).cancel();
    }

    fn start_poll(self: &Arc<Self>) -> bool {
        if !self.is_active() {
            return false;
        }
        lock(&self.poll).start(self.clone())
    }

    async fn apply_fresh_status(&self) -> Result<IndexingStatus> {
        match fetch_status(self.backend.as_ref(), &self.slug).await {
            Ok(status) => {
                let applied = status.clone();
                self.apply(|state| state.status = applied).await?;
                Ok(status)
            }
            Err(err) => {
                self.record_error(&err).await;
                Err(err)
            }
        }
    }

    fn next_fetch_seq(&self) -> u64 {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply_fresh_stacks(&self) -> Result<()> {
        let seq = self.next_fetch_seq();
        match fetch_stacks(self.backend.as_ref(), &self.slug).await {
            Ok(stacks) => {
                self.apply(|state| {
                    // A snapshot that started later already landed.
                    if seq > state.stacks_seq {
                        state.stacks = stacks;
                        state.stacks_seq = seq;
                    }
                })
                .await
            }
            Err(err) => {
                self.record_error(&err).await;
                Err(err)
            }
        }
    }

    /// Stacks-only reload. Concurrent requests coalesce: while one fetch is
    /// in flight, further requests collapse into a single follow-up fetch.
    pub async fn reload_stacks(&self) -> Result<()> {
        self.stacks_pending.store(true, Ordering::SeqCst);
        let mut result = Ok(());
        loop {
            if self.stacks_in_flight.swap(true, Ordering::SeqCst) {
                return result;
            }
            while self.stacks_pending.swap(false, Ordering::SeqCst) {
                result = self.apply_fresh_stacks().await;
                if !self.is_active() {
                    break;
                }
            }
            self.stacks_in_flight.store(false, Ordering::SeqCst);
            if !self.stacks_pending.load(Ordering::SeqCst) || !self.is_active() {
                return result;
            }
        }
    }

    /// Fetch a snapshot, decide, and issue at most one auto-action.
    pub async fn reload(self: &Arc<Self>, trigger: Trigger) -> Result<Option<AutoAction>> {
        let _gate = self.decision_gate.lock().await;
        self.reload_locked(trigger).await
    }

    /// Caller holds `decision_gate`.
    async fn reload_locked(self: &Arc<Self>, trigger: Trigger) -> Result<Option<AutoAction>> {
        self.ensure_active()?;
        let seq = self.next_fetch_seq();
        let snapshot = match fetch_snapshot(self.backend.as_ref(), &self.slug).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("{}: reload ({trigger:?}) failed: {err}", self.slug);
                let owed = matches!(trigger, Trigger::FoldersChanged | Trigger::Reconfigured);
                let message = err.to_string();
                let _ = self
                    .apply(|state| {
                        state.last_error = Some(message);
                        state.decision_owed |= owed;
                    })
                    .await;
                return Err(err);
            }
        };

        let mut decides = true;
        self.apply(|state| {
            if matches!(trigger, Trigger::Activation | Trigger::Refresh) {
                decides = !state.auto_action_attempted || state.decision_owed;
            }
            state.auto_action_attempted = true;
            if !snapshot.status.is_active() {
                state.decision_owed = false;
            }
            let Snapshot {
                folders,
                stacks,
                status,
            } = snapshot.clone();
            state.folders = folders;
            if seq > state.stacks_seq {
                state.stacks = stacks;
                state.stacks_seq = seq;
            }
            state.status = status;
            state.loading = false;
            state.last_error = None;
        })
        .await?;

        if snapshot.status.is_active() {
            self.start_poll();
            return Ok(None);
        }

        let action = if decides { decide_snapshot(&snapshot) } else { None };
        if let Some(action) = action {
            self.apply(|state| state.last_auto_action = Some(action)).await?;
            self.issue(action).await?;
        }
        Ok(action)
    }

    async fn issue(self: &Arc<Self>, action: AutoAction) -> Result<()> {
        self.logs
            .info(&format!("auto-action: {}", action.command_name()), Some(&self.slug));
        let result = match action {
            AutoAction::StartIndexing => self.backend.start_indexing(&self.slug).await,
            AutoAction::ResumeThumbnails => self.backend.resume_thumbnails(&self.slug).await,
        };
        self.after_command(action.command_name(), result, true).await
    }

    /// Shared tail of every command: optimistic poll on success, logged
    /// rejection plus a best-effort refresh on failure.
    async fn after_command(
        self: &Arc<Self>,
        command: &'static str,
        result: std::result::Result<(), String>,
        optimistic_poll: bool,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                if optimistic_poll {
                    self.start_poll();
                }
                Ok(())
            }
            Err(message) => {
                let err = SyncError::rejected(command, message);
                self.logs.warn(&err.to_string(), Some(&self.slug));
                self.record_error(&err).await;
                self.best_effort_refresh().await;
                Err(err)
            }
        }
    }

    /// Re-read status and stacks after a command, so the view never sits on
    /// an unconfirmed state. Failures are ignored.
    async fn best_effort_refresh(self: &Arc<Self>) {
        if !self.is_active() {
            return;
        }
        match self.apply_fresh_status().await {
            Ok(status) if status.is_active() => {
                self.start_poll();
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("{}: status refresh failed: {err}", self.slug),
        }
        if let Err(err) = self.reload_stacks().await {
            tracing::debug!("{}: stacks refresh failed: {err}", self.slug);
        }
    }

    pub async fn refresh(self: &Arc<Self>) -> Result<Option<AutoAction>> {
        self.reload(Trigger::Refresh).await
    }

    pub async fn add_folder(self: &Arc<Self>, path: &str) -> Result<Option<AutoAction>> {
        validate_folder_path(path).map_err(|e| SyncError::InvalidInput(e.to_string()))?;
        let _gate = self.decision_gate.lock().await;
        self.ensure_active()?;
        let result = self.backend.add_source_folder(&self.slug, path).await;
        self.after_command("add_source_folder", result, false).await?;
        self.logs
            .info(&format!("source folder added: {path}"), Some(&self.slug));
        self.reload_locked(Trigger::FoldersChanged).await
    }

    pub async fn remove_folder(self: &Arc<Self>, folder_id: i64) -> Result<Option<AutoAction>> {
        let _gate = self.decision_gate.lock().await;
        self.ensure_active()?;
        let result = self.backend.remove_source_folder(&self.slug, folder_id).await;
        self.after_command("remove_source_folder", result, false).await?;
        self.reload_locked(Trigger::FoldersChanged).await
    }

    /// Explicit re-index requested by the user.
    pub async fn start_indexing(self: &Arc<Self>) -> Result<()> {
        self.ensure_active()?;
        let result = self.backend.start_indexing(&self.slug).await;
        self.after_command("start_indexing", result, true).await
    }

    pub async fn cancel_indexing(self: &Arc<Self>) -> Result<()> {
        self.ensure_active()?;
        let result = self.backend.cancel_indexing().await;
        self.after_command("cancel_indexing", result, false).await?;
        self.best_effort_refresh().await;
        Ok(())
    }

    pub async fn pause_indexing(self: &Arc<Self>) -> Result<()> {
        self.ensure_active()?;
        let result = self.backend.pause_indexing().await;
        self.after_command("pause_indexing", result, false).await?;
        self.apply_fresh_status().await.map(|_| ())
    }

    pub async fn resume_indexing(self: &Arc<Self>) -> Result<()> {
        self.ensure_active()?;
        let result = self.backend.resume_indexing().await;
        self.after_command("resume_indexing", result, false).await?;
        self.best_effort_refresh().await;
        Ok(())
    }

    pub fn reconfigure_state(&self) -> ReconfigureState {
        lock(&self.reconfigure).state().clone()
    }

    /// Open the burst-gap dialog on the backend's current value, or the
    /// configured fallback if it cannot be read.
    pub async fn open_reconfigure(&self) -> Result<u64> {
        self.ensure_active()?;
        lock(&self.reconfigure).ensure_can_open()?;
        let fetched = self.backend.get_burst_gap().await;
        lock(&self.reconfigure).open(fetched)
    }

    pub fn edit_reconfigure(&self, value: u64) -> Result<()> {
        lock(&self.reconfigure).edit(value)
    }

    pub fn cancel_reconfigure(&self) -> Result<()> {
        lock(&self.reconfigure).cancel()
    }

    /// Write the new gap, regroup, then run the same fetch-decide cycle as
    /// activation: thumbnails are resumed only if the regrouped stacks lack
    /// them. Always ends Closed.
    pub async fn commit_reconfigure(self: &Arc<Self>) -> Result<CommitOutcome> {
        let value = lock(&self.reconfigure).begin_commit()?;
        let result = self.run_commit(value).await;
        lock(&self.reconfigure).finish_commit();
        result
    }

    async fn run_commit(self: &Arc<Self>, value: u64) -> Result<CommitOutcome> {
        let _gate = self.decision_gate.lock().await;
        self.ensure_active()?;

        let result = self.backend.set_burst_gap(value).await;
        self.after_command("set_burst_gap", result, false).await?;
        let result = self.backend.restack(&self.slug).await;
        self.after_command("restack", result, false).await?;
        self.logs
            .info(&format!("burst gap set to {value}s, stacks regrouped"), Some(&self.slug));

        let auto_action = self.reload_locked(Trigger::Reconfigured).await?;
        Ok(CommitOutcome {
            burst_gap_secs: value,
            auto_action,
        })
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("slug", &self.slug)
            .field("active", &self.is_active())
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PollTarget for Screen {
    async fn refresh_status(&self) -> Result<IndexingStatus> {
        self.apply_fresh_status().await
    }

    async fn refresh_stacks(&self) -> Result<()> {
        Screen::reload_stacks(self).await
    }
}

#[async_trait]
impl StacksReloader for Screen {
    async fn reload_stacks(&self) -> Result<()> {
        Screen::reload_stacks(self).await
    }
}

struct Activation {
    screen: Arc<Screen>,
    bridge: Option<EventBridge>,
}

/// Host-side owner of the overview screen.
pub struct StackOverview {
    backend: Arc<dyn Backend>,
    events: Arc<dyn EventSource>,
    config: ControllerConfig,
    logs: Arc<LogManager>,
    memento: FocusMemento,
    current: Option<Activation>,
}

impl StackOverview {
    pub fn new(
        backend: Arc<dyn Backend>,
        events: Arc<dyn EventSource>,
        config: ControllerConfig,
    ) -> Self {
        let logs = Arc::new(LogManager::new(config.max_log_lines));
        Self {
            backend,
            events,
            config,
            logs,
            memento: FocusMemento::new(),
            current: None,
        }
    }

    /// Build from a YAML config file; a missing file means defaults.
    pub fn from_config_file(
        backend: Arc<dyn Backend>,
        events: Arc<dyn EventSource>,
        path: &Path,
    ) -> Result<Self> {
        let config =
            ControllerConfig::load(path).map_err(|e| SyncError::Config(format!("{e:#}")))?;
        Ok(Self::new(backend, events, config))
    }

    pub fn logs(&self) -> &Arc<LogManager> {
        &self.logs
    }

    pub fn memento(&self) -> &FocusMemento {
        &self.memento
    }

    pub fn screen(&self) -> Option<&Arc<Screen>> {
        self.current.as_ref().map(|a| &a.screen)
    }

    /// Mount the screen for `slug` and load the first snapshot. A previous
    /// activation is torn down first. A failed first load is not an error:
    /// it shows up as `last_error` and is retried by the next refresh.
    pub async fn activate(&mut self, slug: &str) -> Result<Arc<Screen>> {
        validate_project_slug(slug).map_err(|e| SyncError::InvalidInput(e.to_string()))?;
        self.deactivate();

        let screen = Arc::new(Screen::new(
            slug,
            self.backend.clone(),
            self.logs.clone(),
            &self.config,
            PendingFocusRestore::new(self.memento.take()),
        ));

        let bridge = match EventBridge::attach(
            self.events.as_ref(),
            &self.config.thumbnail_event,
            screen.clone(),
        ) {
            Ok(bridge) => Some(bridge),
            Err(err) => {
                tracing::warn!("{slug}: push events unavailable: {err}");
                None
            }
        };

        self.current = Some(Activation {
            screen: screen.clone(),
            bridge,
        });
        tracing::info!("{slug}: screen activated");

        if let Err(err) = screen.reload(Trigger::Activation).await {
            tracing::warn!("{slug}: initial load failed: {err}");
        }
        Ok(screen)
    }

    /// Cancel the poll and unsubscribe, synchronously.
    pub fn deactivate(&mut self) {
        if let Some(activation) = self.current.take() {
            activation.screen.shutdown();
            if let Some(bridge) = activation.bridge {
                bridge.detach();
            }
            tracing::info!("{}: screen deactivated", activation.screen.slug());
        }
    }

    /// Navigate to a detail screen from `position`.
    pub fn leave_to_detail(&mut self, position: usize) {
        self.memento.record(position);
        self.deactivate();
    }
}

impl Drop for StackOverview {
    fn drop(&mut self) {
        self.deactivate();
    }
}
