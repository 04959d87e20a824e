//! Recording fakes for controller tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::backend::{
    Backend, BackendResult, Disposer, EventSource, IndexingStatus, SourceFolder, StackSummary,
    Subscription,
};

pub fn folder(id: i64) -> SourceFolder {
    SourceFolder {
        id,
        path: format!("/photos/{id}"),
    }
}

pub fn stack(id: i64, thumbnail: Option<&str>) -> StackSummary {
    StackSummary {
        stack_id: id,
        photo_count: 3,
        earliest_capture_time: None,
        has_raw: true,
        has_jpeg: true,
        thumbnail_path: thumbnail.map(str::to_string),
    }
}

pub fn idle_status() -> IndexingStatus {
    IndexingStatus::default()
}

pub fn scanning_status() -> IndexingStatus {
    IndexingStatus {
        scan_running: true,
        total_items: 10,
        processed_items: 2,
        ..Default::default()
    }
}

pub fn thumbnails_status() -> IndexingStatus {
    IndexingStatus {
        thumbnails_running: true,
        thumbnail_total: 10,
        thumbnail_done: 4,
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeState {
    folders: Vec<SourceFolder>,
    stacks: Vec<StackSummary>,
    stacks_after_restack: Option<Vec<StackSummary>>,
    /// Popped one per status query; the last entry sticks.
    statuses: VecDeque<IndexingStatus>,
    /// Status to report after a start/resume command succeeds.
    status_after_command: Option<IndexingStatus>,
    burst_gap: u64,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    query_delay: Option<Duration>,
    /// Extra latency for the next `list_stacks` calls, one entry per call.
    stacks_delays: VecDeque<Duration>,
}

pub struct FakeBackend {
    state: Mutex<FakeState>,
    events: broadcast::Sender<serde_json::Value>,
    subscribes: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(FakeState {
                burst_gap: 3,
                ..Default::default()
            }),
            events,
            subscribes: AtomicUsize::new(0),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_folders(&self, folders: Vec<SourceFolder>) {
        self.state.lock().unwrap().folders = folders;
    }

    pub fn set_stacks(&self, stacks: Vec<StackSummary>) {
        self.state.lock().unwrap().stacks = stacks;
    }

    pub fn set_stacks_after_restack(&self, stacks: Vec<StackSummary>) {
        self.state.lock().unwrap().stacks_after_restack = Some(stacks);
    }

    pub fn push_status(&self, status: IndexingStatus) {
        self.state.lock().unwrap().statuses.push_back(status);
    }

    pub fn set_status_after_command(&self, status: IndexingStatus) {
        self.state.lock().unwrap().status_after_command = Some(status);
    }

    pub fn set_burst_gap(&self, secs: u64) {
        self.state.lock().unwrap().burst_gap = secs;
    }

    pub fn fail_query(&self, name: &'static str) {
        self.state.lock().unwrap().failing.insert(name);
    }

    pub fn heal(&self, name: &'static str) {
        self.state.lock().unwrap().failing.remove(name);
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.state.lock().unwrap().query_delay = Some(delay);
    }

    pub fn delay_next_stacks(&self, delay: Duration) {
        self.state.lock().unwrap().stacks_delays.push_back(delay);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state.lock().unwrap().calls.get(name).copied().unwrap_or(0)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn emit(&self, payload: serde_json::Value) {
        let _ = self.events.send(payload);
    }

    fn record(&self, name: &'static str) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(name).or_insert(0) += 1;
        if state.failing.contains(name) {
            return Err("injected failure".to_string());
        }
        Ok(())
    }

    async fn delay(&self) {
        let delay = self.state.lock().unwrap().query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn after_command(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.status_after_command.take() {
            state.statuses.clear();
            state.statuses.push_back(status);
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_source_folders(&self, _slug: &str) -> BackendResult<Vec<SourceFolder>> {
        self.delay().await;
        self.record("list_source_folders")?;
        Ok(self.state.lock().unwrap().folders.clone())
    }

    async fn list_stacks(&self, _slug: &str) -> BackendResult<Vec<StackSummary>> {
        // The answer is read when the query starts, as a real backend would.
        let (stacks, extra) = {
            let mut state = self.state.lock().unwrap();
            (state.stacks.clone(), state.stacks_delays.pop_front())
        };
        self.delay().await;
        if let Some(extra) = extra {
            tokio::time::sleep(extra).await;
        }
        self.record("list_stacks")?;
        Ok(stacks)
    }

    async fn get_indexing_status(&self, _slug: &str) -> BackendResult<IndexingStatus> {
        self.delay().await;
        self.record("get_indexing_status")?;
        let mut state = self.state.lock().unwrap();
        let status = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };
        Ok(status.unwrap_or_default())
    }

    async fn add_source_folder(&self, _slug: &str, path: &str) -> BackendResult<()> {
        self.record("add_source_folder")?;
        let mut state = self.state.lock().unwrap();
        let id = state.folders.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        state.folders.push(SourceFolder {
            id,
            path: path.to_string(),
        });
        Ok(())
    }

    async fn remove_source_folder(&self, _slug: &str, folder_id: i64) -> BackendResult<()> {
        self.record("remove_source_folder")?;
        self.state.lock().unwrap().folders.retain(|f| f.id != folder_id);
        Ok(())
    }

    async fn start_indexing(&self, _slug: &str) -> BackendResult<()> {
        self.record("start_indexing")?;
        self.after_command();
        Ok(())
    }

    async fn cancel_indexing(&self) -> BackendResult<()> {
        self.record("cancel_indexing")
    }

    async fn pause_indexing(&self) -> BackendResult<()> {
        self.record("pause_indexing")
    }

    async fn resume_indexing(&self) -> BackendResult<()> {
        self.record("resume_indexing")
    }

    async fn resume_thumbnails(&self, _slug: &str) -> BackendResult<()> {
        self.record("resume_thumbnails")?;
        self.after_command();
        Ok(())
    }

    async fn get_burst_gap(&self) -> BackendResult<u64> {
        self.record("get_burst_gap")?;
        Ok(self.state.lock().unwrap().burst_gap)
    }

    async fn set_burst_gap(&self, secs: u64) -> BackendResult<()> {
        self.record("set_burst_gap")?;
        self.state.lock().unwrap().burst_gap = secs;
        Ok(())
    }

    async fn restack(&self, _slug: &str) -> BackendResult<()> {
        self.record("restack")?;
        let mut state = self.state.lock().unwrap();
        if let Some(stacks) = state.stacks_after_restack.take() {
            state.stacks = stacks;
        }
        Ok(())
    }
}

impl EventSource for FakeBackend {
    fn subscribe(&self, _event: &str) -> BackendResult<Subscription> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(|msg| msg.ok());
        let unsubscribes = self.unsubscribes.clone();
        let disposer = Disposer::new(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        });
        Ok(Subscription::new(Box::pin(stream), disposer))
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
