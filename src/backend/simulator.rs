//! In-process stand-in for the indexing backend.
//!
//! Runs a scripted scan phase and thumbnail phase on tokio tasks, groups
//! photos into stacks by burst gap and emits `thumbnail-ready` events. Used by
//! the CLI and by the controller tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::types::{ImportStats, IndexingStatus, SourceFolder, StackSummary, ThumbnailReadyPayload};
use super::{Backend, BackendResult, Disposer, EventSource, Subscription, THUMBNAIL_READY_EVENT};

const DEFAULT_BURST_GAP_SECS: u64 = 3;

/// Seconds between consecutive captures, cycled per folder.
const CAPTURE_GAPS: [i64; 6] = [1, 2, 7, 1, 4, 12];

#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    pub photos_per_folder: usize,
    /// Simulated cost of one scanned file or one thumbnail.
    pub step: Duration,
    /// Keep existing thumbnails when stacks are regrouped.
    pub preserve_thumbnails_on_restack: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            photos_per_folder: 12,
            step: Duration::from_millis(20),
            preserve_thumbnails_on_restack: true,
        }
    }
}

#[derive(Debug, Clone)]
struct SimPhoto {
    logical_photo_id: i64,
    folder_id: i64,
    index: usize,
    capture_secs: i64,
    has_raw: bool,
    thumbnail: bool,
}

#[derive(Debug, Default)]
struct SimState {
    folders: Vec<SourceFolder>,
    next_folder_id: i64,
    photos: Vec<SimPhoto>,
    next_photo_id: i64,
    /// Each stack is a list of logical photo ids in capture order.
    stacks: Vec<(i64, Vec<i64>)>,
    next_stack_id: i64,
    status: IndexingStatus,
    burst_gap_secs: u64,
}

struct Inner {
    options: SimulatorOptions,
    state: Mutex<SimState>,
    events: broadcast::Sender<(String, serde_json::Value)>,
    cancel: AtomicBool,
    pause: AtomicBool,
    live_subscriptions: AtomicUsize,
}

#[derive(Clone)]
pub struct SimulatedBackend {
    inner: Arc<Inner>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SimulatorOptions::default())
    }
}

impl SimulatedBackend {
    pub fn new(options: SimulatorOptions) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                options,
                state: Mutex::new(SimState {
                    next_folder_id: 1,
                    next_photo_id: 1,
                    next_stack_id: 1,
                    burst_gap_secs: DEFAULT_BURST_GAP_SECS,
                    ..Default::default()
                }),
                events,
                cancel: AtomicBool::new(false),
                pause: AtomicBool::new(false),
                live_subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of push subscriptions that have not been disposed yet.
    pub fn live_subscriptions(&self) -> usize {
        self.inner.live_subscriptions.load(Ordering::SeqCst)
    }

    /// Publish an arbitrary payload, e.g. a malformed one.
    pub fn emit_raw(&self, event: &str, payload: serde_json::Value) {
        let _ = self.inner.events.send((event.to_string(), payload));
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn wait_step(&self) {
        while self.pause.load(Ordering::SeqCst) && !self.cancel.load(Ordering::SeqCst) {
            tokio::time::sleep(self.options.step).await;
        }
        tokio::time::sleep(self.options.step).await;
    }

    async fn run_scan(self: Arc<Self>) {
        let pending: Vec<(i64, usize)> = {
            let state = self.lock();
            let known: HashSet<(i64, usize)> =
                state.photos.iter().map(|p| (p.folder_id, p.index)).collect();
            state
                .folders
                .iter()
                .flat_map(|f| (0..self.options.photos_per_folder).map(move |i| (f.id, i)))
                .filter(|key| !known.contains(key))
                .collect()
        };
        let skipped_existing = {
            let state = self.lock();
            state.folders.len() * self.options.photos_per_folder - pending.len()
        };

        let mut imported = 0;
        for (folder_id, index) in pending {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            self.wait_step().await;
            let mut state = self.lock();
            let logical_photo_id = state.next_photo_id;
            state.next_photo_id += 1;
            state.photos.push(SimPhoto {
                logical_photo_id,
                folder_id,
                index,
                capture_secs: capture_offset(folder_id, index),
                has_raw: index % 3 != 0,
                thumbnail: false,
            });
            state.status.processed_items += 1;
            imported += 1;
        }

        let cancelled = self.cancel.load(Ordering::SeqCst);
        {
            let mut state = self.lock();
            regroup(&mut state);
            let stats = ImportStats {
                total_files_scanned: state.status.total_items,
                imported,
                skipped_existing,
                stacks_generated: state.stacks.len(),
                logical_photos: state.photos.len(),
                cancelled,
                ..Default::default()
            };
            state.status.scan_running = false;
            state.status.cancelled = cancelled;
            state.status.paused = false;
            state.status.last_run_stats = Some(stats);
        }

        if !cancelled {
            self.run_thumbnails().await;
        }
    }

    async fn run_thumbnails(self: &Arc<Self>) {
        let missing: Vec<i64> = {
            let mut state = self.lock();
            let missing: Vec<i64> = state
                .photos
                .iter()
                .filter(|p| !p.thumbnail)
                .map(|p| p.logical_photo_id)
                .collect();
            state.status.thumbnails_running = true;
            state.status.thumbnail_total = missing.len();
            state.status.thumbnail_done = 0;
            missing
        };

        for logical_photo_id in missing {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            self.wait_step().await;
            {
                let mut state = self.lock();
                if let Some(photo) = state
                    .photos
                    .iter_mut()
                    .find(|p| p.logical_photo_id == logical_photo_id)
                {
                    photo.thumbnail = true;
                }
                state.status.thumbnail_done += 1;
            }
            let payload = serde_json::to_value(ThumbnailReadyPayload { logical_photo_id })
                .unwrap_or(serde_json::Value::Null);
            let _ = self.events.send((THUMBNAIL_READY_EVENT.to_string(), payload));
        }

        let mut state = self.lock();
        state.status.thumbnails_running = false;
        state.status.paused = false;
    }
}

fn capture_offset(folder_id: i64, index: usize) -> i64 {
    let base = folder_id * 100_000;
    base + (0..index).map(|i| CAPTURE_GAPS[i % CAPTURE_GAPS.len()]).sum::<i64>()
}

/// Rebuild stacks from scratch: consecutive captures no more than
/// `burst_gap_secs` apart share a stack.
fn regroup(state: &mut SimState) {
    let mut ordered: Vec<&SimPhoto> = state.photos.iter().collect();
    ordered.sort_by_key(|p| (p.capture_secs, p.logical_photo_id));

    let mut groups: Vec<Vec<i64>> = Vec::new();
    let mut last_capture: Option<i64> = None;
    for photo in ordered {
        let split = match last_capture {
            Some(prev) => (photo.capture_secs - prev) as u64 > state.burst_gap_secs,
            None => true,
        };
        if split {
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push(photo.logical_photo_id);
        }
        last_capture = Some(photo.capture_secs);
    }

    let mut stacks = Vec::with_capacity(groups.len());
    for group in groups {
        stacks.push((state.next_stack_id, group));
        state.next_stack_id += 1;
    }
    state.stacks = stacks;
}

fn summarize(state: &SimState) -> Vec<StackSummary> {
    state
        .stacks
        .iter()
        .map(|(stack_id, members)| {
            let photos: Vec<&SimPhoto> = members
                .iter()
                .filter_map(|id| state.photos.iter().find(|p| p.logical_photo_id == *id))
                .collect();
            let first = photos.first();
            StackSummary {
                stack_id: *stack_id,
                photo_count: photos.len() as i64,
                earliest_capture_time: first.and_then(|p| {
                    Utc.timestamp_opt(1_700_000_000 + p.capture_secs, 0)
                        .single()
                        .map(|t| t.to_rfc3339())
                }),
                has_raw: photos.iter().any(|p| p.has_raw),
                has_jpeg: !photos.is_empty(),
                thumbnail_path: first
                    .filter(|p| p.thumbnail)
                    .map(|p| format!("cache/thumbnails/{}.jpg", p.logical_photo_id)),
            }
        })
        .collect()
}

#[async_trait]
impl Backend for SimulatedBackend {
    async fn list_source_folders(&self, _slug: &str) -> BackendResult<Vec<SourceFolder>> {
        Ok(self.inner.lock().folders.clone())
    }

    async fn list_stacks(&self, _slug: &str) -> BackendResult<Vec<StackSummary>> {
        Ok(summarize(&self.inner.lock()))
    }

    async fn get_indexing_status(&self, _slug: &str) -> BackendResult<IndexingStatus> {
        Ok(self.inner.lock().status.clone())
    }

    async fn add_source_folder(&self, _slug: &str, path: &str) -> BackendResult<()> {
        let mut state = self.inner.lock();
        if state.folders.iter().any(|f| f.path == path) {
            return Err(format!("Folder already attached: {path}"));
        }
        let id = state.next_folder_id;
        state.next_folder_id += 1;
        state.folders.push(SourceFolder {
            id,
            path: path.to_string(),
        });
        Ok(())
    }

    async fn remove_source_folder(&self, _slug: &str, folder_id: i64) -> BackendResult<()> {
        let mut state = self.inner.lock();
        if state.status.scan_running {
            return Err("Cannot remove folder while indexing is in progress".to_string());
        }
        state.folders.retain(|f| f.id != folder_id);
        state.photos.retain(|p| p.folder_id != folder_id);
        regroup(&mut state);
        Ok(())
    }

    async fn start_indexing(&self, _slug: &str) -> BackendResult<()> {
        {
            let mut state = self.inner.lock();
            if state.status.is_active() {
                return Err("Indexing is already running".to_string());
            }
            if state.folders.is_empty() {
                return Err("No source folders attached to this project".to_string());
            }
            // A fresh run regenerates every thumbnail.
            for photo in state.photos.iter_mut() {
                photo.thumbnail = false;
            }
            self.inner.cancel.store(false, Ordering::SeqCst);
            self.inner.pause.store(false, Ordering::SeqCst);
            state.status = IndexingStatus {
                scan_running: true,
                total_items: state.folders.len() * self.inner.options.photos_per_folder,
                ..Default::default()
            };
        }
        tokio::spawn(self.inner.clone().run_scan());
        Ok(())
    }

    async fn cancel_indexing(&self) -> BackendResult<()> {
        self.inner.cancel.store(true, Ordering::SeqCst);
        self.inner.pause.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn pause_indexing(&self) -> BackendResult<()> {
        self.inner.pause.store(true, Ordering::SeqCst);
        self.inner.lock().status.paused = true;
        Ok(())
    }

    async fn resume_indexing(&self) -> BackendResult<()> {
        self.inner.pause.store(false, Ordering::SeqCst);
        self.inner.lock().status.paused = false;
        Ok(())
    }

    async fn resume_thumbnails(&self, _slug: &str) -> BackendResult<()> {
        {
            let mut state = self.inner.lock();
            if state.status.is_active() {
                return Err("Indexing is already running".to_string());
            }
            self.inner.cancel.store(false, Ordering::SeqCst);
            state.status.thumbnails_running = true;
            state.status.cancelled = false;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run_thumbnails().await });
        Ok(())
    }

    async fn get_burst_gap(&self) -> BackendResult<u64> {
        Ok(self.inner.lock().burst_gap_secs)
    }

    async fn set_burst_gap(&self, secs: u64) -> BackendResult<()> {
        if secs == 0 {
            return Err("burst gap must be at least 1 second".to_string());
        }
        self.inner.lock().burst_gap_secs = secs;
        Ok(())
    }

    async fn restack(&self, _slug: &str) -> BackendResult<()> {
        let mut state = self.inner.lock();
        if state.status.is_active() {
            return Err("Cannot restack while indexing is in progress".to_string());
        }
        regroup(&mut state);
        if !self.inner.options.preserve_thumbnails_on_restack {
            for photo in state.photos.iter_mut() {
                photo.thumbnail = false;
            }
        }
        Ok(())
    }
}

impl EventSource for SimulatedBackend {
    fn subscribe(&self, event: &str) -> BackendResult<Subscription> {
        let wanted = event.to_string();
        let stream = BroadcastStream::new(self.inner.events.subscribe()).filter_map(move |msg| {
            match msg {
                Ok((name, payload)) if name == wanted => Some(payload),
                _ => None,
            }
        });

        self.inner.live_subscriptions.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        let disposer = Disposer::new(move || {
            inner.live_subscriptions.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(Subscription::new(Box::pin(stream), disposer))
    }
}
