//! Command/query boundary to the indexing backend.
//!
//! The controller never computes stacks or thumbnails itself. Everything it
//! knows arrives through [`Backend`] (request/response) or [`EventSource`]
//! (push notifications).

pub mod simulator;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

pub use simulator::{SimulatedBackend, SimulatorOptions};
pub use types::{ImportStats, IndexingStatus, SourceFolder, StackSummary, ThumbnailReadyPayload};

/// Push event emitted by the backend after each thumbnail is written.
pub const THUMBNAIL_READY_EVENT: &str = "thumbnail-ready";

/// Backend failures cross the IPC boundary as plain messages.
pub type BackendResult<T> = std::result::Result<T, String>;

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn list_source_folders(&self, slug: &str) -> BackendResult<Vec<SourceFolder>>;
    async fn list_stacks(&self, slug: &str) -> BackendResult<Vec<StackSummary>>;
    async fn get_indexing_status(&self, slug: &str) -> BackendResult<IndexingStatus>;

    async fn add_source_folder(&self, slug: &str, path: &str) -> BackendResult<()>;
    async fn remove_source_folder(&self, slug: &str, folder_id: i64) -> BackendResult<()>;

    async fn start_indexing(&self, slug: &str) -> BackendResult<()>;
    async fn cancel_indexing(&self) -> BackendResult<()>;
    async fn pause_indexing(&self) -> BackendResult<()>;
    async fn resume_indexing(&self) -> BackendResult<()>;
    async fn resume_thumbnails(&self, slug: &str) -> BackendResult<()>;

    async fn get_burst_gap(&self) -> BackendResult<u64>;
    async fn set_burst_gap(&self, secs: u64) -> BackendResult<()>;
    /// Regroup stacks with the current burst gap. May invalidate thumbnails.
    async fn restack(&self, slug: &str) -> BackendResult<()>;
}

pub type EventStream = Pin<Box<dyn Stream<Item = serde_json::Value> + Send>>;

pub trait EventSource: Send + Sync + 'static {
    fn subscribe(&self, event: &str) -> BackendResult<Subscription>;
}

/// Runs an unsubscribe callback exactly once, on [`Disposer::dispose`] or on drop.
pub struct Disposer(Option<Box<dyn FnOnce() + Send>>);

impl Disposer {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn dispose(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.is_none()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A live push subscription: the payload stream plus its disposer.
pub struct Subscription {
    pub stream: EventStream,
    pub disposer: Disposer,
}

impl Subscription {
    pub fn new(stream: EventStream, disposer: Disposer) -> Self {
        Self { stream, disposer }
    }
}
