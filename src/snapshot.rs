//! One consistent read of folders, stacks and job status.

use serde::Serialize;

use crate::backend::{Backend, IndexingStatus, SourceFolder, StackSummary};
use crate::error::{Result, SyncError};

/// The triple every decision in one cycle is made from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub folders: Vec<SourceFolder>,
    pub stacks: Vec<StackSummary>,
    pub status: IndexingStatus,
}

/// Issue the three queries concurrently. Any failure fails the whole fetch;
/// callers never see a partial snapshot.
pub async fn fetch_snapshot<B: Backend + ?Sized>(backend: &B, slug: &str) -> Result<Snapshot> {
    let (folders, stacks, status) = tokio::try_join!(
        fetch_folders(backend, slug),
        fetch_stacks(backend, slug),
        fetch_status(backend, slug),
    )?;

    Ok(Snapshot {
        folders,
        stacks,
        status,
    })
}

pub async fn fetch_folders<B: Backend + ?Sized>(backend: &B, slug: &str) -> Result<Vec<SourceFolder>> {
    backend
        .list_source_folders(slug)
        .await
        .map_err(|e| SyncError::query("list_source_folders", e))
}

pub async fn fetch_stacks<B: Backend + ?Sized>(backend: &B, slug: &str) -> Result<Vec<StackSummary>> {
    backend
        .list_stacks(slug)
        .await
        .map_err(|e| SyncError::query("list_stacks", e))
}

pub async fn fetch_status<B: Backend + ?Sized>(backend: &B, slug: &str) -> Result<IndexingStatus> {
    backend
        .get_indexing_status(slug)
        .await
        .map_err(|e| SyncError::query("get_indexing_status", e))
}
