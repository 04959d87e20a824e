//! Which background command, if any, to issue without the user asking.

use serde::Serialize;

use crate::backend::{IndexingStatus, SourceFolder, StackSummary};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    StartIndexing,
    ResumeThumbnails,
}

impl AutoAction {
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::StartIndexing => "start_indexing",
            Self::ResumeThumbnails => "resume_thumbnails",
        }
    }
}

/// First match wins:
///
/// 1. a phase is running: nothing, the caller polls instead
/// 2. folders but no stacks: start indexing
/// 3. some stack has no thumbnail: resume thumbnails
/// 4. nothing
///
/// Every call site that changes folders or stacks goes through here; never
/// cache the result across snapshots.
pub fn decide(
    folders: &[SourceFolder],
    stacks: &[StackSummary],
    status: &IndexingStatus,
) -> Option<AutoAction> {
    if status.is_active() {
        return None;
    }
    if !folders.is_empty() && stacks.is_empty() {
        return Some(AutoAction::StartIndexing);
    }
    if stacks.iter().any(StackSummary::is_missing_thumbnail) {
        return Some(AutoAction::ResumeThumbnails);
    }
    None
}

pub fn decide_snapshot(snapshot: &Snapshot) -> Option<AutoAction> {
    decide(&snapshot.folders, &snapshot.stacks, &snapshot.status)
}
