use serde::{Deserialize, Serialize};

/// Statistics of the last completed scan phase.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_files_scanned: usize,
    pub imported: usize,
    pub skipped_existing: usize,
    pub skipped_unsupported: usize,
    pub errors: usize,
    pub pairs_detected: usize,
    pub stacks_generated: usize,
    pub logical_photos: usize,
    /// capped at 100 entries
    pub error_log: Vec<String>,
    pub cancelled: bool,
}

/// Read-only copy of the backend job status.
///
/// A total of `0` means "not known yet", never "nothing to do".
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingStatus {
    #[serde(rename = "running")]
    pub scan_running: bool,
    pub thumbnails_running: bool,
    #[serde(rename = "total")]
    pub total_items: usize,
    #[serde(rename = "processed")]
    pub processed_items: usize,
    #[serde(rename = "thumbnails_total")]
    pub thumbnail_total: usize,
    #[serde(rename = "thumbnails_done")]
    pub thumbnail_done: usize,
    #[serde(rename = "errors")]
    pub error_count: usize,
    pub cancelled: bool,
    pub paused: bool,
    #[serde(rename = "last_stats")]
    pub last_run_stats: Option<ImportStats>,
}

impl IndexingStatus {
    /// Either phase is running.
    pub fn is_active(&self) -> bool {
        self.scan_running || self.thumbnails_running
    }

    /// Neither phase is running; the only state in which polling may stop.
    pub fn is_idle(&self) -> bool {
        !self.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFolder {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub stack_id: i64,
    #[serde(rename = "logical_photo_count")]
    pub photo_count: i64,
    #[serde(rename = "earliest_capture")]
    pub earliest_capture_time: Option<String>,
    pub has_raw: bool,
    pub has_jpeg: bool,
    /// `None` means "not generated yet".
    pub thumbnail_path: Option<String>,
}

impl StackSummary {
    pub fn is_missing_thumbnail(&self) -> bool {
        self.thumbnail_path.is_none()
    }
}

/// Payload carried by the `thumbnail-ready` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailReadyPayload {
    pub logical_photo_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_deserializes_backend_field_names() {
        let json = r#"{
            "running": true,
            "thumbnails_running": false,
            "total": 40,
            "processed": 12,
            "errors": 1,
            "cancelled": false,
            "paused": false,
            "last_stats": null,
            "thumbnails_total": 0,
            "thumbnails_done": 0
        }"#;

        let status: IndexingStatus = serde_json::from_str(json).unwrap();
        assert!(status.scan_running);
        assert_eq!(status.total_items, 40);
        assert_eq!(status.processed_items, 12);
        assert_eq!(status.error_count, 1);
        assert!(status.is_active());
    }

    #[test]
    fn test_default_status_is_idle() {
        assert!(IndexingStatus::default().is_idle());
    }

    #[test]
    fn test_thumbnail_ready_payload_shape() {
        let payload = ThumbnailReadyPayload { logical_photo_id: 42 };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"logical_photo_id":42}"#);
    }
}
