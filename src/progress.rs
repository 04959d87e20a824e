//! Progress derived from a status snapshot, for display.

use serde::Serialize;

use crate::backend::IndexingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Scanning,
    Thumbnails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub phase: Phase,
    pub done: usize,
    pub total: usize,
    /// `None` while the total is not known yet.
    pub percent: Option<f64>,
    pub paused: bool,
    pub cancelled: bool,
    pub errors: usize,
    pub error_log: Vec<String>,
}

impl ProgressView {
    pub fn from_status(status: &IndexingStatus) -> Self {
        let (phase, done, total) = if status.scan_running {
            (Phase::Scanning, status.processed_items, status.total_items)
        } else if status.thumbnails_running {
            (Phase::Thumbnails, status.thumbnail_done, status.thumbnail_total)
        } else {
            (Phase::Idle, 0, 0)
        };

        let percent = (total > 0).then(|| (done.min(total) as f64 / total as f64) * 100.0);

        Self {
            phase,
            done,
            total,
            percent,
            paused: status.paused,
            cancelled: status.cancelled,
            errors: status.error_count,
            error_log: status
                .last_run_stats
                .as_ref()
                .map(|s| s.error_log.clone())
                .unwrap_or_default(),
        }
    }

    pub fn label(&self) -> String {
        match (self.phase, self.percent) {
            (Phase::Idle, _) if self.cancelled => "Cancelled".to_string(),
            (Phase::Idle, _) => "Idle".to_string(),
            (phase, None) => format!("{phase:?}..."),
            (phase, Some(_)) if self.paused => format!("{phase:?} paused ({}/{})", self.done, self.total),
            (phase, Some(pct)) => format!("{phase:?} {}/{} ({pct:.0}%)", self.done, self.total),
        }
    }
}
