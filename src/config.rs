//! Controller settings, loaded from YAML.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::THUMBNAIL_READY_EVENT;
use crate::logging::DEFAULT_MAX_LOG_LINES;

/// Burst gap shown when the current value cannot be read.
pub const DEFAULT_BURST_GAP_SECS: u64 = 3;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    pub poll_interval_ms: u64,
    pub default_burst_gap_secs: u64,
    pub thumbnail_event: String,
    pub max_log_lines: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_burst_gap_secs: DEFAULT_BURST_GAP_SECS,
            thumbnail_event: THUMBNAIL_READY_EVENT.to_string(),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
        }
    }
}

impl ControllerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("invalid controller config")?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(50..=60_000).contains(&self.poll_interval_ms) {
            bail!(
                "pollIntervalMs out of range: {} (50..=60000)",
                self.poll_interval_ms
            );
        }
        crate::input_validation::validate_burst_gap(self.default_burst_gap_secs)?;
        if self.thumbnail_event.trim().is_empty() {
            bail!("thumbnailEvent cannot be empty");
        }
        if self.max_log_lines == 0 {
            bail!("maxLogLines must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.default_burst_gap_secs, 3);
        assert_eq!(config.thumbnail_event, "thumbnail-ready");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ControllerConfig::from_yaml_str("pollIntervalMs: 250\n").unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.default_burst_gap_secs, 3);
    }

    #[test]
    fn test_rejects_bad_interval() {
        assert!(ControllerConfig::from_yaml_str("pollIntervalMs: 5\n").is_err());
    }

    #[test]
    fn test_rejects_zero_burst_gap() {
        assert!(ControllerConfig::from_yaml_str("defaultBurstGapSecs: 0\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "thumbnailEvent: thumb-done\nmaxLogLines: 50").unwrap();

        let config = ControllerConfig::load(file.path()).unwrap();
        assert_eq!(config.thumbnail_event, "thumb-done");
        assert_eq!(config.max_log_lines, 50);
    }
}
