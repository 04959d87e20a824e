use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Default maximum number of log lines to keep in memory
pub const DEFAULT_MAX_LOG_LINES: usize = 10000;

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` filter.
/// Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub project: Option<String>,
}

/// Event published when a new log entry is added
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub project: Option<String>,
    pub entry: LogEntry,
}

/// User-visible activity log: auto-actions issued, commands rejected,
/// reconfigurations committed.
pub struct LogManager {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_lines: usize,
    next_id: Mutex<u64>,
    events: broadcast::Sender<LogEvent>,
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_LINES)
    }
}

impl LogManager {
    pub fn new(max_lines: usize) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_lines.min(1024)))),
            max_lines,
            next_id: Mutex::new(0),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log(&self, level: LogLevel, message: &str, project: Option<&str>) {
        match level {
            LogLevel::Debug => tracing::debug!(project, "{message}"),
            LogLevel::Info => tracing::info!(project, "{message}"),
            LogLevel::Warning => tracing::warn!(project, "{message}"),
            LogLevel::Error => tracing::error!(project, "{message}"),
        }

        let seq = {
            let mut next = self.next_id.lock().unwrap_or_else(|p| p.into_inner());
            *next += 1;
            *next
        };
        let entry = LogEntry {
            id: seq.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            message: message.to_string(),
            project: project.map(str::to_string),
        };

        {
            let mut logs = self.lock();
            logs.push_back(entry.clone());
            while logs.len() > self.max_lines {
                logs.pop_front();
            }
        }

        let _ = self.events.send(LogEvent {
            project: entry.project.clone(),
            entry,
        });
    }

    pub fn info(&self, message: &str, project: Option<&str>) {
        self.log(LogLevel::Info, message, project);
    }

    pub fn warn(&self, message: &str, project: Option<&str>) {
        self.log(LogLevel::Warning, message, project);
    }

    /// Live feed of new entries.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    pub fn get_logs(&self, project: Option<&str>) -> Vec<LogEntry> {
        let logs = self.lock();
        match project {
            Some(p) => logs
                .iter()
                .filter(|l| l.project.as_deref() == Some(p))
                .cloned()
                .collect(),
            None => logs.iter().cloned().collect(),
        }
    }

    /// Get logs with pagination
    pub fn get_logs_paginated(&self, project: Option<&str>, offset: usize, limit: usize) -> Vec<LogEntry> {
        let logs = self.lock();
        logs.iter()
            .filter(|l| project.is_none() || l.project.as_deref() == project)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
