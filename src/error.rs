use thiserror::Error;

use crate::error_codes::{
    ERR_COMMAND_REJECTED, ERR_CONFIG, ERR_INVALID_INPUT, ERR_INVALID_TRANSITION,
    ERR_QUERY_FAILED, ERR_SCREEN_INACTIVE,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("query {query} failed: {message}")]
    QueryFailed { query: &'static str, message: String },

    #[error("command {command} rejected: {message}")]
    CommandRejected {
        command: &'static str,
        message: String,
    },

    #[error("screen is no longer active")]
    Inactive,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot {action} while reconfiguration is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn query(query: &'static str, err: impl std::fmt::Display) -> Self {
        Self::QueryFailed {
            query,
            message: err.to_string(),
        }
    }

    pub fn rejected(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::CommandRejected {
            command,
            message: err.to_string(),
        }
    }

    /// Stable code for the frontend.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryFailed { .. } => ERR_QUERY_FAILED,
            Self::CommandRejected { .. } => ERR_COMMAND_REJECTED,
            Self::Inactive => ERR_SCREEN_INACTIVE,
            Self::InvalidInput(_) => ERR_INVALID_INPUT,
            Self::InvalidTransition { .. } => ERR_INVALID_TRANSITION,
            Self::Config(_) => ERR_CONFIG,
        }
    }

    /// Query failures are transient: the next tick or user action retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueryFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
