//! Burst-gap reconfiguration: open, edit, then commit or abandon.
//!
//! This type only tracks the workflow state. The commit sequence itself
//! (write, regroup, re-fetch, decide) runs in
//! [`Screen::commit_reconfigure`](crate::controller::Screen::commit_reconfigure)
//! so it shares the decision path with every other reload.

use serde::Serialize;

use crate::backend::BackendResult;
use crate::decider::AutoAction;
use crate::error::{Result, SyncError};
use crate::input_validation::validate_burst_gap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ReconfigureState {
    Closed,
    Open { current: u64, draft: u64 },
    Committing { value: u64 },
}

impl ReconfigureState {
    fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::Committing { .. } => "committing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub burst_gap_secs: u64,
    /// What the post-regroup decision issued, if anything.
    pub auto_action: Option<AutoAction>,
}

#[derive(Debug, Clone)]
pub struct ReconfigurationWorkflow {
    state: ReconfigureState,
    fallback: u64,
}

impl ReconfigurationWorkflow {
    pub fn new(fallback: u64) -> Self {
        Self {
            state: ReconfigureState::Closed,
            fallback,
        }
    }

    pub fn state(&self) -> &ReconfigureState {
        &self.state
    }

    pub fn ensure_can_open(&self) -> Result<()> {
        match self.state {
            ReconfigureState::Committing { .. } => Err(self.invalid("open")),
            _ => Ok(()),
        }
    }

    /// Open with the value read from the backend. A failed read is not an
    /// error: the dialog opens on the fallback.
    pub fn open(&mut self, fetched: BackendResult<u64>) -> Result<u64> {
        self.ensure_can_open()?;
        let current = fetched.unwrap_or_else(|err| {
            tracing::warn!("reconfigure: cannot read burst gap, using {}s: {err}", self.fallback);
            self.fallback
        });
        self.state = ReconfigureState::Open {
            current,
            draft: current,
        };
        Ok(current)
    }

    pub fn edit(&mut self, value: u64) -> Result<()> {
        let ReconfigureState::Open { draft, .. } = &mut self.state else {
            return Err(self.invalid("edit"));
        };
        validate_burst_gap(value).map_err(|e| SyncError::InvalidInput(e.to_string()))?;
        *draft = value;
        Ok(())
    }

    /// Abandon without any backend call.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            ReconfigureState::Committing { .. } => Err(self.invalid("cancel")),
            _ => {
                self.state = ReconfigureState::Closed;
                Ok(())
            }
        }
    }

    pub(crate) fn begin_commit(&mut self) -> Result<u64> {
        let ReconfigureState::Open { draft, .. } = self.state else {
            return Err(self.invalid("commit"));
        };
        self.state = ReconfigureState::Committing { value: draft };
        Ok(draft)
    }

    pub(crate) fn finish_commit(&mut self) {
        self.state = ReconfigureState::Closed;
    }

    fn invalid(&self, action: &'static str) -> SyncError {
        SyncError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
