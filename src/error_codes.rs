//! Error code constants
//!
//! Returned as strings so a frontend can localise them.

/// A folder, stack or status query failed
pub const ERR_QUERY_FAILED: &str = "ERR_QUERY_FAILED";

/// The backend rejected a command
pub const ERR_COMMAND_REJECTED: &str = "ERR_COMMAND_REJECTED";

/// The screen was deactivated while the operation was in flight
pub const ERR_SCREEN_INACTIVE: &str = "ERR_SCREEN_INACTIVE";

/// User input failed validation
pub const ERR_INVALID_INPUT: &str = "ERR_INVALID_INPUT";

/// Reconfiguration action not allowed in the current workflow state
pub const ERR_INVALID_TRANSITION: &str = "ERR_INVALID_TRANSITION";

/// Controller configuration could not be loaded
pub const ERR_CONFIG: &str = "ERR_CONFIG";
