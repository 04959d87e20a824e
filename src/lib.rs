pub mod backend;
pub mod config;
pub mod controller;
pub mod decider;
pub mod error;
pub mod error_codes;
pub mod events;
pub mod focus;
pub mod input_validation;
pub mod logging;
pub mod poll;
pub mod progress;
pub mod reconfigure;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{Backend, EventSource, SimulatedBackend, SimulatorOptions};
pub use config::ControllerConfig;
pub use controller::{Screen, ScreenState, StackOverview, Trigger};
pub use decider::{decide, AutoAction};
pub use error::SyncError;
pub use progress::ProgressView;
pub use reconfigure::{CommitOutcome, ReconfigureState};

/// Crate version, as reported by the CLI.
pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
