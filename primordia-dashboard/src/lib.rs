/// Primordia Dashboard
///
/// Terminal front-end for the Primordia divergence index:
/// - Immutable startup settings and persisted preferences
/// - Pure dashboard state machine (regions, selection, polling, waitlist, chat)
/// - Controller actor that owns the state and runs fetches and the poll timer
/// - ratatui rendering and key bindings
pub mod config;
pub mod controller;
pub mod logging;
pub mod state;
pub mod ui;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types for convenience
pub use config::{ConfigError, PollPolicy, Preferences, Settings, Theme};
pub use controller::{Command, DashboardHandle};
pub use state::{DashboardError, DashboardEvent, DashboardState, Effect, ErrorKind, Panel, Phase};
