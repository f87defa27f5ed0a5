// YTMShell - desktop shell core for a hosted music web player
//
// This is the library crate containing the orchestration core: settings and
// ephemeral stores, the integration lifecycle, the canonical player state and
// the navigation gate. The binary crate (main.rs) runs it headless.

pub mod config;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{BootstrapSettings, ConfigChange, ConfigError, ConfigStore};
pub use integrations::{
    Integration, IntegrationBinding, IntegrationError, IntegrationOutputs, default_registry,
};
pub use models::{ConfigSnapshot, PlayerState, RemoteCommand};
pub use orchestrator::{IntegrationOrchestrator, TimerRegistry};
pub use services::{NavigationDecision, NavigationGate, NavigationKind, PlayerStateAggregator};
pub use state::{EphemeralChange, EphemeralStore};
pub use ui::{BroadcastRouter, ShellController, ShellHost};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
