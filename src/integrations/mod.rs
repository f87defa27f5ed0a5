//! Pluggable integrations and their lifecycle contract.
//!
//! Every integration implements [`Integration`]: it receives its collaborators
//! once through [`Integration::provide`], then is switched on and off by the
//! orchestrator through `enable`/`disable`. The orchestrator owns those
//! transitions; integrations never toggle themselves.
//!
//! [`default_registry`] lists the shipped integrations together with the
//! config fields that drive them, and hands back the receiving ends of what
//! they publish.

pub mod companion_server;
pub mod custom_css;
pub mod discord_presence;
pub mod last_fm;
pub mod notifications;
pub mod ratio_volume;
mod watcher;

use crate::config::ConfigStore;
use crate::models::ConfigSnapshot;
use crate::services::PlayerStateAggregator;
use crate::state::{COMPANION_AUTH_WINDOW_KEY, EphemeralStore};
use crate::ui::{BroadcastRouter, ShellHost, SurfaceKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

pub use companion_server::CompanionServer;
pub use custom_css::CustomCss;
pub use discord_presence::{Activity, DiscordPresence};
pub use last_fm::{LastFm, Scrobble, ScrobbleTracker};
pub use notifications::Notifications;
pub use ratio_volume::RatioVolume;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Failed to enable {name}: {message}")]
    Enable { name: &'static str, message: String },

    #[error("Failed to disable {name}: {message}")]
    Disable { name: &'static str, message: String },

    #[error("I/O error in {name}: {source}")]
    Io {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} was used before its collaborators were provided")]
    MissingContext(&'static str),
}

/// Collaborators handed to every integration.
#[derive(Clone)]
pub struct IntegrationContext {
    pub config: ConfigStore,
    pub ephemeral: EphemeralStore,
    pub player: PlayerStateAggregator,
    pub router: BroadcastRouter,
    pub host: Arc<dyn ShellHost>,
}

/// Lifecycle contract of an integration.
///
/// `enable` and `disable` must tolerate being called while already in the
/// target state.
#[async_trait]
pub trait Integration: Send + Sync {
    fn provide(&mut self, ctx: IntegrationContext);

    async fn enable(&mut self) -> Result<(), IntegrationError>;

    async fn disable(&mut self) -> Result<(), IntegrationError>;

    /// A surface of `kind` was (re)registered while this integration is
    /// enabled. Integrations that push state into a page re-apply it here.
    async fn surface_ready(&mut self, _kind: SurfaceKind) -> Result<(), IntegrationError> {
        Ok(())
    }
}

/// Config predicate selecting one boolean out of a snapshot.
pub type EnabledFlag = fn(&ConfigSnapshot) -> bool;

/// Predicate over `(new, old)` deciding whether a still-enabled integration
/// must be cycled.
pub type RestartTrigger = fn(&ConfigSnapshot, &ConfigSnapshot) -> bool;

/// An integration registered with the orchestrator.
pub struct IntegrationBinding {
    pub name: &'static str,

    /// The flag whose transitions drive `enable`/`disable`.
    pub is_enabled: EnabledFlag,

    /// Sub-settings that force a disable-then-enable cycle.
    pub requires_restart: RestartTrigger,

    /// Ephemeral flags that are cleared when the integration is disabled.
    pub owned_flags: &'static [&'static str],

    pub integration: Box<dyn Integration>,
}

fn never_restart(_new: &ConfigSnapshot, _old: &ConfigSnapshot) -> bool {
    false
}

impl IntegrationBinding {
    pub fn new(name: &'static str, is_enabled: EnabledFlag, integration: Box<dyn Integration>) -> Self {
        Self {
            name,
            is_enabled,
            requires_restart: never_restart,
            owned_flags: &[],
            integration,
        }
    }

    pub fn restart_when(mut self, trigger: RestartTrigger) -> Self {
        self.requires_restart = trigger;
        self
    }

    pub fn owning(mut self, flags: &'static [&'static str]) -> Self {
        self.owned_flags = flags;
        self
    }
}

/// Receiving ends of what the shipped integrations publish for transports
/// living outside the core.
pub struct IntegrationOutputs {
    /// Finished listens from [`LastFm`], for the scrobble submitter.
    pub scrobbles: broadcast::Receiver<Scrobble>,
    /// Current activity from [`DiscordPresence`], for the presence client.
    pub presence: watch::Receiver<Option<Activity>>,
}

/// The shipped integrations, in enable order.
pub fn default_registry() -> (Vec<IntegrationBinding>, IntegrationOutputs) {
    let last_fm = LastFm::new();
    let discord_presence = DiscordPresence::new();
    let outputs = IntegrationOutputs {
        scrobbles: last_fm.subscribe(),
        presence: discord_presence.activity(),
    };

    let registry = vec![
        IntegrationBinding::new(
            "companion-server",
            |s| s.integrations.companion_server_enabled,
            Box::new(CompanionServer::new()),
        )
        .restart_when(|new, old| {
            new.integrations.companion_server_cors_wildcard_enabled
                != old.integrations.companion_server_cors_wildcard_enabled
                || new.integrations.companion_server_port != old.integrations.companion_server_port
        })
        .owning(&[COMPANION_AUTH_WINDOW_KEY]),
        IntegrationBinding::new(
            "custom-css",
            |s| s.appearance.custom_css_enabled,
            Box::new(CustomCss::new()),
        )
        .restart_when(|new, old| new.appearance.custom_css_path != old.appearance.custom_css_path),
        IntegrationBinding::new(
            "discord-presence",
            |s| s.integrations.discord_presence_enabled,
            Box::new(discord_presence),
        ),
        IntegrationBinding::new(
            "last-fm",
            |s| s.integrations.last_fm_enabled,
            Box::new(last_fm),
        ),
        IntegrationBinding::new(
            "notifications",
            |s| s.general.show_notification_on_song_change,
            Box::new(Notifications::new()),
        ),
        IntegrationBinding::new(
            "volume-ratio",
            |s| s.playback.ratio_volume,
            Box::new(RatioVolume::new()),
        ),
    ];
    (registry, outputs)
}
