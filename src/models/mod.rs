//! Data models shared across the shell core.
//!
//! - [`ConfigSnapshot`]: fully-defaulted persisted settings, grouped into namespaces
//! - [`PlayerState`]: canonical playback state produced by the aggregator
//! - [`PlayerSnapshot`], [`VideoDetails`]: raw payloads arriving from the hosted page
//! - [`RemoteCommand`]: the remote-control command set
//!
//! All models are plain data: `Clone`, `Serialize`/`Deserialize`, no interior
//! mutability. Shared mutable access goes through the stores in
//! [`crate::config`], [`crate::state`] and [`crate::services`].

pub mod config;
pub mod player_state;
pub mod remote;

pub use config::{
    AppearanceConfig, ConfigSnapshot, CredentialsConfig, DeveloperConfig, GeneralConfig,
    IntegrationsConfig, NAMESPACES, PlaybackConfig, ShortcutsConfig, StateConfig,
};
pub use player_state::{
    AlbumDetails, LikeStatus, PlayerQueue, PlayerSnapshot, PlayerState, QueueItem, Thumbnail,
    TrackState, VideoDetails,
};
pub use remote::RemoteCommand;
