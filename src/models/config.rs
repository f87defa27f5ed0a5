use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::RemoteCommand;

/// Fully-defaulted, persisted settings record.
///
/// Every namespace and every field carries `#[serde(default)]`, so a partial
/// or older file always deserializes into a complete snapshot. Keys on disk are
/// camelCase and addressed as `namespace.fieldName` by
/// [`ConfigStore`](crate::config::ConfigStore).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub general: GeneralConfig,
    pub appearance: AppearanceConfig,
    pub playback: PlaybackConfig,
    pub integrations: IntegrationsConfig,
    pub shortcuts: ShortcutsConfig,
    pub state: StateConfig,
    pub credentials: CredentialsConfig,
    pub developer: DeveloperConfig,
}

/// Namespace names, in the order they appear in the snapshot.
pub const NAMESPACES: [&str; 8] = [
    "general",
    "appearance",
    "playback",
    "integrations",
    "shortcuts",
    "state",
    "credentials",
    "developer",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralConfig {
    pub hide_to_tray_on_close: bool,
    pub show_notification_on_song_change: bool,
    pub start_on_boot: bool,
    pub start_minimized: bool,
    pub disable_hardware_acceleration: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppearanceConfig {
    pub always_show_volume_slider: bool,
    #[serde(rename = "customCSSEnabled")]
    pub custom_css_enabled: bool,
    #[serde(rename = "customCSSPath")]
    pub custom_css_path: Option<String>,
    /// Zoom in percent.
    pub zoom: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            always_show_volume_slider: false,
            custom_css_enabled: false,
            custom_css_path: None,
            zoom: 100,
        }
    }
}

impl AppearanceConfig {
    pub const MIN_ZOOM: u32 = 30;
    pub const MAX_ZOOM: u32 = 300;

    /// Zoom as a scale factor for the hosted surface, clamped to the supported range.
    pub fn zoom_factor(&self) -> f64 {
        f64::from(self.zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)) / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    pub continue_where_you_left_off: bool,
    pub continue_where_you_left_off_paused: bool,
    pub progress_in_taskbar: bool,
    pub enable_speaker_fill: bool,
    pub ratio_volume: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            continue_where_you_left_off: true,
            continue_where_you_left_off_paused: true,
            progress_in_taskbar: false,
            enable_speaker_fill: false,
            ratio_volume: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntegrationsConfig {
    pub companion_server_enabled: bool,
    #[serde(rename = "companionServerCORSWildcardEnabled")]
    pub companion_server_cors_wildcard_enabled: bool,
    pub companion_server_port: u16,
    pub discord_presence_enabled: bool,
    #[serde(rename = "lastFMEnabled")]
    pub last_fm_enabled: bool,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            companion_server_enabled: false,
            companion_server_cors_wildcard_enabled: false,
            companion_server_port: 9863,
            discord_presence_enabled: false,
            last_fm_enabled: false,
        }
    }
}

/// Global accelerator strings. An empty string leaves the action unbound.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShortcutsConfig {
    pub play_pause: String,
    pub next: String,
    pub previous: String,
    pub thumbs_up: String,
    pub thumbs_down: String,
    pub volume_up: String,
    pub volume_down: String,
}

static ACCELERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((CommandOrControl|CmdOrCtrl|Command|Cmd|Control|Ctrl|AltGr|Alt|Option|Shift|Super|Meta)\+)*([A-Za-z0-9]|F([1-9]|1[0-9]|2[0-4])|Plus|Space|Tab|Backspace|Delete|Insert|Return|Enter|Up|Down|Left|Right|Home|End|PageUp|PageDown|Escape|Esc|VolumeUp|VolumeDown|VolumeMute|MediaNextTrack|MediaPreviousTrack|MediaStop|MediaPlayPause|PrintScreen|[-`~!@#$%^&*()=\[\]\\;',./])$",
    )
    .expect("Invalid accelerator regex")
});

/// Returns true if `accelerator` is a well-formed `Modifier+...+Key` string.
pub fn is_valid_accelerator(accelerator: &str) -> bool {
    ACCELERATOR_PATTERN.is_match(accelerator)
}

impl ShortcutsConfig {
    /// All seven `(command, accelerator)` pairs, bound or not.
    pub fn entries(&self) -> [(RemoteCommand, &str); 7] {
        [
            (RemoteCommand::PlayPause, self.play_pause.as_str()),
            (RemoteCommand::Next, self.next.as_str()),
            (RemoteCommand::Previous, self.previous.as_str()),
            (RemoteCommand::ToggleLike, self.thumbs_up.as_str()),
            (RemoteCommand::ToggleDislike, self.thumbs_down.as_str()),
            (RemoteCommand::VolumeUp, self.volume_up.as_str()),
            (RemoteCommand::VolumeDown, self.volume_down.as_str()),
        ]
    }

    /// Bound shortcuts with a valid accelerator. Malformed accelerators are
    /// logged and left out.
    pub fn bindings(&self) -> Vec<(RemoteCommand, String)> {
        self.entries()
            .into_iter()
            .filter(|(_, accelerator)| !accelerator.is_empty())
            .filter_map(|(command, accelerator)| {
                if is_valid_accelerator(accelerator) {
                    Some((command, accelerator.to_string()))
                } else {
                    tracing::warn!(
                        "Ignoring malformed accelerator {:?} for {:?}",
                        accelerator,
                        command
                    );
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateConfig {
    pub last_url: Option<String>,
    pub last_video_id: Option<String>,
    pub last_playlist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialsConfig {
    #[serde(rename = "lastFMSessionKey")]
    pub last_fm_session_key: Option<String>,
    pub companion_server_auth_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeveloperConfig {
    pub enable_dev_tools: bool,
}
