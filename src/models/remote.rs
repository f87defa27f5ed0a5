use serde::{Deserialize, Serialize};

/// Remote-control commands accepted from OS shortcuts and the companion server
/// and executed by the player surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum RemoteCommand {
    PlayPause,
    Next,
    Previous,
    ToggleLike,
    ToggleDislike,
    VolumeUp,
    VolumeDown,
    #[serde(rename_all = "camelCase")]
    Navigate {
        video_id: String,
        playlist_id: Option<String>,
    },
}
