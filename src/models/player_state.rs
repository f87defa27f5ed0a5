use serde::{Deserialize, Deserializer, Serialize};

/// Playback state of the current track as reported by the page.
///
/// Raw codes outside the known set are kept as [`TrackState::Unknown`] with the
/// original code, rather than being dropped or folded into a neighbouring state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackState {
    #[default]
    Unstarted,
    Buffering,
    Playing,
    Paused,
    Cued,
    Unknown(i64),
}

impl TrackState {
    /// Map a raw page code (`-1, 1, 2, 3, 5`) to a state.
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 => Self::Unstarted,
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Buffering,
            5 => Self::Cued,
            other => Self::Unknown(other),
        }
    }

    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LikeStatus {
    #[default]
    Unknown,
    Dislike,
    Indifferent,
    Like,
}

impl<'de> Deserialize<'de> for LikeStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref() {
            Some("LIKE") => Self::Like,
            Some("DISLIKE") => Self::Dislike,
            Some("INDIFFERENT") => Self::Indifferent,
            _ => Self::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub channel_id: Option<String>,
    /// The page reports this as a decimal string; numbers are accepted too.
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    pub length_seconds: f64,
    pub is_live: bool,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlbumDetails {
    pub id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueItem {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub duration: String,
    pub selected: bool,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerQueue {
    pub autoplay: bool,
    pub items: Vec<QueueItem>,
    pub automix_items: Vec<QueueItem>,
    pub is_generating: bool,
    pub is_infinite: bool,
    pub repeat_mode: i32,
}

/// Bulk store snapshot pushed by the page (the fourth update channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub queue: Option<PlayerQueue>,
    pub thumbnails: Vec<Thumbnail>,
    pub album: Option<AlbumDetails>,
    pub like_status: LikeStatus,
    pub volume: u8,
    pub muted: bool,
    pub ad_playing: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            queue: None,
            thumbnails: Vec::new(),
            album: None,
            like_status: LikeStatus::Unknown,
            volume: 100,
            muted: false,
            ad_playing: false,
        }
    }
}

/// Canonical merged playback state.
///
/// Written only by [`PlayerStateAggregator`](crate::services::PlayerStateAggregator).
/// A `Playing` state may be observed before `video_details` is known; consumers
/// that want a displayable "now playing" event should go through
/// [`now_playing`](Self::now_playing), which performs that null check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub track_state: TrackState,
    pub video_details: Option<VideoDetails>,
    pub playlist_id: Option<String>,
    pub video_progress_seconds: f64,
    pub queue: Option<PlayerQueue>,
    pub thumbnails: Vec<Thumbnail>,
    pub album: Option<AlbumDetails>,
    pub like_status: LikeStatus,
    pub volume: u8,
    pub muted: bool,
    pub ad_playing: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            track_state: TrackState::Unstarted,
            video_details: None,
            playlist_id: None,
            video_progress_seconds: 0.0,
            queue: None,
            thumbnails: Vec::new(),
            album: None,
            like_status: LikeStatus::Unknown,
            volume: 100,
            muted: false,
            ad_playing: false,
        }
    }
}

impl PlayerState {
    /// Details of the playing video, only when the state is `Playing` and the
    /// metadata has already arrived.
    pub fn now_playing(&self) -> Option<&VideoDetails> {
        if self.track_state.is_playing() {
            self.video_details.as_ref()
        } else {
            None
        }
    }

    /// Playback position as a fraction of the track length, when both are known.
    pub fn progress_fraction(&self) -> Option<f64> {
        let details = self.video_details.as_ref()?;
        if details.is_live || details.length_seconds <= 0.0 {
            return None;
        }
        Some((self.video_progress_seconds / details.length_seconds).clamp(0.0, 1.0))
    }
}

fn seconds_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) if s.trim().is_empty() => Ok(0.0),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
