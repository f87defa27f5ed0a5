use super::watcher::PlayerWatcher;
use super::{Integration, IntegrationContext, IntegrationError};
use crate::models::{PlayerState, TrackState};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

const NAME: &str = "discord-presence";

/// Rich presence activity derived from the canonical player state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub details: String,
    pub state: String,
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub paused: bool,
    /// Unix seconds; only set while playing a track with a known length.
    pub start_timestamp: Option<u64>,
    pub end_timestamp: Option<u64>,
    pub video_id: String,
}

impl Activity {
    /// `None` when there is nothing to show.
    pub fn from_state(state: &PlayerState, now_unix: u64) -> Option<Self> {
        let details = state.video_details.as_ref()?;
        let paused = match state.track_state {
            TrackState::Playing | TrackState::Buffering => false,
            TrackState::Paused => true,
            _ => return None,
        };

        let (start_timestamp, end_timestamp) = if paused || details.is_live || details.length_seconds <= 0.0 {
            (None, None)
        } else {
            let start = now_unix.saturating_sub(state.video_progress_seconds as u64);
            (Some(start), Some(start + details.length_seconds as u64))
        };

        let thumbnail = details
            .thumbnails
            .iter()
            .chain(state.thumbnails.iter())
            .max_by_key(|t| t.width)
            .map(|t| t.url.clone());

        Some(Self {
            details: details.title.clone(),
            state: details.author.clone(),
            large_image: thumbnail,
            large_text: state.album.as_ref().map(|a| a.text.clone()),
            paused,
            start_timestamp,
            end_timestamp,
            video_id: details.video_id.clone(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Publishes the current [`Activity`] for a presence client.
///
/// The IPC transport to the chat client lives outside the core; it subscribes
/// with [`DiscordPresence::activity`], or through the receiver
/// [`default_registry`](super::default_registry) returns.
pub struct DiscordPresence {
    ctx: Option<IntegrationContext>,
    watcher: PlayerWatcher,
    activity_tx: watch::Sender<Option<Activity>>,
}

impl DiscordPresence {
    pub fn new() -> Self {
        let (activity_tx, _) = watch::channel(None);
        Self {
            ctx: None,
            watcher: PlayerWatcher::default(),
            activity_tx,
        }
    }

    pub fn activity(&self) -> watch::Receiver<Option<Activity>> {
        self.activity_tx.subscribe()
    }
}

impl Default for DiscordPresence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Integration for DiscordPresence {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.ctx = Some(ctx);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;

        let activity_tx = self.activity_tx.clone();
        activity_tx.send_replace(ctx.player.read(|s| Activity::from_state(s, unix_now())));

        self.watcher.start(NAME, &ctx.player, move |state| {
            let activity = Activity::from_state(state, unix_now());
            activity_tx.send_if_modified(|current| {
                if *current == activity {
                    return false;
                }
                tracing::debug!("Presence activity: {:?}", activity.as_ref().map(|a| &a.details));
                *current = activity;
                true
            });
        });
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        self.watcher.stop();
        self.activity_tx.send_replace(None);
        Ok(())
    }
}
