use super::watcher::PlayerWatcher;
use super::{Integration, IntegrationContext, IntegrationError};
use crate::models::PlayerState;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

const NAME: &str = "last-fm";

/// Tracks this short or shorter are never scrobbled.
pub const MIN_SCROBBLE_LENGTH_SECS: f64 = 30.0;

/// Play time after which a track is always scrobbled, even if less than half
/// of it has played.
pub const MAX_SCROBBLE_THRESHOLD_SECS: f64 = 240.0;

/// A completed listen, ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scrobble {
    pub video_id: String,
    pub track: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: u64,
    /// Unix seconds when playback of the track started.
    pub timestamp: u64,
}

/// Decides when the current track has been listened to long enough.
#[derive(Debug, Default)]
pub struct ScrobbleTracker {
    current: Option<String>,
    scrobbled: bool,
}

impl ScrobbleTracker {
    /// Seconds of playback after which a track of `length` qualifies, or
    /// `None` if it never does.
    pub fn threshold(length_seconds: f64) -> Option<f64> {
        (length_seconds > MIN_SCROBBLE_LENGTH_SECS)
            .then(|| (length_seconds / 2.0).min(MAX_SCROBBLE_THRESHOLD_SECS))
    }

    /// Feed a canonical update; returns a scrobble at most once per track.
    pub fn observe(&mut self, state: &PlayerState, now_unix: u64) -> Option<Scrobble> {
        if state.ad_playing {
            return None;
        }
        let details = state.now_playing()?;

        if self.current.as_deref() != Some(details.video_id.as_str()) {
            self.current = Some(details.video_id.clone());
            self.scrobbled = false;
        }
        if self.scrobbled || details.is_live {
            return None;
        }

        let threshold = Self::threshold(details.length_seconds)?;
        if state.video_progress_seconds < threshold {
            return None;
        }

        self.scrobbled = true;
        Some(Scrobble {
            video_id: details.video_id.clone(),
            track: details.title.clone(),
            artist: details.author.clone(),
            album: state.album.as_ref().map(|a| a.text.clone()),
            duration_secs: details.length_seconds as u64,
            timestamp: now_unix.saturating_sub(state.video_progress_seconds as u64),
        })
    }
}

/// Scrobbles finished listens.
///
/// Submission to the remote API is done by a subscriber of
/// [`LastFm::subscribe`], which [`default_registry`](super::default_registry)
/// hands out as [`IntegrationOutputs::scrobbles`](super::IntegrationOutputs).
/// This integration only decides what to submit. Scrobbles published while
/// nobody subscribes are dropped.
pub struct LastFm {
    ctx: Option<IntegrationContext>,
    watcher: PlayerWatcher,
    tracker: Arc<Mutex<ScrobbleTracker>>,
    scrobble_tx: broadcast::Sender<Scrobble>,
}

impl LastFm {
    pub fn new() -> Self {
        let (scrobble_tx, _) = broadcast::channel(100);
        Self {
            ctx: None,
            watcher: PlayerWatcher::default(),
            tracker: Arc::new(Mutex::new(ScrobbleTracker::default())),
            scrobble_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Scrobble> {
        self.scrobble_tx.subscribe()
    }
}

impl Default for LastFm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Integration for LastFm {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.ctx = Some(ctx);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;

        if ctx.config.read(|c| c.credentials.last_fm_session_key.is_none()) {
            tracing::warn!("Last.fm enabled without a session key - scrobbles are published but cannot be submitted until signed in");
        }

        let tracker = Arc::clone(&self.tracker);
        let scrobble_tx = self.scrobble_tx.clone();
        self.watcher.start(NAME, &ctx.player, move |state| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let scrobble = tracker
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .observe(state, now);

            if let Some(scrobble) = scrobble {
                tracing::info!("Scrobbling {} - {}", scrobble.artist, scrobble.track);
                if scrobble_tx.send(scrobble).is_err() {
                    tracing::debug!("No scrobble submitter attached");
                }
            }
        });
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        self.watcher.stop();
        Ok(())
    }
}
