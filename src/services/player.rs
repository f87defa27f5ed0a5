use crate::metrics::Metrics;
use crate::models::{PlayerSnapshot, PlayerState, TrackState, VideoDetails};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Merges the four page update channels into one canonical [`PlayerState`].
///
/// The channels arrive unordered: a state code may precede the metadata of the
/// track it refers to, and vice versa. The aggregator never gates on that; it
/// stores whatever it receives. Consumers must null-check `video_details` (or
/// use [`PlayerState::now_playing`]) before treating `Playing` as a
/// displayable event.
///
/// Every update broadcasts the resulting state, even when it equals the
/// previous one. Subscribers must not infer "something changed" from a
/// notification.
pub struct PlayerStateAggregator {
    state: Arc<RwLock<PlayerState>>,

    state_tx: broadcast::Sender<PlayerState>,

    metrics: Arc<Metrics>,
}

impl PlayerStateAggregator {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(PlayerState::default())),
            state_tx,
            metrics,
        }
    }

    /// Channel 1: playback position in seconds.
    pub fn update_progress(&self, seconds: f64) -> PlayerState {
        self.update(|state| {
            state.video_progress_seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        })
    }

    /// Channel 2: raw page state code. Unknown codes are kept as
    /// [`TrackState::Unknown`].
    pub fn update_state_code(&self, code: i64) -> PlayerState {
        let track_state = TrackState::from_code(code);
        if let TrackState::Unknown(raw) = track_state {
            tracing::warn!("Unrecognized player state code {}", raw);
        }
        self.update(|state| {
            state.track_state = track_state;
        })
    }

    /// Channel 3: metadata of the loaded video and its list context.
    pub fn update_video(&self, details: VideoDetails, playlist_id: Option<String>) -> PlayerState {
        self.update(|state| {
            state.video_details = Some(details);
            state.playlist_id = playlist_id;
        })
    }

    /// Channel 4: bulk store snapshot.
    pub fn update_snapshot(&self, snapshot: PlayerSnapshot) -> PlayerState {
        self.update(|state| {
            state.queue = snapshot.queue;
            state.thumbnails = snapshot.thumbnails;
            state.album = snapshot.album;
            state.like_status = snapshot.like_status;
            state.volume = snapshot.volume.min(100);
            state.muted = snapshot.muted;
            state.ad_playing = snapshot.ad_playing;
        })
    }

    pub fn snapshot(&self) -> PlayerState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PlayerState) -> R,
    {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    fn update<F>(&self, update_fn: F) -> PlayerState
    where
        F: FnOnce(&mut PlayerState),
    {
        let updated = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            update_fn(&mut state);
            state.clone()
        };

        self.metrics.record_player_update();
        tracing::trace!("Player state updated: {:?}", updated.track_state);

        if self.state_tx.send(updated.clone()).is_err() {
            tracing::trace!("No player state subscribers");
        }
        updated
    }
}

impl Clone for PlayerStateAggregator {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
