use super::watcher::PlayerWatcher;
use super::{Integration, IntegrationContext, IntegrationError};
use crate::models::PlayerState;
use async_trait::async_trait;

const NAME: &str = "notifications";

/// Shows a desktop notification when a new track starts playing.
#[derive(Default)]
pub struct Notifications {
    ctx: Option<IntegrationContext>,
    watcher: PlayerWatcher,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Remembers the last announced video so repeated `Playing` broadcasts for
/// the same track stay silent.
#[derive(Debug, Default)]
pub(crate) struct SongChangeDetector {
    last_video_id: Option<String>,
}

impl SongChangeDetector {
    /// Returns `(title, body)` when `state` is a new displayable track.
    pub fn observe(&mut self, state: &PlayerState) -> Option<(String, String)> {
        if state.ad_playing {
            return None;
        }
        let details = state.now_playing()?;
        if self.last_video_id.as_deref() == Some(details.video_id.as_str()) {
            return None;
        }
        self.last_video_id = Some(details.video_id.clone());

        let body = match &state.album {
            Some(album) if !album.text.is_empty() => format!("{} • {}", details.author, album.text),
            _ => details.author.clone(),
        };
        Some((details.title.clone(), body))
    }
}

#[async_trait]
impl Integration for Notifications {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.ctx = Some(ctx);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;

        let host = ctx.host.clone();
        let mut detector = SongChangeDetector::default();
        self.watcher.start(NAME, &ctx.player, move |state| {
            if let Some((title, body)) = detector.observe(state) {
                host.show_notification(&title, &body);
            }
        });
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        self.watcher.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlbumDetails, TrackState, VideoDetails};

    fn playing(id: &str) -> PlayerState {
        PlayerState {
            track_state: TrackState::Playing,
            video_details: Some(VideoDetails {
                video_id: id.to_string(),
                title: format!("Title {}", id),
                author: "Artist".to_string(),
                length_seconds: 200.0,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_notification_per_video() {
        let mut detector = SongChangeDetector::default();

        assert_eq!(
            detector.observe(&playing("A")),
            Some(("Title A".to_string(), "Artist".to_string()))
        );
        assert_eq!(detector.observe(&playing("A")), None);
        assert!(detector.observe(&playing("B")).is_some());
    }

    #[test]
    fn test_playing_without_details_is_ignored() {
        let mut detector = SongChangeDetector::default();
        let state = PlayerState {
            track_state: TrackState::Playing,
            ..Default::default()
        };
        assert_eq!(detector.observe(&state), None);
    }

    #[test]
    fn test_ads_and_paused_are_ignored() {
        let mut detector = SongChangeDetector::default();

        let mut ad = playing("A");
        ad.ad_playing = true;
        assert_eq!(detector.observe(&ad), None);

        let mut paused = playing("A");
        paused.track_state = TrackState::Paused;
        assert_eq!(detector.observe(&paused), None);
    }

    #[test]
    fn test_album_in_body() {
        let mut detector = SongChangeDetector::default();
        let mut state = playing("A");
        state.album = Some(AlbumDetails {
            id: None,
            text: "Record".to_string(),
        });

        let (_, body) = detector.observe(&state).unwrap();
        assert_eq!(body, "Artist • Record");
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let (ctx, _events) = crate::integrations::testing::context(Default::default());
        let mut integration = Notifications::new();
        integration.provide(ctx);

        integration.enable().await.unwrap();
        integration.enable().await.unwrap();
        assert!(integration.watcher.is_running());

        integration.disable().await.unwrap();
        integration.disable().await.unwrap();
        assert!(!integration.watcher.is_running());
    }
}
