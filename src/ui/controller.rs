// Shell Controller - the single context object of the shell core
//
// Owns every long-lived piece of shared state:
// - ConfigStore / EphemeralStore (settings and in-memory flags)
// - PlayerStateAggregator (canonical playback state)
// - BroadcastRouter (surface registry and messaging)
// - ShellHost (OS facilities)
// - TimerRegistry and the orchestrator task
//
// Collaborators receive what they need from here at init; nothing is read
// from ambient globals.

use crate::config::ConfigStore;
use crate::integrations::{IntegrationBinding, IntegrationContext};
use crate::metrics::Metrics;
use crate::models::{PlayerSnapshot, RemoteCommand, TrackState, VideoDetails};
use crate::orchestrator::{IntegrationOrchestrator, TimerRegistry};
use crate::services::navigation::{PLAYER_HOME_URL, is_player_url};
use crate::services::{NavigationDecision, NavigationGate, NavigationKind, PlayerStateAggregator};
use crate::state::EphemeralStore;
use crate::ui::host::ShellHost;
use crate::ui::router::{BroadcastRouter, InboundMessage, RouterError, SurfaceKind};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const CHANNEL_VIDEO_PROGRESS: &str = "ytmView:videoProgressChanged";
pub const CHANNEL_VIDEO_STATE: &str = "ytmView:videoStateChanged";
pub const CHANNEL_VIDEO_DATA: &str = "ytmView:videoDataChanged";
pub const CHANNEL_STORE_STATE: &str = "ytmView:storeStateChanged";
pub const CHANNEL_NAVIGATION_STATE: &str = "ytmView:navigationStateChanged";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoData {
    video_details: VideoDetails,
    #[serde(default)]
    playlist_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NavigationState {
    url: String,
}

/// Context object wiring the shell core together.
///
/// # Example
/// ```ignore
/// let config = ConfigStore::load(&settings.data_dir, &version)?;
/// let mut controller = ShellController::new(config, Arc::new(HeadlessHost));
/// let (registry, outputs) = default_registry();
/// controller.init(registry).await?;
///
/// // Surfaces may register before or after init
/// let (player_view, events) = ChannelSurface::new();
/// controller.router().register(SurfaceKind::PlayerView, Arc::new(player_view));
///
/// tokio::signal::ctrl_c().await?;
/// controller.teardown().await?;
/// ```
pub struct ShellController {
    config: ConfigStore,
    ephemeral: EphemeralStore,
    player: PlayerStateAggregator,
    router: BroadcastRouter,
    host: Arc<dyn ShellHost>,
    timers: TimerRegistry,
    metrics: Arc<Metrics>,

    /// Send `true` to stop the orchestrator loop
    cancel_tx: watch::Sender<bool>,

    orchestrator: Option<JoinHandle<IntegrationOrchestrator>>,
    taskbar_task: Option<JoinHandle<()>>,

    /// Last player page the hosted surface reported
    last_url: Arc<Mutex<Option<String>>>,
}

impl ShellController {
    pub fn new(config: ConfigStore, host: Arc<dyn ShellHost>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let (cancel_tx, _) = watch::channel(false);

        Self {
            config,
            ephemeral: EphemeralStore::new(),
            player: PlayerStateAggregator::new(Arc::clone(&metrics)),
            router: BroadcastRouter::new(Arc::clone(&metrics)),
            host,
            timers: TimerRegistry::new(),
            metrics,
            cancel_tx,
            orchestrator: None,
            taskbar_task: None,
            last_url: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn ephemeral(&self) -> &EphemeralStore {
        &self.ephemeral
    }

    pub fn player(&self) -> &PlayerStateAggregator {
        &self.player
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn context(&self) -> IntegrationContext {
        IntegrationContext {
            config: self.config.clone(),
            ephemeral: self.ephemeral.clone(),
            player: self.player.clone(),
            router: self.router.clone(),
            host: Arc::clone(&self.host),
        }
    }

    /// Enable the registry's integrations and start the orchestrator loop.
    pub async fn init(&mut self, registry: Vec<IntegrationBinding>) -> Result<()> {
        if self.orchestrator.is_some() {
            bail!("Shell controller already initialized");
        }

        // Subscribe before init so no batch between init and the loop is lost
        let config_rx = self.config.subscribe();
        let ephemeral_rx = self.ephemeral.subscribe();
        let surface_rx = self.router.registrations();

        let mut orchestrator = IntegrationOrchestrator::new(
            self.context(),
            registry,
            self.timers.clone(),
            Arc::clone(&self.metrics),
        );
        orchestrator.init().await;

        let shutdown_rx = self.cancel_tx.subscribe();
        self.orchestrator = Some(tokio::spawn(orchestrator.run(
            config_rx,
            ephemeral_rx,
            surface_rx,
            shutdown_rx,
        )));
        self.taskbar_task = Some(self.spawn_taskbar_progress());

        tracing::info!("Shell controller initialized");
        Ok(())
    }

    /// Push playback progress to the taskbar while the setting is on.
    fn spawn_taskbar_progress(&self) -> JoinHandle<()> {
        let mut state_rx = self.player.subscribe();
        let config = self.config.clone();
        let host = Arc::clone(&self.host);

        tokio::spawn(async move {
            loop {
                let state = match state_rx.recv().await {
                    Ok(state) => state,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };

                if !config.read(|c| c.playback.progress_in_taskbar) {
                    continue;
                }

                let progress = match state.track_state {
                    TrackState::Playing | TrackState::Paused | TrackState::Buffering => {
                        state.progress_fraction()
                    }
                    _ => None,
                };
                host.set_taskbar_progress(progress);
            }
        })
    }

    /// Authenticate and dispatch a message from the player page.
    pub fn handle_inbound(&self, message: &InboundMessage) -> Result<(), RouterError> {
        self.router.authenticate(SurfaceKind::PlayerView, message)?;

        match message.channel.as_str() {
            CHANNEL_VIDEO_PROGRESS => {
                self.player.update_progress(parse_payload(message)?);
            }
            CHANNEL_VIDEO_STATE => {
                self.player.update_state_code(parse_payload(message)?);
            }
            CHANNEL_VIDEO_DATA => {
                let data: VideoData = parse_payload(message)?;
                self.player.update_video(data.video_details, data.playlist_id);
            }
            CHANNEL_STORE_STATE => {
                self.player.update_snapshot(parse_payload::<PlayerSnapshot>(message)?);
            }
            CHANNEL_NAVIGATION_STATE => {
                let state: NavigationState = parse_payload(message)?;
                if is_player_url(&state.url) {
                    *self.last_url.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.url);
                }
            }
            other => return Err(RouterError::UnknownChannel(other.to_string())),
        }
        Ok(())
    }

    /// Classify a navigation leaving the hosted page and carry out the
    /// external-open side of the decision.
    pub fn check_navigation(&self, url: &str, kind: NavigationKind) -> NavigationDecision {
        let decision = NavigationGate::classify(url, kind);

        match &decision {
            NavigationDecision::Allow => self.metrics.record_navigation_allowed(),
            NavigationDecision::RewriteTo(target) => {
                tracing::info!("Rewriting {} to {}", url, target);
                self.metrics.record_navigation_rewritten();
            }
            NavigationDecision::DenyThenExternalOpen => {
                tracing::warn!("Blocked navigation to {}, opening externally", url);
                self.metrics.record_navigation_denied();
                self.host.open_external(url);
            }
            NavigationDecision::Deny => {
                tracing::warn!("Blocked navigation to {}", url);
                self.metrics.record_navigation_denied();
            }
        }
        decision
    }

    /// Forward a remote-control command to the player page.
    pub fn execute_remote(&self, command: &RemoteCommand) -> bool {
        self.router
            .send_serialized(SurfaceKind::PlayerView, "remoteControl:execute", command)
    }

    /// URL the player view should load at start.
    pub fn start_url(&self) -> String {
        self.config.read(|c| {
            c.state
                .last_url
                .as_ref()
                .filter(|url| c.playback.continue_where_you_left_off && is_player_url(url))
                .cloned()
                .unwrap_or_else(|| PLAYER_HOME_URL.to_string())
        })
    }

    /// Resolves only if the orchestrator loop ends on its own, which is fatal.
    pub async fn wait_for_orchestrator(&mut self) -> Result<()> {
        let Some(handle) = self.orchestrator.as_mut() else {
            return std::future::pending().await;
        };

        let result = handle.await;
        self.orchestrator = None;
        match result {
            Ok(_) => Err(anyhow!("Orchestrator loop exited unexpectedly")),
            Err(e) => Err(anyhow!(e).context("Orchestrator loop panicked")),
        }
    }

    /// Stop the loop, cancel timers, disable integrations and persist the
    /// last playback position.
    pub async fn teardown(mut self) -> Result<()> {
        tracing::info!("Shell controller shutting down");
        let _ = self.cancel_tx.send(true);

        let orchestrator = match self.orchestrator.take() {
            Some(handle) => match handle.await {
                Ok(orchestrator) => Some(orchestrator),
                Err(e) => {
                    tracing::error!("Orchestrator task failed: {}", e);
                    None
                }
            },
            None => None,
        };

        self.timers.cancel_all();
        if let Some(task) = self.taskbar_task.take() {
            task.abort();
        }

        if let Some(mut orchestrator) = orchestrator {
            orchestrator.disable_all().await;
        }

        self.flush_state().context("Failed to persist playback state")?;
        self.metrics.log_summary();
        Ok(())
    }

    fn flush_state(&self) -> Result<()> {
        let last_url = self.last_url.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let (video_id, playlist_id) = self.player.read(|s| {
            (
                s.video_details.as_ref().map(|d| d.video_id.clone()),
                s.playlist_id.clone(),
            )
        });

        self.config.update(|c| {
            if let Some(url) = last_url {
                c.state.last_url = Some(url);
            }
            if let Some(id) = video_id {
                c.state.last_video_id = Some(id);
                c.state.last_playlist_id = playlist_id;
            }
        })?;
        Ok(())
    }
}

fn parse_payload<T: DeserializeOwned>(message: &InboundMessage) -> Result<T, RouterError> {
    serde_json::from_value(message.payload.clone()).map_err(|e| RouterError::MalformedPayload {
        channel: message.channel.clone(),
        message: e.to_string(),
    })
}
