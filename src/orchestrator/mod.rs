//! Reactive lifecycle driver for integrations.
//!
//! The orchestrator consumes config and ephemeral change batches one at a
//! time. Each config batch is diffed against the last snapshot the
//! orchestrator acted on, so a transition is applied once even when batches
//! are dropped and resynchronized. From that diff it drives
//! `enable`/`disable` on boolean transitions, cycles integrations whose
//! restart-coupled sub-settings changed, and applies the host-level side
//! effects (zoom, login item, shortcuts, taskbar). For ephemeral batches it
//! maintains the TTL timers of time-limited flags.
//!
//! Batches are awaited to completion before the next is received, so a
//! restart cycle can never overlap another transition of the same
//! integration.

pub mod timers;

use crate::config::ConfigChange;
use crate::integrations::{IntegrationBinding, IntegrationContext};
use crate::metrics::Metrics;
use crate::models::ConfigSnapshot;
use crate::state::{self, AUTH_WINDOW_TTL, COMPANION_AUTH_WINDOW_KEY, EphemeralChange};
use crate::ui::SurfaceKind;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::watch;

pub use timers::TimerRegistry;

pub struct IntegrationOrchestrator {
    ctx: IntegrationContext,
    bindings: Vec<IntegrationBinding>,
    timers: TimerRegistry,
    /// Ephemeral flags that clear themselves after a delay.
    ttl_flags: HashMap<String, Duration>,
    /// Last snapshot acted on. Every batch is diffed against it.
    last_config: Arc<ConfigSnapshot>,
    metrics: Arc<Metrics>,
}

impl IntegrationOrchestrator {
    pub fn new(
        ctx: IntegrationContext,
        bindings: Vec<IntegrationBinding>,
        timers: TimerRegistry,
        metrics: Arc<Metrics>,
    ) -> Self {
        let last_config = ctx.config.snapshot();
        let mut ttl_flags = HashMap::new();
        ttl_flags.insert(COMPANION_AUTH_WINDOW_KEY.to_string(), AUTH_WINDOW_TTL);

        Self {
            ctx,
            bindings,
            timers,
            ttl_flags,
            last_config,
            metrics,
        }
    }

    /// Register an additional self-clearing ephemeral flag.
    pub fn with_ttl_flag(mut self, key: &str, ttl: Duration) -> Self {
        self.ttl_flags.insert(key.to_string(), ttl);
        self
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Hand collaborators to every integration, enable those whose flag is
    /// already on and apply the host side effects for the current snapshot.
    pub async fn init(&mut self) {
        let snapshot = self.ctx.config.snapshot();

        for binding in &mut self.bindings {
            binding.integration.provide(self.ctx.clone());
        }

        for binding in &mut self.bindings {
            if (binding.is_enabled)(&snapshot) {
                enable(binding, &self.metrics).await;
            }
        }

        self.apply_host_effects(&snapshot, None);
        self.last_config = snapshot;
        tracing::info!("Orchestrator initialized with {} integrations", self.bindings.len());
    }

    /// Process one config change batch.
    ///
    /// `change.new` is compared with the last snapshot acted on rather than
    /// with `change.old`; the two only differ after batches were skipped.
    pub async fn handle_config_change(&mut self, change: &ConfigChange) {
        self.metrics.record_config_batch();
        let old_snapshot = Arc::clone(&self.last_config);
        let (new, old) = (&*change.new, &*old_snapshot);

        for binding in &mut self.bindings {
            let was_enabled = (binding.is_enabled)(old);
            let is_enabled = (binding.is_enabled)(new);

            match (was_enabled, is_enabled) {
                (false, true) => enable(binding, &self.metrics).await,
                (true, false) => {
                    disable(binding, &self.metrics).await;
                    for flag in binding.owned_flags {
                        self.timers.cancel(flag);
                        if self.ctx.ephemeral.get_flag(flag) {
                            self.ctx.ephemeral.set(flag, Value::Bool(false));
                        }
                    }
                }
                (true, true) if (binding.requires_restart)(new, old) => {
                    tracing::info!("Restarting {}", binding.name);
                    self.metrics.record_integration_restart();
                    disable(binding, &self.metrics).await;
                    enable(binding, &self.metrics).await;
                }
                _ => {}
            }
        }

        self.apply_host_effects(new, Some(old));
        self.last_config = Arc::clone(&change.new);

        self.broadcast_pair("settings:stateChanged", new, old);
    }

    /// Resynchronize after config batches were dropped: discard whatever is
    /// still queued, then act once on the store's current snapshot.
    async fn resync_config(&mut self, config_rx: &mut broadcast::Receiver<ConfigChange>) {
        let mut discarded = 0usize;
        loop {
            match config_rx.try_recv() {
                Ok(_) => discarded += 1,
                Err(TryRecvError::Lagged(skipped)) => discarded += skipped as usize,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        tracing::debug!("Discarded {} queued config changes", discarded);

        let change = ConfigChange {
            new: self.ctx.config.snapshot(),
            old: Arc::clone(&self.last_config),
        };
        self.handle_config_change(&change).await;
    }

    /// Let enabled integrations re-apply page state to a newly registered surface.
    pub async fn handle_surface_registered(&mut self, kind: SurfaceKind) {
        for binding in &mut self.bindings {
            if !(binding.is_enabled)(&self.last_config) {
                continue;
            }
            if let Err(e) = binding.integration.surface_ready(kind).await {
                self.metrics.record_integration_failure();
                tracing::error!("{} failed to apply to new {:?} surface: {}", binding.name, kind, e);
            }
        }
    }

    /// Fan a `{ new, old }` pair out to every surface.
    fn broadcast_pair<T: Serialize>(&self, channel: &str, new: &T, old: &T) {
        #[derive(Serialize)]
        struct Pair<'a, T> {
            new: &'a T,
            old: &'a T,
        }

        match serde_json::to_value(Pair { new, old }) {
            Ok(payload) => {
                self.ctx.router.broadcast(channel, payload);
            }
            Err(e) => tracing::error!("Failed to serialize {} for broadcast: {}", channel, e),
        }
    }

    /// Process one ephemeral change batch.
    pub fn handle_ephemeral_change(&mut self, change: &EphemeralChange) {
        self.metrics.record_ephemeral_batch();

        for (key, ttl) in &self.ttl_flags {
            // The store has the final word: a queued batch may predate an expiry.
            let is_set = state::flag(&change.new, key) && self.ctx.ephemeral.get_flag(key);

            if is_set {
                let ephemeral = self.ctx.ephemeral.clone();
                let expired_key = key.clone();
                self.timers.start(key, *ttl, move || {
                    ephemeral.set(&expired_key, Value::Bool(false));
                });
            } else {
                self.timers.cancel(key);
            }
        }

        self.broadcast_pair("memoryStore:stateChanged", &*change.new, &*change.old);
    }

    fn apply_host_effects(&self, new: &ConfigSnapshot, old: Option<&ConfigSnapshot>) {
        let host = &self.ctx.host;

        if old.is_none_or(|o| o.appearance.zoom != new.appearance.zoom) {
            host.set_zoom_factor(new.appearance.zoom_factor());
        }

        if old.is_none_or(|o| {
            o.general.start_on_boot != new.general.start_on_boot
                || o.general.start_minimized != new.general.start_minimized
        }) {
            host.set_login_item(new.general.start_on_boot, new.general.start_minimized);
        }

        // One registration per batch, however many of the bindings changed
        if old.is_none_or(|o| o.shortcuts != new.shortcuts) {
            if let Err(e) = host.register_shortcuts(&new.shortcuts.bindings()) {
                tracing::error!("Failed to register shortcuts: {:#}", e);
            }
        }

        if old.is_some_and(|o| o.playback.progress_in_taskbar && !new.playback.progress_in_taskbar) {
            host.set_taskbar_progress(None);
        }
    }

    /// Drain change batches until `shutdown_rx` fires or both sources close.
    ///
    /// Receivers must be subscribed before [`init`](Self::init) so no batch
    /// is lost in between. Within each source batches are handled in arrival
    /// order; when several have a batch ready, config goes first and surface
    /// registrations last.
    pub async fn run(
        mut self,
        mut config_rx: broadcast::Receiver<ConfigChange>,
        mut ephemeral_rx: broadcast::Receiver<EphemeralChange>,
        mut surface_rx: broadcast::Receiver<SurfaceKind>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        tracing::info!("Orchestrator loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                change = config_rx.recv() => match change {
                    Ok(change) => self.handle_config_change(&change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Orchestrator missed {} config changes, resynchronizing", skipped);
                        self.resync_config(&mut config_rx).await;
                    }
                    Err(RecvError::Closed) => break,
                },

                change = ephemeral_rx.recv() => match change {
                    Ok(change) => self.handle_ephemeral_change(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Orchestrator missed {} ephemeral changes, resynchronizing", skipped);
                        let current = self.ctx.ephemeral.snapshot();
                        let change = EphemeralChange {
                            new: Arc::clone(&current),
                            old: current,
                        };
                        self.handle_ephemeral_change(&change);
                    }
                    Err(RecvError::Closed) => break,
                },

                kind = surface_rx.recv() => match kind {
                    Ok(kind) => self.handle_surface_registered(kind).await,
                    Err(RecvError::Lagged(_)) => {
                        for kind in SurfaceKind::ALL {
                            if self.ctx.router.surface_id(kind).is_some() {
                                self.handle_surface_registered(kind).await;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::info!("Orchestrator loop stopped");
        self
    }

    /// Disable every integration whose flag is on. Used at teardown.
    pub async fn disable_all(&mut self) {
        let snapshot = self.ctx.config.snapshot();
        for binding in &mut self.bindings {
            if (binding.is_enabled)(&snapshot) {
                disable(binding, &self.metrics).await;
            }
        }
    }
}

async fn enable(binding: &mut IntegrationBinding, metrics: &Metrics) {
    match binding.integration.enable().await {
        Ok(()) => tracing::info!("Enabled {}", binding.name),
        Err(e) => {
            metrics.record_integration_failure();
            tracing::error!("Failed to enable {}: {}", binding.name, e);
        }
    }
}

async fn disable(binding: &mut IntegrationBinding, metrics: &Metrics) {
    match binding.integration.disable().await {
        Ok(()) => tracing::info!("Disabled {}", binding.name),
        Err(e) => {
            metrics.record_integration_failure();
            tracing::error!("Failed to disable {}: {}", binding.name, e);
        }
    }
}
