// Performance metrics module
//
// Provides lightweight counters for the orchestration core

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters.
///
/// Uses atomic operations for thread-safe tracking without locks. Shared as
/// `Arc<Metrics>` between the stores, the orchestrator and the router, and
/// logged on teardown.
#[derive(Debug)]
pub struct Metrics {
    /// Config change batches processed by the orchestrator
    pub config_batches: AtomicU64,

    /// Ephemeral change batches processed by the orchestrator
    pub ephemeral_batches: AtomicU64,

    /// Integration enable/disable calls that failed
    pub integration_failures: AtomicU64,

    /// Disable-then-enable restart cycles
    pub integration_restarts: AtomicU64,

    /// Canonical player state updates
    pub player_updates: AtomicU64,

    /// Messages delivered to a live surface
    pub surface_messages_sent: AtomicU64,

    /// Messages skipped because the surface did not exist
    pub surface_messages_skipped: AtomicU64,

    /// Messages dropped because a surface queue was full or closed
    pub surface_messages_dropped: AtomicU64,

    /// Inbound messages rejected by the sender check
    pub inbound_rejected: AtomicU64,

    pub navigation_allowed: AtomicU64,
    pub navigation_denied: AtomicU64,
    pub navigation_rewritten: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            config_batches: AtomicU64::new(0),
            ephemeral_batches: AtomicU64::new(0),
            integration_failures: AtomicU64::new(0),
            integration_restarts: AtomicU64::new(0),
            player_updates: AtomicU64::new(0),
            surface_messages_sent: AtomicU64::new(0),
            surface_messages_skipped: AtomicU64::new(0),
            surface_messages_dropped: AtomicU64::new(0),
            inbound_rejected: AtomicU64::new(0),
            navigation_allowed: AtomicU64::new(0),
            navigation_denied: AtomicU64::new(0),
            navigation_rewritten: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_config_batch(&self) {
        self.config_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ephemeral_batch(&self) {
        self.ephemeral_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_integration_failure(&self) {
        self.integration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_integration_restart(&self) {
        self.integration_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_player_update(&self) {
        self.player_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_surface_sent(&self) {
        self.surface_messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_surface_skipped(&self) {
        self.surface_messages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_surface_dropped(&self) {
        self.surface_messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inbound_rejected(&self) {
        self.inbound_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation_allowed(&self) {
        self.navigation_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation_denied(&self) {
        self.navigation_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation_rewritten(&self) {
        self.navigation_rewritten.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Shell Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Change batches: {} config, {} ephemeral",
            self.config_batches.load(Ordering::Relaxed),
            self.ephemeral_batches.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Integrations: {} restarts, {} failures",
            self.integration_restarts.load(Ordering::Relaxed),
            self.integration_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Player updates: {}",
            self.player_updates.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Surface messages: {} sent, {} skipped, {} dropped, {} inbound rejected",
            self.surface_messages_sent.load(Ordering::Relaxed),
            self.surface_messages_skipped.load(Ordering::Relaxed),
            self.surface_messages_dropped.load(Ordering::Relaxed),
            self.inbound_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Navigation: {} allowed, {} denied, {} rewritten",
            self.navigation_allowed.load(Ordering::Relaxed),
            self.navigation_denied.load(Ordering::Relaxed),
            self.navigation_rewritten.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
