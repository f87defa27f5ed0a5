use crate::metrics::Metrics;
use crate::ui::bridge::{Surface, SurfaceEvent, SurfaceId};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// The surfaces the shell knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    MainWindow,
    SettingsWindow,
    /// The embedded view hosting the remote player page.
    PlayerView,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 3] = [
        SurfaceKind::MainWindow,
        SurfaceKind::SettingsWindow,
        SurfaceKind::PlayerView,
    ];
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("Rejected {channel} from surface {sender}: not the registered {expected:?}")]
    SenderMismatch {
        channel: String,
        sender: SurfaceId,
        expected: SurfaceKind,
    },

    #[error("No live {0:?} surface")]
    SurfaceMissing(SurfaceKind),

    #[error("Malformed payload on {channel}: {message}")]
    MalformedPayload { channel: String, message: String },

    #[error("Unknown inbound channel {0}")]
    UnknownChannel(String),
}

/// A message received from a surface. `sender` is the identity the transport
/// observed, not something the page can choose.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub sender: SurfaceId,
    pub channel: String,
    pub payload: Value,
}

/// Fans events out to the registered surfaces.
///
/// Holds no state beyond the registry. Sends are fire-and-forget: no
/// acknowledgement, no retry. A surface that is not registered or no longer
/// alive at the moment of the send is skipped.
pub struct BroadcastRouter {
    surfaces: Arc<RwLock<HashMap<SurfaceKind, Arc<dyn Surface>>>>,
    registered_tx: broadcast::Sender<SurfaceKind>,
    metrics: Arc<Metrics>,
}

impl BroadcastRouter {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        let (registered_tx, _) = broadcast::channel(16);
        Self {
            surfaces: Arc::new(RwLock::new(HashMap::new())),
            registered_tx,
            metrics,
        }
    }

    /// Register (or replace) the surface for `kind`.
    ///
    /// Subscribers of [`registrations`](Self::registrations) are told after
    /// the surface is reachable.
    pub fn register(&self, kind: SurfaceKind, surface: Arc<dyn Surface>) {
        tracing::info!("Registered {:?} surface {}", kind, surface.id());
        {
            let mut surfaces = self.surfaces.write().unwrap_or_else(|e| e.into_inner());
            surfaces.insert(kind, surface);
        }
        // No subscribers is fine
        let _ = self.registered_tx.send(kind);
    }

    /// Kinds of surfaces registered from now on.
    pub fn registrations(&self) -> broadcast::Receiver<SurfaceKind> {
        self.registered_tx.subscribe()
    }

    pub fn unregister(&self, kind: SurfaceKind) {
        let mut surfaces = self.surfaces.write().unwrap_or_else(|e| e.into_inner());
        if let Some(surface) = surfaces.remove(&kind) {
            tracing::info!("Unregistered {:?} surface {}", kind, surface.id());
        }
    }

    fn live_surface(&self, kind: SurfaceKind) -> Option<Arc<dyn Surface>> {
        let surfaces = self.surfaces.read().unwrap_or_else(|e| e.into_inner());
        surfaces.get(&kind).filter(|s| s.is_alive()).cloned()
    }

    /// Id of the live surface for `kind`, if any.
    pub fn surface_id(&self, kind: SurfaceKind) -> Option<SurfaceId> {
        self.live_surface(kind).map(|s| s.id())
    }

    /// Send to one surface. Returns `true` if the event was queued.
    pub fn send(&self, kind: SurfaceKind, channel: &str, payload: Value) -> bool {
        let Some(surface) = self.live_surface(kind) else {
            tracing::debug!("Skipping {} - no live {:?} surface", channel, kind);
            self.metrics.record_surface_skipped();
            return false;
        };

        let delivered = surface.deliver(SurfaceEvent {
            channel: channel.to_string(),
            payload,
        });
        if delivered {
            tracing::debug!("Sent {} to {:?}", channel, kind);
            self.metrics.record_surface_sent();
        } else {
            self.metrics.record_surface_dropped();
        }
        delivered
    }

    /// Serialize `payload` and send it to one surface.
    pub fn send_serialized<T: Serialize>(&self, kind: SurfaceKind, channel: &str, payload: &T) -> bool {
        match serde_json::to_value(payload) {
            Ok(value) => self.send(kind, channel, value),
            Err(e) => {
                tracing::error!("Failed to serialize {} payload: {}", channel, e);
                false
            }
        }
    }

    /// Send to every surface. Returns the number of surfaces reached.
    pub fn broadcast(&self, channel: &str, payload: Value) -> usize {
        SurfaceKind::ALL
            .into_iter()
            .filter(|kind| self.send(*kind, channel, payload.clone()))
            .count()
    }

    /// Verify that `message` was sent by the surface registered as `expected`.
    ///
    /// This is the trust boundary between the remote page and the process:
    /// every inbound handler must pass it before acting on the payload.
    pub fn authenticate(&self, expected: SurfaceKind, message: &InboundMessage) -> Result<(), RouterError> {
        let registered = self
            .surface_id(expected)
            .ok_or(RouterError::SurfaceMissing(expected))?;

        if registered != message.sender {
            self.metrics.record_inbound_rejected();
            tracing::warn!(
                "Rejected {} from surface {} (expected {:?} {})",
                message.channel,
                message.sender,
                expected,
                registered
            );
            return Err(RouterError::SenderMismatch {
                channel: message.channel.clone(),
                sender: message.sender,
                expected,
            });
        }
        Ok(())
    }
}

impl Clone for BroadcastRouter {
    fn clone(&self) -> Self {
        Self {
            surfaces: Arc::clone(&self.surfaces),
            registered_tx: self.registered_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
