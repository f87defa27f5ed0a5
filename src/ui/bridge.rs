// Surface bridge - delivery of events from the core to live UI surfaces
//
// A surface is anything that renders state for the user: the main window, the
// settings window, the embedded player view. The core never calls into a
// surface directly; it queues events on a bounded channel that the surface's
// own event loop drains. Delivery is fire-and-forget: a full queue drops the
// event instead of applying backpressure to the core.

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Queue depth of a [`ChannelSurface`]. Bounded to prevent unbounded memory
/// growth if a surface lags.
pub const SURFACE_QUEUE_CAPACITY: usize = 100;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a surface instance.
///
/// Inbound messages carry the id of the surface that sent them; the router
/// compares it against the registered surface before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn next() -> Self {
        Self(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named event for a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEvent {
    pub channel: String,
    pub payload: Value,
}

/// A live UI surface that can receive events.
pub trait Surface: Send + Sync {
    fn id(&self) -> SurfaceId;

    /// Whether the surface still exists. Checked immediately before every send.
    fn is_alive(&self) -> bool;

    /// Queue an event. Returns `false` if it was dropped.
    fn deliver(&self, event: SurfaceEvent) -> bool;
}

/// Surface backed by a bounded tokio channel.
///
/// The receiving half belongs to the surface's event loop; dropping it marks
/// the surface as gone.
///
/// # Example
/// ```ignore
/// let (surface, mut events) = ChannelSurface::new();
/// router.register(SurfaceKind::PlayerView, Arc::new(surface));
///
/// while let Some(event) = events.recv().await {
///     webview.emit(&event.channel, &event.payload);
/// }
/// ```
pub struct ChannelSurface {
    id: SurfaceId,
    event_tx: mpsc::Sender<SurfaceEvent>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::Receiver<SurfaceEvent>) {
        Self::with_capacity(SURFACE_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<SurfaceEvent>) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let surface = Self {
            id: SurfaceId::next(),
            event_tx,
        };
        (surface, event_rx)
    }
}

impl Surface for ChannelSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn is_alive(&self) -> bool {
        !self.event_tx.is_closed()
    }

    fn deliver(&self, event: SurfaceEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    "Surface {} queue full - dropping {} to prevent backpressure",
                    self.id,
                    event.channel
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    "Failed to send {} - surface {} has closed",
                    event.channel,
                    self.id
                );
                false
            }
        }
    }
}
