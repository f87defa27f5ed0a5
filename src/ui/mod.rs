// UI module - surfaces, the OS host and the shell controller
//
// This module contains:
// - ChannelSurface: bounded, fire-and-forget event delivery to one surface
// - BroadcastRouter: fans events out to registered surfaces and authenticates inbound messages
// - ShellHost: the OS facilities the core drives (zoom, login item, shortcuts, taskbar, browser)
// - ShellController: the context object owning stores, router, host and the orchestrator task

pub mod bridge;
pub mod controller;
pub mod host;
pub mod router;

pub use bridge::{ChannelSurface, Surface, SurfaceEvent, SurfaceId};
pub use controller::ShellController;
pub use host::{HeadlessHost, ShellHost};
pub use router::{BroadcastRouter, InboundMessage, RouterError, SurfaceKind};
