//! Services module - pure core logic shared by the shell and its integrations.
//!
//! # Components
//!
//! - [`NavigationGate`]: stateless allow/deny/rewrite classifier for URLs
//!   leaving the hosted page. Fails closed.
//! - [`PlayerStateAggregator`]: merges the four unordered page update channels
//!   (progress ticks, state codes, video metadata, store snapshots) into one
//!   canonical [`PlayerState`](crate::models::PlayerState) and broadcasts it
//!   after every update.
//! - [`identity_domains`]: the table of region-localized identity-provider
//!   domain suffixes used by the gate.
//!
//! # Design Philosophy
//!
//! Nothing here knows about surfaces, the OS, or the integration lifecycle.
//! The gate is a pure function; the aggregator is a single-writer store with
//! many read-only subscribers.
//!
//! # Usage Example
//!
//! ```ignore
//! use ytmshell::services::{NavigationGate, NavigationKind, NavigationDecision};
//!
//! match NavigationGate::classify(url, NavigationKind::Navigate) {
//!     NavigationDecision::Allow => { /* let the page proceed */ }
//!     NavigationDecision::DenyThenExternalOpen => host.open_external(url),
//!     NavigationDecision::RewriteTo(target) => { /* load target instead */ }
//!     NavigationDecision::Deny => {}
//! }
//! ```

pub mod identity_domains;
pub mod navigation;
pub mod player;

pub use navigation::{NavigationDecision, NavigationGate, NavigationKind};
pub use player::PlayerStateAggregator;
