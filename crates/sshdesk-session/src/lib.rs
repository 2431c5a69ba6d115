//! # sshdesk-session
//!
//! Session lifecycle management for sshdesk.
//!
//! This crate provides:
//! - The ordered session registry with active session/connection pointers
//! - Per-session generation tracking that discards stale async results
//! - Per-connection connect guards and in-flight open/retry coalescing
//! - The lifecycle controller (open, auth retry, close, reconnect)
//! - The bridge that applies transport status pushes to the registry
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on sshdesk-core and
//! drives a [`Transport`] supplied by the embedding application.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod attempt;
pub mod bridge;
pub mod connections;
mod context;
pub mod controller;
pub mod generation;
pub mod guards;
pub mod notice;
pub mod registry;
pub mod testing;
pub mod title;
pub mod transport;

// Re-export commonly used types
pub use bridge::{EventDisposition, StatusBridge};
pub use connections::{ConnectionDirectory, StaticConnections};
pub use controller::{
    ControllerConfig, OpenFuture, RetryFuture, RetryOutcome, SessionController, Snapshot,
    REASON_CONNECTION_BUSY, REASON_NOT_TERMINAL, REASON_SESSION_CLOSED, REASON_SESSION_GONE,
    REASON_SUPERSEDED, REASON_TIMED_OUT,
};
pub use generation::{GenerationTracker, Staleness};
pub use guards::{ConnectGuard, InFlight};
pub use notice::{Announcer, ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use registry::SessionRegistry;
pub use title::SequenceCounter;
pub use transport::{OpenRequest, OpenedSession, StatusEvent, Transport, TransportResult};
