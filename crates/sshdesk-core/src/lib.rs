//! # sshdesk-core
//!
//! Core types for the sshdesk session lifecycle.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other sshdesk crates. It provides:
//!
//! - Session types (SessionId, Session, SessionStatus, StatusReason)
//! - Connection types (ConnectionId, Connection, AuthOverride)
//! - Terminal geometry
//! - Error types, including the tagged transport failure
//! - YAML client configuration
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other sshdesk crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod session;

// Re-export commonly used types
pub use config::{ClientConfig, ClientSettings, TerminalSettings};
pub use connection::{AuthMethod, AuthOverride, Connection, ConnectionId};
pub use error::{Error, Result, TransportError, AUTH_REQUIRED_MARKER};
pub use geometry::Dimensions;
pub use session::{Session, SessionId, SessionKind, SessionStatus, StatusReason};
