//! sshdesk headless driver library.
//!
//! This library contains the driver's command types, the JSON-lines loop and
//! the simulated transport. The binary entry point is in main.rs.

pub mod commands;
pub mod driver;
pub mod sim;

// Re-export commonly used types
pub use commands::{Command, Event};
pub use driver::Driver;
pub use sim::SimulatedTransport;
