//! Driver command and event types.
//!
//! Commands arrive as JSON lines on stdin; events leave as JSON lines on stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sshdesk_core::{AuthOverride, ConnectionId, SessionId};
use sshdesk_session::{Notice, Snapshot};

// =============================================================================
// Commands
// =============================================================================

/// A driver command, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Open a new session on a connection
    Connect {
        /// Saved connection to open
        connection_id: ConnectionId,
    },

    /// Retry authentication with new credentials
    Retry {
        /// Session to retry
        session_id: SessionId,
        /// Replacement credentials
        #[serde(default)]
        auth: AuthOverride,
    },

    /// Close a session
    Close {
        /// Session to close
        session_id: SessionId,
    },

    /// Replace a session with a fresh one on the same connection
    Reconnect {
        /// Session to replace
        session_id: SessionId,
    },

    /// Focus a connection
    Activate {
        /// Connection to focus
        connection_id: ConnectionId,
    },

    /// Open a monitor tab
    Monitor {
        /// Connection to monitor
        connection_id: ConnectionId,
    },

    /// Close every session of a connection
    CloseConnection {
        /// Connection whose sessions are closed
        connection_id: ConnectionId,
    },

    /// Rename a session tab
    Rename {
        /// Session to rename
        session_id: SessionId,
        /// New title
        title: String,
    },

    /// Report the current state
    List,
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Retry { .. } => "retry",
            Self::Close { .. } => "close",
            Self::Reconnect { .. } => "reconnect",
            Self::Activate { .. } => "activate",
            Self::Monitor { .. } => "monitor",
            Self::CloseConnection { .. } => "close_connection",
            Self::Rename { .. } => "rename",
            Self::List => "list",
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// A driver output line, tagged by `event`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Result of one command
    Response {
        /// Command name
        cmd: String,
        /// Whether the command did what was asked
        ok: bool,
        /// Command-specific payload
        #[serde(skip_serializing_if = "Value::is_null")]
        result: Value,
        /// State after the command
        snapshot: Snapshot,
    },

    /// User-visible session notice
    Notice(Notice),

    /// Input line that could not be handled
    Error {
        /// What went wrong
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let command: Command =
            serde_json::from_str(r#"{"cmd":"connect","connection_id":"prod"}"#).unwrap();
        assert_eq!(
            command,
            Command::Connect {
                connection_id: ConnectionId::from("prod")
            }
        );
        assert_eq!(command.name(), "connect");
    }

    #[test]
    fn test_parse_retry_with_password() {
        let id = SessionId::new();
        let json = format!(
            r#"{{"cmd":"retry","session_id":"{id}","auth":{{"username":"root","password":"pw"}}}}"#
        );
        let command: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(
            command,
            Command::Retry {
                session_id: id,
                auth: AuthOverride::password("root", "pw"),
            }
        );
    }

    #[test]
    fn test_parse_list_and_unknown() {
        let command: Command = serde_json::from_str(r#"{"cmd":"list"}"#).unwrap();
        assert_eq!(command, Command::List);
        assert!(serde_json::from_str::<Command>(r#"{"cmd":"explode"}"#).is_err());
    }

    #[test]
    fn test_error_event_shape() {
        let event = Event::Error {
            message: "bad input".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "bad input");
    }
}
