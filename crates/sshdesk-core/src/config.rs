//! Configuration types for sshdesk.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::{Connection, Dimensions, Error};

/// Client configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Client settings
    pub client: ClientSettings,
    /// Terminal settings
    pub terminal: TerminalSettings,
    /// Saved connections
    pub connections: Vec<Connection>,
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.terminal.dimensions().is_valid() {
            return Err(Error::Config("terminal dimensions must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for connection in &self.connections {
            if connection.id.as_str().trim().is_empty() {
                return Err(Error::Config("connection id cannot be empty".to_string()));
            }
            if !seen.insert(connection.id.clone()) {
                return Err(Error::Config(format!(
                    "duplicate connection id '{}'",
                    connection.id
                )));
            }
            if connection.host.trim().is_empty() {
                return Err(Error::Config(format!(
                    "connection '{}' host cannot be empty",
                    connection.id
                )));
            }
            if connection.port == 0 {
                return Err(Error::Config(format!(
                    "connection '{}' port must be > 0",
                    connection.id
                )));
            }
        }

        Ok(())
    }
}

/// Client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Upper bound for a single open/retry in seconds (0 = no timeout)
    pub open_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            open_timeout_secs: 0,
        }
    }
}

impl ClientSettings {
    /// Open timeout, if one is configured.
    pub fn open_timeout(&self) -> Option<Duration> {
        (self.open_timeout_secs > 0).then(|| Duration::from_secs(self.open_timeout_secs))
    }
}

/// Terminal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Default terminal rows
    pub default_rows: u16,
    /// Default terminal columns
    pub default_cols: u16,
    /// TERM environment variable value
    pub term: String,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            default_rows: 24,
            default_cols: 80,
            term: "xterm-256color".to_string(),
        }
    }
}

impl TerminalSettings {
    /// Default size for newly opened terminals.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.default_rows, self.default_cols)
    }

    /// TERM value to request, if one is set.
    pub fn term(&self) -> Option<String> {
        let term = self.term.trim();
        (!term.is_empty()).then(|| term.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthMethod;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.client.log_level, "info");
        assert_eq!(config.client.open_timeout(), None);
        assert_eq!(config.terminal.default_rows, 24);
        assert_eq!(config.terminal.default_cols, 80);
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut config = ClientConfig::default();
        config.terminal.default_cols = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
client:
  log_level: debug
  open_timeout_secs: 15

terminal:
  default_rows: 30
  default_cols: 120
  term: "vt220"

connections:
  - id: prod
    name: prod
    host: 10.0.0.1
    username: root
    auth:
      type: password
  - id: build
    host: build.internal
    port: 2222
    auth:
      type: key
      path: ~/.ssh/id_ed25519
"#;

        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.client.log_level, "debug");
        assert_eq!(config.client.open_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.terminal.dimensions(), Dimensions::new(30, 120));
        assert_eq!(config.terminal.term().as_deref(), Some("vt220"));
        assert_eq!(config.connections.len(), 2);
        assert_eq!(config.connections[0].auth, AuthMethod::Password);
        assert_eq!(config.connections[1].port, 2222);
        assert_eq!(config.connections[1].username, None);
    }

    #[test]
    fn test_blank_term_left_to_transport() {
        let mut config = ClientConfig::default();
        assert_eq!(config.terminal.term().as_deref(), Some("xterm-256color"));

        config.terminal.term = "  ".to_string();
        assert_eq!(config.terminal.term(), None);
    }

    #[test]
    fn test_duplicate_connection_ids() {
        let yaml = r#"
connections:
  - id: prod
    host: a
  - id: prod
    host: b
"#;
        let err = ClientConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate connection id"));
    }

    #[test]
    fn test_empty_host() {
        let yaml = r#"
connections:
  - id: prod
    host: ""
"#;
        assert!(ClientConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_port() {
        let yaml = r#"
connections:
  - id: prod
    host: a
    port: 0
"#;
        assert!(ClientConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let result = ClientConfig::from_yaml("connections: [");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
