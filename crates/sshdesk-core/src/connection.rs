//! Connection types.
//!
//! Connections are owned by the connection-management side of the client; the
//! session core only reads them by id.

use serde::{Deserialize, Serialize};

/// Identifier of a saved connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a connection ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a connection authenticates by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthMethod {
    /// Interactive password
    Password,
    /// Private key file
    Key {
        /// Path to the private key
        path: String,
    },
    /// SSH agent
    Agent,
}

impl Default for AuthMethod {
    fn default() -> Self {
        Self::Agent
    }
}

/// A remote target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection identifier
    pub id: ConnectionId,
    /// Display name chosen by the user
    #[serde(default)]
    pub name: Option<String>,
    /// Host name or address
    pub host: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    #[serde(default)]
    pub username: Option<String>,
    /// Default auth method
    #[serde(default)]
    pub auth: AuthMethod,
}

fn default_port() -> u16 {
    22
}

impl Connection {
    /// Create a connection with defaults for everything but id and host.
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::new(id),
            name: None,
            host: host.into(),
            port: default_port(),
            username: None,
            auth: AuthMethod::default(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the login user.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the auth method.
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }
}

/// Credentials supplied by the user when retrying authentication.
///
/// Secret fields are redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOverride {
    /// Replacement login user
    #[serde(default)]
    pub username: Option<String>,
    /// Password
    #[serde(default)]
    pub password: Option<String>,
    /// Private key file
    #[serde(default)]
    pub private_key_path: Option<String>,
    /// Passphrase for the private key
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl AuthOverride {
    /// Username/password override.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for AuthOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthOverride")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &redact(&self.passphrase))
            .finish()
    }
}
