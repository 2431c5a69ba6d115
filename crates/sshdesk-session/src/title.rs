//! Tab titles and per-connection sequence numbers.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use sshdesk_core::{Connection, ConnectionId};

/// Base used when a connection has neither a name nor a host.
pub const FALLBACK_BASE: &str = "session";

lazy_static! {
    static ref SEQUENCE_SUFFIX: Regex = Regex::new(r"\s*#\d+\s*$").unwrap();
}

/// Base title for a connection: `name@host`, `user@host`, `host` or `name`.
pub fn base_title(connection: Option<&Connection>) -> String {
    let Some(connection) = connection else {
        return FALLBACK_BASE.to_string();
    };

    let name = non_empty(connection.name.as_deref());
    let user = non_empty(connection.username.as_deref());
    let host = non_empty(Some(connection.host.as_str()));

    match (name, user, host) {
        (Some(name), _, Some(host)) => format!("{name}@{host}"),
        (None, Some(user), Some(host)) => format!("{user}@{host}"),
        (None, None, Some(host)) => host.to_string(),
        (Some(name), _, None) => name.to_string(),
        (None, _, None) => FALLBACK_BASE.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Full title: `"{base} #{sequence}"`.
pub fn compose(base: &str, sequence: u32) -> String {
    format!("{base} #{sequence}")
}

/// Strip a trailing `#N` sequence suffix.
pub fn strip_sequence(title: &str) -> &str {
    match SEQUENCE_SUFFIX.find(title) {
        Some(suffix) => &title[..suffix.start()],
        None => title.trim_end(),
    }
}

/// Title for a freshly opened session.
///
/// The locally derived base wins; a transport-supplied title only replaces the
/// fallback base. Either way the claimed sequence number is re-applied.
pub fn merge(local_base: &str, remote_title: Option<&str>, sequence: u32) -> String {
    let remote_base = remote_title
        .map(strip_sequence)
        .map(str::trim)
        .filter(|base| !base.is_empty());

    match remote_base {
        Some(remote) if local_base == FALLBACK_BASE => compose(remote, sequence),
        _ => compose(local_base, sequence),
    }
}

/// Title for a monitor tab.
pub fn monitor(base: &str) -> String {
    format!("{base} monitor")
}

/// Monotonic per-connection counter. Numbers are never reused, even after the
/// session holding one is closed.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: HashMap<ConnectionId, u32>,
}

impl SequenceCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next number for a connection, starting at 1.
    pub fn claim(&mut self, connection_id: &ConnectionId) -> u32 {
        let last = self.last.entry(connection_id.clone()).or_insert(0);
        *last += 1;
        *last
    }

    /// Last number handed out for a connection (0 if none).
    pub fn last(&self, connection_id: &ConnectionId) -> u32 {
        self.last.get(connection_id).copied().unwrap_or(0)
    }
}
