//! Client-side session state

use super::CapabilitySet;
use chrono::{DateTime, Utc};

/// Mutable record of the client's handshake and session status.
///
/// Owned by the protocol engine; only engine handlers mutate it.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    /// OSC URL of the session manager
    pub server_url: String,
    /// Handshake completed
    pub session_joined: bool,
    pub welcome_message: Option<String>,
    pub manager_name: Option<String>,
    pub server_capabilities: CapabilitySet,
    pub joined_at: Option<DateTime<Utc>>,
    // Set on the first open message and never cleared afterwards
    pub session_prefix: Option<String>,
    pub session_name: Option<String>,
    pub client_id: Option<String>,
    /// Resolved path of the last successfully opened session
    pub session_path: Option<String>,
    /// Last dirty value actually transmitted
    pub dirty: bool,
    /// Manager reported that every client in the session has loaded
    pub session_loaded: bool,
}

impl ClientState {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }
}
