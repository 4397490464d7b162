//! Core NSM traits
//!
//! - `SessionClient` - Callback interface the embedding program implements
//! - `MessageTransport` - Duplex OSC message channel to the session manager

use crate::error::{CallbackError, Result};
use crate::osc::OscMessage;
use async_trait::async_trait;

// ============================================================================
// Open Request
// ============================================================================

/// Arguments of an `/nsm/client/open` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Instance-specific path the client should use for its session data,
    /// either as a directory or as a file name prefix
    pub path_prefix: String,
    pub session_name: String,
    /// Unique id of this client instance; prefix any externally visible
    /// resources (JACK client names, ports, ...) with it
    pub client_id: String,
}

impl OpenRequest {
    pub fn new(
        path_prefix: impl Into<String>,
        session_name: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            session_name: session_name.into(),
            client_id: client_id.into(),
        }
    }

    /// `(path_prefix, client_id)` for hooks written against the older
    /// two-argument open signature
    pub fn legacy_args(&self) -> (&str, &str) {
        (&self.path_prefix, &self.client_id)
    }
}

// ============================================================================
// Session Client Trait (Callback Interface)
// ============================================================================

/// Hooks invoked by the protocol engine.
///
/// `open_session` and `save_session` are required. The GUI, session-loaded and
/// quit hooks default to no-ops. Hooks run on the listener task; a slow hook
/// delays processing of later messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Open or create the session.
    ///
    /// Returns the session file name, either relative to the path prefix or
    /// already prefixed with it.
    async fn open_session(&self, request: &OpenRequest) -> std::result::Result<String, CallbackError>;

    /// Save the current session to the resolved session path
    async fn save_session(&self, session_path: &str) -> std::result::Result<(), CallbackError>;

    /// Show the optional GUI; returns whether it is now visible
    async fn show_gui(&self) -> bool {
        false
    }

    /// Hide the optional GUI; returns whether it is now hidden
    async fn hide_gui(&self) -> bool {
        false
    }

    /// Every client in the session has been opened
    async fn session_loaded(&self) {}

    /// Called once before the client exits. Shut down engines here; the
    /// process exit itself is handled by the engine.
    async fn quit(&self) {}
}

// ============================================================================
// Message Transport Trait
// ============================================================================

/// Duplex channel of addressed messages to and from the session manager.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// URL of the session manager messages are sent to
    fn server_url(&self) -> &str;

    /// Queue a message for delivery (best-effort)
    async fn send(&self, message: OscMessage) -> Result<()>;

    /// Next inbound message; `None` once the transport is closed
    async fn recv(&self) -> Option<OscMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_request_legacy_args() {
        let request = OpenRequest::new("/home/user/sess/app.nABCD", "sess", "app.nABCD");
        assert_eq!(
            request.legacy_args(),
            ("/home/user/sess/app.nABCD", "app.nABCD")
        );
    }

    struct Minimal;

    #[async_trait]
    impl SessionClient for Minimal {
        async fn open_session(&self, _request: &OpenRequest) -> std::result::Result<String, CallbackError> {
            Ok("data".to_string())
        }

        async fn save_session(&self, _session_path: &str) -> std::result::Result<(), CallbackError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_optional_hooks_default_to_noops() {
        let client = Minimal;
        assert!(!client.show_gui().await);
        assert!(!client.hide_gui().await);
        client.session_loaded().await;
        client.quit().await;
    }
}
