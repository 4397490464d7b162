//! Error types for the NSM client core

use crate::types::ErrorCode;
use thiserror::Error;

/// Main error type for NSM client operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("NSM protocol error: {0}")]
    Nsm(#[from] NsmError),

    #[error("OSC codec error: {0}")]
    Osc(#[from] OscError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session protocol errors
#[derive(Error, Debug)]
pub enum NsmError {
    #[error("No response from NSM server within timeout ({:.1} sec.)", .timeout.as_secs_f64())]
    HandshakeTimeout { timeout: std::time::Duration },

    #[error("Server rejected client announcement: {message} ({code})")]
    AnnounceRejected { code: i32, message: String },

    #[error("Handshake aborted: client is shutting down")]
    HandshakeAborted,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Transport closed")]
    TransportClosed,
}

/// OSC wire format errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OscError {
    #[error("Malformed packet: {0}")]
    Decode(String),

    #[error("Cannot encode message: {0}")]
    Encode(String),

    #[error("Invalid address pattern: {0}")]
    InvalidAddress(String),

    #[error("Unsupported type tag: {0}")]
    UnsupportedTypeTag(char),

    #[error("OSC bundles are not supported")]
    BundleNotSupported,
}

/// Configuration errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Non-Session-Manager environment variable NSM_URL not set. \
         This program must be run via a Non Session Manager."
    )]
    MissingServerUrl,

    #[error("Invalid NSM server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Invalid client configuration: {0}")]
    Invalid(String),
}

/// Failure reported by an open or save hook.
///
/// Carries the protocol error code sent back to the session manager along
/// with a human-readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CallbackError {
    pub code: ErrorCode,
    pub message: String,
}

impl CallbackError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Failure with the GENERAL error code
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::General, message)
    }
}

impl From<std::io::Error> for CallbackError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NoSuchFile,
            _ => ErrorCode::General,
        };
        Self::new(code, err.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_general() {
        let err = CallbackError::general("corrupt header");
        assert_eq!(err.code, ErrorCode::General);
        assert_eq!(err.to_string(), "corrupt header");
    }

    #[test]
    fn test_callback_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CallbackError = io.into();
        assert_eq!(err.code, ErrorCode::NoSuchFile);
    }

    #[test]
    fn test_handshake_timeout_message() {
        let err = Error::Nsm(NsmError::HandshakeTimeout {
            timeout: std::time::Duration::from_millis(500),
        });
        assert_eq!(
            err.to_string(),
            "NSM protocol error: No response from NSM server within timeout (0.5 sec.)"
        );
    }

    #[test]
    fn test_codec_error_converts() {
        let err: Error = OscError::BundleNotSupported.into();
        assert!(matches!(err, Error::Osc(OscError::BundleNotSupported)));
    }
}
