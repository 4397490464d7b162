//! NSM Client Core Library
//!
//! This crate lets a program take part in a Non Session Manager session:
//! - Announce/welcome handshake with capability negotiation
//! - Dispatch of open, save, GUI and session-loaded requests to program hooks
//! - Dirty, progress, message and label reporting
//! - A single close sequence for errors and termination signals
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       nsm-core                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  nsm/          - Protocol engine, handshake, UDP transport  │
//! │  osc/          - OSC 1.0 message codec                      │
//! │  types/        - Protocol constants, capabilities, state    │
//! │  config.rs     - Client configuration                       │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod nsm;
pub mod osc;
pub mod types;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{CallbackError, Error, Result};
pub use types::*;

// Re-export the engine and its traits
pub use nsm::{
    // Traits
    MessageTransport, OpenRequest, SessionClient,
    // Implementations
    install_sigterm_handler, NsmClient, NsmMessage, PendingHandshake, ProtocolHandler,
    UdpTransport, EXIT_FAILURE, EXIT_OK,
};

pub use osc::{OscArg, OscMessage};
