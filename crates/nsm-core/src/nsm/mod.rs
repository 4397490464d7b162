//! NSM client protocol
//!
//! Client side of the Non Session Manager protocol, spoken over OSC/UDP.
//!
//! # Architecture
//!
//! - `SessionClient` - Hooks the embedding program implements (open, save, GUI, quit)
//! - `MessageTransport` - Duplex message channel to the session manager
//!
//! `NsmClient` is the engine: it announces itself, waits for the welcome,
//! dispatches server messages to the hooks and reports status back. All
//! fatal conditions (failed handshake, rejected announce, errors with
//! quit-on-error, SIGTERM) end in the same close sequence.

mod client;
mod handshake;
mod protocol;
mod signals;
pub mod traits;
mod transport;

pub use traits::{MessageTransport, OpenRequest, SessionClient};

pub use client::{resolve_session_path, NsmClient, EXIT_FAILURE, EXIT_OK};
pub use handshake::{PendingHandshake, WelcomeOutcome};
pub use protocol::{NsmMessage, ProtocolHandler, MAX_MESSAGE_PRIORITY};
pub use signals::{close_on, install_sigterm_handler};
pub use transport::{parse_server_url, UdpTransport};
