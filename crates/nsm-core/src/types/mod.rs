//! Core type definitions for the NSM client
//!
//! Protocol constants, capability handling and client state shared by the
//! engine, the transport and embedding programs.

mod nsm_types;
mod state_types;

pub use nsm_types::*;
pub use state_types::*;
