//! NSM protocol types: addresses, error codes, capabilities

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Protocol version reported in the announce message
pub const API_VERSION_MAJOR: i32 = 1;
pub const API_VERSION_MINOR: i32 = 2;

/// Environment variable carrying the session manager's OSC URL
pub const NSM_URL_ENV: &str = "NSM_URL";

// Client -> server
pub const ADDR_ANNOUNCE: &str = "/nsm/server/announce";
pub const ADDR_PROGRESS: &str = "/nsm/client/progress";
pub const ADDR_IS_DIRTY: &str = "/nsm/client/is_dirty";
pub const ADDR_IS_CLEAN: &str = "/nsm/client/is_clean";
pub const ADDR_MESSAGE: &str = "/nsm/client/message";
pub const ADDR_LABEL: &str = "/nsm/client/label";
pub const ADDR_GUI_SHOWN: &str = "/nsm/client/gui_is_shown";
pub const ADDR_GUI_HIDDEN: &str = "/nsm/client/gui_is_hidden";

// Server -> client
pub const ADDR_OPEN: &str = "/nsm/client/open";
pub const ADDR_SAVE: &str = "/nsm/client/save";
pub const ADDR_SESSION_LOADED: &str = "/nsm/client/session_is_loaded";
pub const ADDR_SHOW_GUI: &str = "/nsm/client/show_optional_gui";
pub const ADDR_HIDE_GUI: &str = "/nsm/client/hide_optional_gui";

// Both directions
pub const ADDR_REPLY: &str = "/reply";
pub const ADDR_ERROR: &str = "/error";

// Informational replies the server sends about its own operations
pub const ADDR_SERVER_OPEN: &str = "/nsm/server/open";
pub const ADDR_SERVER_SAVE: &str = "/nsm/server/save";

/// NSM protocol error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// General error
    General,
    /// Incompatible API version
    IncompatibleApi,
    /// Client has been blacklisted
    Blacklisted,
    /// Client could not be launched
    LaunchFailed,
    /// The named session does not exist
    NoSuchFile,
    /// No session is loaded
    NoSessionOpen,
    /// Unsaved changes would be lost
    UnsavedChanges,
    /// Operation cannot be completed at this time
    NotNow,
    /// An existing project file was found to be corrupt
    BadProject,
    /// A new project could not be created
    CreateFailed,
    /// Session is locked by another process
    SessionLocked,
    /// An operation is currently in progress
    OperationPending,
}

impl ErrorCode {
    const ALL: [ErrorCode; 12] = [
        ErrorCode::General,
        ErrorCode::IncompatibleApi,
        ErrorCode::Blacklisted,
        ErrorCode::LaunchFailed,
        ErrorCode::NoSuchFile,
        ErrorCode::NoSessionOpen,
        ErrorCode::UnsavedChanges,
        ErrorCode::NotNow,
        ErrorCode::BadProject,
        ErrorCode::CreateFailed,
        ErrorCode::SessionLocked,
        ErrorCode::OperationPending,
    ];

    /// Numeric wire value
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::General => -1,
            ErrorCode::IncompatibleApi => -2,
            ErrorCode::Blacklisted => -3,
            ErrorCode::LaunchFailed => -4,
            ErrorCode::NoSuchFile => -5,
            ErrorCode::NoSessionOpen => -6,
            ErrorCode::UnsavedChanges => -7,
            ErrorCode::NotNow => -8,
            ErrorCode::BadProject => -9,
            ErrorCode::CreateFailed => -10,
            ErrorCode::SessionLocked => -11,
            ErrorCode::OperationPending => -12,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::General => "GENERAL",
            ErrorCode::IncompatibleApi => "INCOMPATIBLE_API",
            ErrorCode::Blacklisted => "BLACKLISTED",
            ErrorCode::LaunchFailed => "LAUNCH_FAILED",
            ErrorCode::NoSuchFile => "NO_SUCH_FILE",
            ErrorCode::NoSessionOpen => "NO_SESSION_OPEN",
            ErrorCode::UnsavedChanges => "UNSAVED_CHANGES",
            ErrorCode::NotNow => "NOT_NOW",
            ErrorCode::BadProject => "BAD_PROJECT",
            ErrorCode::CreateFailed => "CREATE_FAILED",
            ErrorCode::SessionLocked => "SESSION_LOCKED",
            ErrorCode::OperationPending => "OPERATION_PENDING",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional protocol features a client or server may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Client can respond to multiple `open` messages without restarting
    Switch,
    /// Client knows when it has unsaved changes
    Dirty,
    /// Client can send progress updates during time-consuming operations
    Progress,
    /// Client can send textual status updates
    Message,
    /// Client has an optional GUI
    OptionalGui,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Switch => "switch",
            Capability::Dirty => "dirty",
            Capability::Progress => "progress",
            Capability::Message => "message",
            Capability::OptionalGui => "optional-gui",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(Capability::Switch),
            "dirty" => Ok(Capability::Dirty),
            "progress" => Ok(Capability::Progress),
            "message" => Ok(Capability::Message),
            "optional-gui" => Ok(Capability::OptionalGui),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Set of capability tokens declared by one side of the handshake.
///
/// Server capability strings may contain tokens outside the client vocabulary
/// (`server-control`, `broadcast`, ...); those are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tokens: BTreeSet<String>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a colon-delimited capability string such as `:switch:dirty:`
    pub fn parse(token: &str) -> Self {
        let tokens = token
            .split(':')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// Render as a colon-delimited string framed with leading and trailing
    /// delimiters. An empty set renders as a single `":"`.
    pub fn to_token(&self) -> String {
        let mut out = String::from(":");
        for token in &self.tokens {
            out.push_str(token);
            out.push(':');
        }
        out
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.tokens.contains(capability.as_str())
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(|c| c.as_str().to_string()).collect(),
        }
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}
