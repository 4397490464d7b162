//! Client configuration

use crate::error::{ConfigError, Result};
use crate::types::{Capability, CapabilitySet, NSM_URL_ENV};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for an NSM client.
///
/// The server URL normally comes from the `NSM_URL` environment variable set
/// by the session manager when it launches the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Name shown in the session manager. Must not change between releases:
    /// the manager derives the session file prefix from it.
    pub app_name: String,
    /// Capabilities declared in the announce message
    pub capabilities: Vec<Capability>,
    pub server_url: Option<String>,
    /// Executable reported to the manager; detected when absent
    pub executable: Option<String>,
    /// Shut down when an open/save hook fails or the server reports an error
    pub quit_on_error: bool,
    /// Initial GUI visibility when both sides support `optional-gui`
    pub start_gui_visible: bool,
    /// How long to wait for the welcome, in milliseconds
    pub handshake_timeout_ms: u64,
    /// Terminate the process once the close sequence has run
    pub exit_on_close: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            capabilities: Vec::new(),
            server_url: None,
            executable: None,
            quit_on_error: true,
            start_gui_visible: true,
            handshake_timeout_ms: 5_000,
            exit_on_close: true,
        }
    }
}

impl ClientConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Create a configuration with the server URL taken from `NSM_URL`
    pub fn from_env(app_name: impl Into<String>) -> Self {
        let server_url = std::env::var(NSM_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty());
        Self {
            server_url,
            ..Self::new(app_name)
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_quit_on_error(mut self, quit_on_error: bool) -> Self {
        self.quit_on_error = quit_on_error;
        self
    }

    pub fn with_start_gui_visible(mut self, visible: bool) -> Self {
        self.start_gui_visible = visible;
        self
    }

    /// Sub-millisecond timeouts are rounded up; only a zero timeout stays zero
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.handshake_timeout_ms = if millis == 0 && !timeout.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    pub fn with_exit_on_close(mut self, exit_on_close: bool) -> Self {
        self.exit_on_close = exit_on_close;
        self
    }

    /// Client-declared capability set
    pub fn capability_set(&self) -> CapabilitySet {
        self.capabilities.iter().copied().collect()
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// The manager URL; its absence is a fatal startup error
    pub fn server_url(&self) -> Result<&str> {
        self.server_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingServerUrl.into())
    }

    /// Executable name reported in the announce message
    pub fn resolve_executable(&self) -> String {
        self.executable
            .clone()
            .or_else(detect_executable)
            .unwrap_or_else(|| self.app_name.clone())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid("appName must not be empty".to_string()).into());
        }

        if self.handshake_timeout_ms == 0 {
            return Err(
                ConfigError::Invalid("handshakeTimeoutMs must be > 0".to_string()).into(),
            );
        }

        self.server_url()?;
        Ok(())
    }
}

/// Bare file name if the executable's directory is on `PATH`, absolute path otherwise
fn detect_executable() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    Some(executable_name(&exe, std::env::split_paths(&path_var)))
}

fn executable_name(exe: &Path, mut search_path: impl Iterator<Item = std::path::PathBuf>) -> String {
    let on_path = exe
        .parent()
        .map(|dir| search_path.any(|p| p == dir))
        .unwrap_or(false);

    match exe.file_name() {
        Some(name) if on_path => name.to_string_lossy().into_owned(),
        _ => exe.to_string_lossy().into_owned(),
    }
}
