//! NSM protocol engine
//!
//! `NsmClient` owns the client state and both capability sets, runs the
//! handshake, dispatches inbound messages to the `SessionClient` hooks and
//! funnels every fatal condition into a single shutdown sequence.

use super::handshake::{PendingHandshake, WelcomeSender};
use super::protocol::{NsmMessage, ProtocolHandler};
use super::traits::{MessageTransport, OpenRequest, SessionClient};
use super::transport::UdpTransport;
use crate::config::ClientConfig;
use crate::error::{NsmError, Result};
use crate::osc::OscMessage;
use crate::types::{
    Capability, CapabilitySet, ClientState, ErrorCode, ADDR_ANNOUNCE, ADDR_OPEN, ADDR_SAVE,
    ADDR_SERVER_OPEN, ADDR_SERVER_SAVE,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Process exit status after a requested close (SIGTERM, explicit `close`)
pub const EXIT_OK: i32 = 0;
/// Process exit status after a fatal protocol failure
pub const EXIT_FAILURE: i32 = 1;

/// Handle to the protocol engine. Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct NsmClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    /// Client-declared capabilities, fixed at construction
    capabilities: CapabilitySet,
    protocol: ProtocolHandler,
    transport: Arc<dyn MessageTransport>,
    callbacks: Arc<dyn SessionClient>,
    state: RwLock<ClientState>,
    /// Fulfilled by the welcome handler, present only while a handshake is pending
    pending_welcome: Mutex<Option<WelcomeSender>>,
    /// Held for the duration of every inbound handler and by `close`, so a
    /// signal-triggered close waits for an in-flight handler to finish
    dispatch_lock: tokio::sync::Mutex<()>,
    closing: AtomicBool,
    /// Exit status of the close sequence once it has run
    shutdown_tx: watch::Sender<Option<i32>>,
    listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl NsmClient {
    /// Create an engine on top of an existing transport. The listener is not
    /// started; call `start_listener` (or use `connect`).
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn MessageTransport>,
        callbacks: Arc<dyn SessionClient>,
    ) -> Self {
        let capabilities = config.capability_set();
        let state = ClientState::new(transport.server_url());
        let (shutdown_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(ClientInner {
                config,
                capabilities,
                protocol: ProtocolHandler::new(),
                transport,
                callbacks,
                state: RwLock::new(state),
                pending_welcome: Mutex::new(None),
                dispatch_lock: tokio::sync::Mutex::new(()),
                closing: AtomicBool::new(false),
                shutdown_tx,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Validate the configuration, open the UDP transport to the server URL
    /// and start the listener
    pub async fn connect(config: ClientConfig, callbacks: Arc<dyn SessionClient>) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::connect(config.server_url()?).await?;
        info!(
            "Connecting {} to session manager at {}",
            config.app_name,
            transport.server_url()
        );

        let client = Self::new(config, Arc::new(transport), callbacks);
        client.start_listener();
        Ok(client)
    }

    /// Spawn the listener task. Calling it again is a no-op.
    pub fn start_listener(&self) {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return;
        }
        *listener = Some(tokio::spawn(self.clone().message_loop()));
    }

    /// Announce to the server and wait for the welcome.
    ///
    /// Any failure here is fatal: the close sequence runs with
    /// `EXIT_FAILURE` before the error is returned. With `exit_on_close` the
    /// process terminates with that status instead of returning.
    pub async fn init(&self) -> Result<()> {
        let executable = self.inner.config.resolve_executable();

        let result = match self.announce(&executable, std::process::id()).await {
            Ok(handshake) => self.await_welcome(handshake).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            error!("Could not join NSM session: {}", e);
            self.close_with(EXIT_FAILURE).await;
        }
        result
    }

    /// Send the announce message and start the handshake window
    pub async fn announce(&self, executable: &str, pid: u32) -> Result<PendingHandshake> {
        let (handshake, welcome_tx) = PendingHandshake::new(self.inner.config.handshake_timeout());
        *self.inner.pending_welcome.lock() = Some(welcome_tx);

        debug!(
            "Announcing client: name={}, capabilities={}, executable={}, pid={}",
            self.inner.config.app_name, self.inner.capabilities, executable, pid
        );

        let message = self.inner.protocol.create_announce(
            &self.inner.config.app_name,
            &self.inner.capabilities,
            executable,
            pid,
        );
        if let Err(e) = self.send(message).await {
            self.inner.pending_welcome.lock().take();
            return Err(e);
        }

        Ok(handshake)
    }

    /// Wait for the welcome message of a pending handshake.
    ///
    /// Fails with `HandshakeTimeout` when nothing arrives in time; the caller
    /// must not keep running without a manager.
    pub async fn await_welcome(&self, handshake: PendingHandshake) -> Result<()> {
        match handshake.wait().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.pending_welcome.lock().take();
                Err(e.into())
            }
        }
    }

    /// Dispatch one inbound message to its handler.
    ///
    /// Handlers run one at a time. Messages arriving once shutdown has begun
    /// are dropped.
    pub async fn handle_message(&self, message: OscMessage) {
        if self.is_closing() {
            debug!("Dropping {} during shutdown", message.address);
            return;
        }

        let _guard = self.inner.dispatch_lock.lock().await;
        if self.is_closing() {
            debug!("Dropping {} during shutdown", message.address);
            return;
        }

        let parsed = match self.inner.protocol.parse_message(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ignoring malformed message: {}", e);
                return;
            }
        };

        match parsed {
            NsmMessage::Welcome {
                welcome_message,
                manager_name,
                capabilities,
            } => {
                self.on_welcome(welcome_message, manager_name, capabilities)
                    .await
            }
            NsmMessage::Reply {
                responding_to,
                message,
            } => self.on_reply(&responding_to, &message),
            NsmMessage::Error {
                responding_to,
                code,
                message,
            } => self.on_error(&responding_to, code, &message).await,
            NsmMessage::Open(request) => self.on_open(request).await,
            NsmMessage::Save => self.on_save().await,
            NsmMessage::SessionLoaded => self.on_session_loaded().await,
            NsmMessage::ShowGui => self.on_show_gui().await,
            NsmMessage::HideGui => self.on_hide_gui().await,
            NsmMessage::Unknown(message) => self.on_unknown(&message),
        }
    }

    // ------------------------------------------------------------------------
    // Status reporting
    // ------------------------------------------------------------------------

    /// Send a status message (priority 0-3, 3 most important).
    /// Requires the `message` capability; dropped with a warning otherwise.
    pub async fn send_message(&self, text: &str, priority: i32) -> Result<()> {
        if !self.inner.capabilities.contains(Capability::Message) {
            warn!(
                "The client tried to send a status message but was not initialized \
                 with the 'message' capability. The message was not sent."
            );
            return Ok(());
        }
        self.send(self.inner.protocol.create_message(priority, text))
            .await
    }

    /// Report unsaved changes. Only transitions are transmitted.
    /// Requires the `dirty` capability; dropped with a warning otherwise.
    pub async fn set_dirty(&self, dirty: bool) -> Result<()> {
        self.report_dirty(dirty, false).await
    }

    /// Report progress of a long operation as a fraction in 0.0..=1.0.
    /// Requires the `progress` capability; dropped with a warning otherwise.
    pub async fn update_progress(&self, fraction: f32) -> Result<()> {
        if !self.inner.capabilities.contains(Capability::Progress) {
            warn!(
                "The client tried to send a progress update but was not initialized \
                 with the 'progress' capability. The message was not sent."
            );
            return Ok(());
        }
        self.send(self.inner.protocol.create_progress(fraction))
            .await
    }

    /// Set the label shown next to the client in the manager
    pub async fn set_label(&self, label: &str) -> Result<()> {
        self.send(self.inner.protocol.create_label(label)).await
    }

    /// Send an error reply to the message at `responding_to`
    pub async fn send_error(&self, text: &str, code: ErrorCode, responding_to: &str) -> Result<()> {
        self.send(self.inner.protocol.create_error(responding_to, code, text))
            .await
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    /// Run the close sequence: quit hook, stop the listener, exit with
    /// `EXIT_OK`.
    ///
    /// Waits for an in-flight handler to finish first. Only the first call
    /// has any effect. Must not be called from inside a `SessionClient` hook.
    pub async fn close(&self) {
        self.close_with(EXIT_OK).await;
    }

    async fn close_with(&self, exit_code: i32) {
        let _guard = self.inner.dispatch_lock.lock().await;
        self.shutdown(exit_code).await;
    }

    /// Resolves with the exit status once the close sequence has run
    pub async fn wait_for_shutdown(&self) -> i32 {
        let mut rx = self.inner.shutdown_tx.subscribe();
        loop {
            if let Some(code) = *rx.borrow_and_update() {
                return code;
            }
            if rx.changed().await.is_err() {
                // sender lives in `inner`, which outlives this borrow
                return EXIT_FAILURE;
            }
        }
    }

    /// Exit status of the close sequence, `None` while still running
    pub fn exit_code(&self) -> Option<i32> {
        *self.inner.shutdown_tx.borrow()
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Snapshot of the client state
    pub fn state(&self) -> ClientState {
        self.inner.state.read().clone()
    }

    pub fn is_joined(&self) -> bool {
        self.inner.state.read().session_joined
    }

    /// Client-declared capabilities
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.inner.capabilities
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn message_loop(self) {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        if shutdown_rx.borrow_and_update().is_some() {
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("Listener stopped");
                    break;
                }
                message = self.inner.transport.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => {
                        warn!("Transport closed, listener exiting");
                        break;
                    }
                },
            }
        }
    }

    async fn send(&self, message: OscMessage) -> Result<()> {
        debug!("Sending OSC to '{}': {}", self.inner.transport.server_url(), message);
        self.inner.transport.send(message).await
    }

    /// Send from a handler, where there is nobody to return an error to
    async fn send_or_log(&self, message: OscMessage) {
        let address = message.address.clone();
        if let Err(e) = self.send(message).await {
            error!("Failed to send {}: {}", address, e);
        }
    }

    async fn report_dirty(&self, dirty: bool, internal: bool) -> Result<()> {
        if !self.inner.capabilities.contains(Capability::Dirty) {
            if !internal {
                warn!(
                    "The client tried to send a dirty/clean update, but was not \
                     initialized with the 'dirty' capability. The message was not sent."
                );
            }
            return Ok(());
        }

        let changed = {
            let mut state = self.inner.state.write();
            if state.dirty == dirty {
                false
            } else {
                state.dirty = dirty;
                true
            }
        };
        if !changed {
            return Ok(());
        }

        if let Err(e) = self.send(self.inner.protocol.create_dirty(dirty)).await {
            // keep `dirty` equal to the last value that reached the manager
            self.inner.state.write().dirty = !dirty;
            return Err(e);
        }
        Ok(())
    }

    /// Close sequence proper. Callers hold the dispatch lock.
    async fn shutdown(&self, exit_code: i32) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return;
        }

        info!("Client shutdown (status {}).", exit_code);
        // A handshake still waiting for its welcome fails with HandshakeAborted
        self.inner.pending_welcome.lock().take();

        self.inner.callbacks.quit().await;
        self.inner.shutdown_tx.send_replace(Some(exit_code));

        if self.inner.config.exit_on_close {
            std::process::exit(exit_code);
        }
    }

    async fn on_welcome(
        &self,
        welcome_message: String,
        manager_name: String,
        server_capabilities: CapabilitySet,
    ) {
        info!(
            "Joined session managed by '{}': {} (server capabilities: {})",
            manager_name, welcome_message, server_capabilities
        );

        let server_gui = server_capabilities.contains(Capability::OptionalGui);
        {
            let mut state = self.inner.state.write();
            state.session_joined = true;
            state.welcome_message = Some(welcome_message);
            state.manager_name = Some(manager_name);
            state.server_capabilities = server_capabilities;
            state.joined_at = Some(chrono::Utc::now());
        }

        let pending = self.inner.pending_welcome.lock().take();
        if let Some(tx) = pending {
            let _ = tx.send(Ok(()));
        }

        if !self.inner.capabilities.contains(Capability::OptionalGui) {
            return;
        }

        if server_gui && !self.inner.config.start_gui_visible {
            self.inner.callbacks.hide_gui().await;
            self.send_or_log(self.inner.protocol.create_gui_state(false))
                .await;
        } else {
            // Without server support the GUI must stay visible; show it once
            // and leave it alone.
            self.inner.callbacks.show_gui().await;
            self.send_or_log(self.inner.protocol.create_gui_state(true))
                .await;
        }
    }

    fn on_reply(&self, responding_to: &str, message: &str) {
        match responding_to {
            ADDR_SERVER_OPEN => info!("Session loaded. {}", message),
            ADDR_SERVER_SAVE => info!("Session saved. {}", message),
            other => warn!("Unknown /reply message: {} {}", other, message),
        }
    }

    async fn on_error(&self, responding_to: &str, code: i32, message: &str) {
        let explanation = match ErrorCode::from_code(code) {
            Some(ErrorCode::IncompatibleApi) => "Incompatible API.".to_string(),
            Some(ErrorCode::Blacklisted) => "Client black listed.".to_string(),
            Some(ErrorCode::General) => "General error.".to_string(),
            _ => format!(
                "Client received error {} but doesn't know how to handle it: {}",
                code, message
            ),
        };

        let rejected = responding_to == ADDR_ANNOUNCE;
        if rejected {
            error!("Server rejected client announcement: {} ({})", explanation, message);
            let pending = self.inner.pending_welcome.lock().take();
            if let Some(tx) = pending {
                let _ = tx.send(Err(NsmError::AnnounceRejected {
                    code,
                    message: message.to_string(),
                }));
            }
        } else {
            error!("Error in response to {}: {} ({})", responding_to, explanation, message);
        }

        // Nothing to do in a session we were rejected from
        if rejected || self.inner.config.quit_on_error {
            debug!("Client shuts itself down.");
            self.shutdown(EXIT_FAILURE).await;
        }
    }

    async fn on_open(&self, request: OpenRequest) {
        debug!(
            "open message received: prefix={}, session={}, client_id={}",
            request.path_prefix, request.session_name, request.client_id
        );

        {
            let mut state = self.inner.state.write();
            state.session_prefix = Some(request.path_prefix.clone());
            state.session_name = Some(request.session_name.clone());
            state.client_id = Some(request.client_id.clone());
        }

        match self.inner.callbacks.open_session(&request).await {
            Ok(file_name) => {
                let session_path = resolve_session_path(&request.path_prefix, &file_name);
                info!("Session opened: {}", session_path);
                self.inner.state.write().session_path = Some(session_path.clone());

                let status = format!("'{}' successfully opened", session_path);
                self.send_or_log(self.inner.protocol.create_reply(ADDR_OPEN, &status))
                    .await;
            }
            Err(e) => {
                let text = format!("Session not loaded. Error ({}): {}", e.code, e.message);
                error!("{}", text);
                self.send_or_log(self.inner.protocol.create_error(ADDR_OPEN, e.code, &text))
                    .await;

                if self.inner.config.quit_on_error {
                    self.shutdown(EXIT_FAILURE).await;
                }
            }
        }
    }

    async fn on_save(&self) {
        let session_path = self.inner.state.read().session_path.clone();
        let Some(session_path) = session_path else {
            warn!("save message received before a session was opened");
            self.send_or_log(self.inner.protocol.create_error(
                ADDR_SAVE,
                ErrorCode::NoSessionOpen,
                "No session open",
            ))
            .await;
            return;
        };

        debug!("save message received: {}", session_path);

        match self.inner.callbacks.save_session(&session_path).await {
            Ok(()) => {
                let status = format!("'{}' successfully saved.", session_path);
                self.send_or_log(self.inner.protocol.create_reply(ADDR_SAVE, &status))
                    .await;
                if let Err(e) = self.report_dirty(false, true).await {
                    error!("Failed to report clean state: {}", e);
                }
            }
            Err(e) => {
                let text = format!("Not saved. Error ({}): {}", e.code, e.message);
                error!("{}", text);
                self.send_or_log(self.inner.protocol.create_error(ADDR_SAVE, e.code, &text))
                    .await;

                if self.inner.config.quit_on_error {
                    self.shutdown(EXIT_FAILURE).await;
                }
            }
        }
    }

    async fn on_session_loaded(&self) {
        debug!("session_is_loaded message received");
        self.inner.state.write().session_loaded = true;
        self.inner.callbacks.session_loaded().await;
    }

    async fn on_show_gui(&self) {
        if !self.server_supports_gui() {
            warn!("show_optional_gui message received but server capabilities do not include 'optional-gui'.");
            return;
        }
        if self.inner.callbacks.show_gui().await {
            self.send_or_log(self.inner.protocol.create_gui_state(true))
                .await;
        }
    }

    async fn on_hide_gui(&self) {
        if !self.server_supports_gui() {
            warn!("hide_optional_gui message received but server capabilities do not include 'optional-gui'.");
            return;
        }
        if self.inner.callbacks.hide_gui().await {
            self.send_or_log(self.inner.protocol.create_gui_state(false))
                .await;
        }
    }

    fn on_unknown(&self, message: &OscMessage) {
        warn!(
            "Received unknown OSC message '{}' from '{}'",
            message.address,
            self.inner.transport.server_url()
        );
        for arg in &message.args {
            warn!("argument of type '{}': {}", arg.type_tag(), arg);
        }
    }

    fn server_supports_gui(&self) -> bool {
        self.inner
            .state
            .read()
            .server_capabilities
            .contains(Capability::OptionalGui)
    }
}

/// Full session path for the file name returned by the open hook
pub fn resolve_session_path(prefix: &str, file_name: &str) -> String {
    if file_name.starts_with(prefix) {
        file_name.to_string()
    } else {
        format!("{}{}", prefix, file_name)
    }
}
