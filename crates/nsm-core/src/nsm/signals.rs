//! Termination signal handling
//!
//! The session manager stops clients with SIGTERM. The close sequence it
//! triggers is the same one a fatal protocol error runs.

use super::client::NsmClient;
use crate::error::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run the close sequence once `signal` resolves. A requested termination
/// exits with `EXIT_OK`.
pub async fn close_on<F>(client: NsmClient, signal: F)
where
    F: Future<Output = ()>,
{
    signal.await;
    info!("Termination requested, closing client");
    client.close().await;
}

/// Spawn a task that closes the client on SIGTERM (Ctrl-C where SIGTERM does
/// not exist).
pub fn install_sigterm_handler(client: NsmClient) -> Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        debug!("SIGTERM handler installed");
        Ok(tokio::spawn(close_on(client, async move {
            sigterm.recv().await;
        })))
    }

    #[cfg(not(unix))]
    {
        debug!("Ctrl-C handler installed");
        Ok(tokio::spawn(close_on(client, async {
            let _ = tokio::signal::ctrl_c().await;
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::CallbackError;
    use crate::nsm::traits::{MessageTransport, OpenRequest, SessionClient};
    use crate::osc::OscMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct NullTransport;

    #[async_trait]
    impl MessageTransport for NullTransport {
        fn server_url(&self) -> &str {
            "osc.udp://127.0.0.1:1/"
        }

        async fn send(&self, _message: OscMessage) -> Result<()> {
            Ok(())
        }

        async fn recv(&self) -> Option<OscMessage> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct CountingClient {
        quits: AtomicUsize,
    }

    #[async_trait]
    impl SessionClient for CountingClient {
        async fn open_session(&self, _request: &OpenRequest) -> std::result::Result<String, CallbackError> {
            Ok(String::new())
        }

        async fn save_session(&self, _session_path: &str) -> std::result::Result<(), CallbackError> {
            Ok(())
        }

        async fn quit(&self) {
            self.quits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_close_on_signal() {
        let callbacks = Arc::new(CountingClient::default());
        let client = NsmClient::new(
            ClientConfig::new("SignalTest").with_exit_on_close(false),
            Arc::new(NullTransport),
            callbacks.clone(),
        );

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(close_on(client.clone(), async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.is_closing());

        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(client.is_closing());
        assert_eq!(callbacks.quits.load(Ordering::SeqCst), 1);
        assert_eq!(client.exit_code(), Some(crate::nsm::EXIT_OK));

        // a second signal does nothing
        close_on(client.clone(), async {}).await;
        assert_eq!(callbacks.quits.load(Ordering::SeqCst), 1);
    }
}
