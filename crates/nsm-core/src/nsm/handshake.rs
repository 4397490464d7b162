//! Announce/welcome handshake bookkeeping

use crate::error::NsmError;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Outcome delivered by the listener when the welcome (or a rejection) arrives
pub type WelcomeOutcome = std::result::Result<(), NsmError>;

/// Sending half kept by the engine until the welcome arrives
pub type WelcomeSender = oneshot::Sender<WelcomeOutcome>;

/// The window between sending announce and receiving welcome.
#[derive(Debug)]
pub struct PendingHandshake {
    pub started_at: Instant,
    pub timeout: Duration,
    welcome_rx: oneshot::Receiver<WelcomeOutcome>,
}

impl PendingHandshake {
    pub fn new(timeout: Duration) -> (Self, WelcomeSender) {
        let (tx, welcome_rx) = oneshot::channel();
        let pending = Self {
            started_at: Instant::now(),
            timeout,
            welcome_rx,
        };
        (pending, tx)
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.timeout
    }

    /// Wait for the welcome until the deadline passes.
    ///
    /// A dropped sender means the engine began shutting down before the
    /// handshake completed.
    pub async fn wait(self) -> WelcomeOutcome {
        let deadline = tokio::time::Instant::from_std(self.deadline());
        match tokio::time::timeout_at(deadline, self.welcome_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(NsmError::HandshakeAborted),
            Err(_) => Err(NsmError::HandshakeTimeout {
                timeout: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_welcome_completes_handshake() {
        let (pending, tx) = PendingHandshake::new(Duration::from_secs(5));
        tx.send(Ok(())).unwrap();
        tokio_test::assert_ok!(pending.wait().await);
    }

    #[tokio::test]
    async fn test_timeout_after_deadline() {
        let timeout = Duration::from_millis(150);
        let (pending, _tx) = PendingHandshake::new(timeout);
        let started = pending.started_at;

        let result = pending.wait().await;

        assert!(matches!(result, Err(NsmError::HandshakeTimeout { timeout: t }) if t == timeout));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test]
    async fn test_dropped_sender_aborts() {
        let (pending, tx) = PendingHandshake::new(Duration::from_secs(5));
        drop(tx);
        assert!(matches!(pending.wait().await, Err(NsmError::HandshakeAborted)));
    }

    #[tokio::test]
    async fn test_rejection_is_passed_through() {
        let (pending, tx) = PendingHandshake::new(Duration::from_secs(5));
        tx.send(Err(NsmError::AnnounceRejected {
            code: -3,
            message: "blacklisted".to_string(),
        }))
        .unwrap();

        assert!(matches!(
            pending.wait().await,
            Err(NsmError::AnnounceRejected { code: -3, .. })
        ));
    }

    #[test]
    fn test_deadline() {
        let (pending, _tx) = PendingHandshake::new(Duration::from_secs(5));
        assert_eq!(pending.deadline() - pending.started_at, Duration::from_secs(5));
    }
}
