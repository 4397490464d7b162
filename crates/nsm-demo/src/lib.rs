//! NSM demo client
//!
//! Keeps a small JSON document inside the directory the session manager
//! assigns to it. Open creates or loads the document, save writes it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nsm_core::{CallbackError, ErrorCode, OpenRequest, SessionClient};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// File name of the document inside the session directory
pub const DOCUMENT_FILE: &str = "document.json";

/// Session data persisted by the demo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoDocument {
    pub client_id: String,
    pub session_name: String,
    pub notes: Vec<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

/// `SessionClient` implementation backing the demo binary
#[derive(Default)]
pub struct DemoClient {
    document: Mutex<DemoDocument>,
    gui_visible: AtomicBool,
}

impl DemoClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> DemoDocument {
        self.document.lock().clone()
    }

    pub fn add_note(&self, note: impl Into<String>) {
        self.document.lock().notes.push(note.into());
    }

    pub fn is_gui_visible(&self) -> bool {
        self.gui_visible.load(Ordering::SeqCst)
    }

    fn load(path: &Path) -> Result<DemoDocument, CallbackError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CallbackError::new(
                ErrorCode::BadProject,
                format!("{} is not a demo document: {}", path.display(), e),
            )
        })
    }
}

#[async_trait]
impl SessionClient for DemoClient {
    async fn open_session(&self, request: &OpenRequest) -> Result<String, CallbackError> {
        let dir = PathBuf::from(&request.path_prefix);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(DOCUMENT_FILE);
        let mut document = if path.exists() {
            debug!("Loading {}", path.display());
            Self::load(&path)?
        } else {
            info!("Creating new document in {}", dir.display());
            DemoDocument::default()
        };
        document.client_id = request.client_id.clone();
        document.session_name = request.session_name.clone();

        *self.document.lock() = document;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn save_session(&self, session_path: &str) -> Result<(), CallbackError> {
        let content = {
            let mut document = self.document.lock();
            document.saved_at = Some(Utc::now());
            serde_json::to_string_pretty(&*document)
                .map_err(|e| CallbackError::general(e.to_string()))?
        };
        std::fs::write(session_path, content)?;
        debug!("Saved {}", session_path);
        Ok(())
    }

    async fn show_gui(&self) -> bool {
        self.gui_visible.store(true, Ordering::SeqCst);
        true
    }

    async fn hide_gui(&self) -> bool {
        self.gui_visible.store(false, Ordering::SeqCst);
        true
    }

    async fn session_loaded(&self) {
        info!("All clients in the session are loaded");
    }

    async fn quit(&self) {
        info!("Demo client quitting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn request(dir: &Path) -> OpenRequest {
        OpenRequest::new(
            dir.join("NsmDemo.nABCD").to_string_lossy(),
            "sess",
            "NsmDemo.nABCD",
        )
    }

    #[tokio::test]
    async fn test_open_creates_session_directory() {
        let temp = TempDir::new().unwrap();
        let client = DemoClient::new();
        let request = request(temp.path());

        let file = client.open_session(&request).await.unwrap();

        assert!(file.starts_with(&request.path_prefix));
        assert!(file.ends_with(DOCUMENT_FILE));
        assert!(Path::new(&request.path_prefix).is_dir());
        assert_eq!(client.document().client_id, "NsmDemo.nABCD");
    }

    #[tokio::test]
    async fn test_save_then_reopen() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());

        let client = DemoClient::new();
        let file = client.open_session(&request).await.unwrap();
        client.add_note("first take");
        client.save_session(&file).await.unwrap();

        let reopened = DemoClient::new();
        reopened.open_session(&request).await.unwrap();
        let document = reopened.document();
        assert_eq!(document.notes, vec!["first take".to_string()]);
        assert!(document.saved_at.is_some());
    }

    #[tokio::test]
    async fn test_open_corrupt_document() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());
        std::fs::create_dir_all(&request.path_prefix).unwrap();
        std::fs::write(Path::new(&request.path_prefix).join(DOCUMENT_FILE), "{ nope").unwrap();

        let err = DemoClient::new().open_session(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BadProject);
    }

    #[tokio::test]
    async fn test_save_to_missing_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone").join(DOCUMENT_FILE);

        let err = DemoClient::new()
            .save_session(&path.to_string_lossy())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoSuchFile);
    }

    #[tokio::test]
    async fn test_gui_toggles() {
        let client = DemoClient::new();
        assert!(client.show_gui().await);
        assert!(client.is_gui_visible());
        assert!(client.hide_gui().await);
        assert!(!client.is_gui_visible());
    }
}
