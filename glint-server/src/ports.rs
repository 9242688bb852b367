//! Default port implementations wired by the binary.
//!
//! These keep the server usable stand-alone: commands and webview
//! messages are logged, uploads are spooled to disk, and AI chat
//! reports itself unconfigured until a backend is plugged in.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use glint_core::{AiChatPort, CommandPort, EditorUiPort, FileUploadPort, GlintError, SecretStore};

/// Logs accepted commands. A real deployment routes these into the
/// editor's command layer.
pub struct LoggingCommandPort;

#[async_trait]
impl CommandPort for LoggingCommandPort {
    async fn handle_command(&self, text: &str, session_id: u64) -> Result<(), GlintError> {
        info!(session = session_id, command = text, "command received");
        Ok(())
    }
}

/// Writes each upload to a numbered file under the spool directory.
pub struct SpoolUploadPort {
    dir: PathBuf,
    counter: AtomicU64,
}

impl SpoolUploadPort {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FileUploadPort for SpoolUploadPort {
    async fn handle(&self, data: Vec<u8>, session_id: u64) -> Result<(), GlintError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GlintError::Port(format!("spool dir: {e}")))?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("upload-{session_id}-{n}.bin"));
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| GlintError::Port(format!("spool write: {e}")))?;
        info!(session = session_id, path = %path.display(), bytes = data.len(), "upload spooled");
        Ok(())
    }
}

/// Placeholder chat backend; always reports itself unconfigured.
pub struct UnconfiguredChatPort;

#[async_trait]
impl AiChatPort for UnconfiguredChatPort {
    async fn chat(&self, _text: &str, _api_key: &str) -> Result<String, GlintError> {
        Err(GlintError::Port("AI chat backend is not configured".into()))
    }
}

/// Surfaces notifications and webview traffic through tracing.
pub struct TracingUiPort;

impl EditorUiPort for TracingUiPort {
    fn post_message(&self, message: serde_json::Value) {
        debug!(%message, "webview message");
    }

    fn notify(&self, text: &str) {
        info!("{text}");
    }

    fn dispose_panel(&self) -> Result<(), GlintError> {
        Ok(())
    }
}

/// Reads the chat API key from the environment.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn api_key(&self) -> Option<String> {
        std::env::var("GLINT_API_KEY").ok()
    }
}
