//! Ports: narrow interfaces to the external collaborators the core
//! consumes but does not implement.
//!
//! The editor command layer, file uploads, AI chat, the webview UI,
//! and the credential store all live behind these traits so the engine
//! and sessions stay testable with recording fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GlintError;
use crate::input::InputInjector;

// ── Command predicate ────────────────────────────────────────────

/// Whole-string command vocabulary (matched case-insensitively after
/// trimming).
const COMMAND_WORDS: &[&str] = &[
    "undo",
    "redo",
    "save",
    "copy",
    "paste",
    "cut",
    "select all",
    "find",
    "enter",
    "escape",
    "backspace",
    "delete",
    "tab",
];

/// Command prefixes (matched case-insensitively).
const COMMAND_PREFIXES: &[&str] = &[
    "type ",
    "keytap ",
    "go to line",
    "open file",
    "search",
    "replace",
    "@cline",
];

/// Whether `text` is routed to the command port rather than treated as
/// an opaque upload.
pub fn is_supported_command(text: &str) -> bool {
    let t = text.trim().to_ascii_lowercase();
    COMMAND_WORDS.contains(&t.as_str()) || COMMAND_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ── Port traits ──────────────────────────────────────────────────

/// The editor-integration command layer.
#[async_trait]
pub trait CommandPort: Send + Sync {
    /// Execute a command string on behalf of session `session_id`.
    async fn handle_command(&self, text: &str, session_id: u64) -> Result<(), GlintError>;
}

/// Receives opaque binary payloads that are not protocol envelopes or
/// commands.
#[async_trait]
pub trait FileUploadPort: Send + Sync {
    async fn handle(&self, data: Vec<u8>, session_id: u64) -> Result<(), GlintError>;
}

/// The AI-chat fallback for free-form text messages.
#[async_trait]
pub trait AiChatPort: Send + Sync {
    async fn chat(&self, text: &str, api_key: &str) -> Result<String, GlintError>;
}

/// The host editor's UI surface: webview messages, user notifications,
/// and the optional panel torn down on server stop.
pub trait EditorUiPort: Send + Sync {
    /// Post a structured message to the editor webview.
    fn post_message(&self, message: serde_json::Value);

    /// Show a user-visible notification.
    fn notify(&self, text: &str);

    /// Dispose the UI panel if one is registered. Best-effort; the
    /// caller guards against failure.
    fn dispose_panel(&self) -> Result<(), GlintError>;
}

/// Credential store for the AI-chat API key.
pub trait SecretStore: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

// ── SessionPorts ─────────────────────────────────────────────────

/// The full port bundle handed to every session.
#[derive(Clone)]
pub struct SessionPorts {
    pub input: Arc<dyn InputInjector>,
    pub commands: Arc<dyn CommandPort>,
    pub uploads: Arc<dyn FileUploadPort>,
    pub chat: Arc<dyn AiChatPort>,
    pub ui: Arc<dyn EditorUiPort>,
    pub secrets: Arc<dyn SecretStore>,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_matches_whole_string() {
        assert!(is_supported_command("undo"));
        assert!(is_supported_command("  Save  "));
        assert!(is_supported_command("SELECT ALL"));
        assert!(!is_supported_command("undone"));
    }

    #[test]
    fn prefixes_match() {
        assert!(is_supported_command("type hello world"));
        assert!(is_supported_command("Keytap enter"));
        assert!(is_supported_command("go to line 42"));
        assert!(is_supported_command("open file src/main.rs"));
        assert!(is_supported_command("search needle"));
        assert!(is_supported_command("replace foo with bar"));
        assert!(is_supported_command("@cline explain this"));
    }

    #[test]
    fn arbitrary_text_is_not_a_command() {
        assert!(!is_supported_command("hello there"));
        assert!(!is_supported_command(""));
        assert!(!is_supported_command("{\"type\":\"mystery\"}"));
    }
}
