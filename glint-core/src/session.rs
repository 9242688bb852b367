//! Per-viewer session: one WebSocket, one engine subscription.
//!
//! Outbound, the session serializes every delivered frame into textual
//! envelopes and writes them in order. Inbound, it classifies each
//! payload (input event, quality update, command, upload, or chat) and
//! dispatches through the ports. Application-level errors are caught
//! per message; the session only dies when its channel closes.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::CaptureEngine;
use crate::error::GlintError;
use crate::input::{ButtonState, MouseButton};
use crate::ports::SessionPorts;
use crate::protocol::{
    classify_binary, classify_text, map_to_display, ClientEnvelope, InboundAction,
    MouseEventType, ServerEnvelope, TextAction,
};
use crate::types::{FrameUpdate, ScreenSize};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// One viewer's context: engine handle, cached screen size, and the
/// ports its messages dispatch through.
pub struct Session {
    id: u64,
    screen: ScreenSize,
    engine: CaptureEngine,
    ports: SessionPorts,
}

impl Session {
    pub fn new(id: u64, engine: CaptureEngine, ports: SessionPorts) -> Self {
        let screen = engine.screen_size();
        Self {
            id,
            screen,
            engine,
            ports,
        }
    }

    /// Drive the session until the channel closes or `shutdown` fires.
    /// Subscribes on entry and always unsubscribes on the way out;
    /// disposal is idempotent.
    pub async fn run(self, ws: WebSocketStream<TcpStream>, shutdown: CancellationToken) {
        let mut subscription = match self.engine.subscribe().await {
            Ok(sub) => sub,
            Err(e) => {
                error!(session = self.id, error = %e, "subscribe failed, dropping session");
                return;
            }
        };

        let (mut sink, mut stream) = ws.split();
        info!(session = self.id, "viewer session started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                update = subscription.next() => match update {
                    Some(update) => {
                        if let Err(e) = write_update(&mut sink, &update).await {
                            warn!(session = self.id, error = %e, "frame write failed, closing");
                            break;
                        }
                    }
                    // Engine stopped; nothing left to stream.
                    None => break,
                },

                msg = stream.next() => match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if let Some(reply) = self.handle_binary(data).await {
                            let _ = write_envelope(&mut sink, &reply).await;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.handle_text(&text).await {
                            let _ = write_envelope(&mut sink, &reply).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong, handled by tungstenite
                    Some(Err(e)) => {
                        warn!(session = self.id, error = %e, "websocket read failed");
                        break;
                    }
                },
            }
        }

        subscription.unsubscribe().await;
        info!(session = self.id, "viewer session closed");
    }

    /// Handle a binary payload. Returns an error envelope to send back
    /// when a dispatch failed in a way the viewer should hear about.
    pub(crate) async fn handle_binary(&self, data: Vec<u8>) -> Option<ServerEnvelope> {
        match classify_binary(&data) {
            InboundAction::Envelope(envelope) => self.dispatch_envelope(envelope).await,
            InboundAction::Command(text) => {
                match self.ports.commands.handle_command(&text, self.id).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(session = self.id, error = %e, "command dispatch failed");
                        Some(ServerEnvelope::error(format!("command failed: {e}")))
                    }
                }
            }
            InboundAction::Upload(bytes) => {
                match self.ports.uploads.handle(bytes, self.id).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(session = self.id, error = %e, "upload handling failed");
                        Some(ServerEnvelope::error(format!("upload failed: {e}")))
                    }
                }
            }
        }
    }

    /// Handle a textual payload: quality updates apply directly, all
    /// other text is forwarded to the AI chat, with the reply posted to
    /// the editor webview.
    pub(crate) async fn handle_text(&self, text: &str) -> Option<ServerEnvelope> {
        match classify_text(text) {
            TextAction::Quality(update) => {
                match self.engine.update_quality(update).await {
                    Ok(applied) => {
                        debug!(session = self.id, applied, "quality update received");
                        None
                    }
                    Err(e) => {
                        error!(session = self.id, error = %e, "quality update failed");
                        Some(ServerEnvelope::error(format!("quality update failed: {e}")))
                    }
                }
            }
            TextAction::Chat(text) => {
                self.forward_to_chat(&text).await;
                None
            }
        }
    }

    async fn dispatch_envelope(&self, envelope: ClientEnvelope) -> Option<ServerEnvelope> {
        match envelope {
            ClientEnvelope::MouseEvent {
                x,
                y,
                event_type,
                screen_width,
                screen_height,
            } => {
                let Some((actual_x, actual_y)) =
                    map_to_display(x, y, screen_width, screen_height, self.screen)
                else {
                    error!(session = self.id, "mouse event with degenerate viewport");
                    return Some(ServerEnvelope::error("invalid mouse event viewport"));
                };

                let result = self
                    .ports
                    .input
                    .move_mouse(actual_x, actual_y)
                    .and_then(|()| match event_type {
                        MouseEventType::Down => self
                            .ports
                            .input
                            .toggle_mouse_button(ButtonState::Down, MouseButton::Left),
                        MouseEventType::Up => self
                            .ports
                            .input
                            .toggle_mouse_button(ButtonState::Up, MouseButton::Left),
                        MouseEventType::Move => Ok(()),
                    });

                match result {
                    Ok(()) => None,
                    Err(e) => {
                        error!(session = self.id, error = %e, "mouse injection failed");
                        Some(ServerEnvelope::error(format!("mouse event failed: {e}")))
                    }
                }
            }
            ClientEnvelope::KeyboardEvent { key, modifier } => {
                match self.ports.input.tap_key(&key, modifier.as_deref()) {
                    Ok(()) => None,
                    Err(e) => {
                        error!(session = self.id, error = %e, "key injection failed");
                        Some(ServerEnvelope::error(format!("keyboard event failed: {e}")))
                    }
                }
            }
            ClientEnvelope::QualityUpdate {
                width,
                jpeg_quality,
                fps,
            } => {
                let update = crate::controller::QualityUpdate {
                    width,
                    jpeg_quality,
                    fps,
                };
                if let Err(e) = self.engine.update_quality(update).await {
                    error!(session = self.id, error = %e, "quality update failed");
                }
                None
            }
        }
    }

    async fn forward_to_chat(&self, text: &str) {
        let Some(api_key) = self.ports.secrets.api_key() else {
            self.ports.ui.post_message(json!({
                "type": "error",
                "message": "AI chat is not configured: missing API key",
            }));
            return;
        };

        match self.ports.chat.chat(text, &api_key).await {
            Ok(reply) => self.ports.ui.post_message(json!({
                "type": "ai-chat-reply",
                "text": reply,
            })),
            Err(e) => {
                error!(session = self.id, error = %e, "ai chat failed");
                self.ports.ui.post_message(json!({
                    "type": "error",
                    "message": e.to_string(),
                }));
            }
        }
    }
}

// ── Outbound serialization ───────────────────────────────────────

async fn write_envelope(sink: &mut WsSink, envelope: &ServerEnvelope) -> Result<(), GlintError> {
    let text = envelope.to_json()?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Serialize one delivered frame: a single `screen-update`, or every
/// chunk envelope in index order.
async fn write_update(sink: &mut WsSink, update: &FrameUpdate) -> Result<(), GlintError> {
    match update {
        FrameUpdate::Full(frame) => {
            write_envelope(sink, &ServerEnvelope::screen_update(frame)).await
        }
        FrameUpdate::Chunked(chunked) => {
            for envelope in ServerEnvelope::screen_update_chunks(chunked) {
                write_envelope(sink, &envelope).await?;
            }
            Ok(())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
