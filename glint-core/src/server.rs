//! WebSocket listener: accepts viewer connections and spawns sessions.
//!
//! `start` is idempotent: a second call notifies instead of binding
//! twice. `stop` is best-effort all the way down: every cleanup step is
//! individually guarded and it never fails.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::CaptureEngine;
use crate::error::GlintError;
use crate::ports::SessionPorts;
use crate::session::Session;

// ── ServerConfig ─────────────────────────────────────────────────

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind. Port 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

// ── ShareServer ──────────────────────────────────────────────────

/// Active sessions by id; each session removes itself on exit.
type SessionRegistry = Arc<StdMutex<HashMap<u64, JoinHandle<()>>>>;

struct Running {
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    sessions: SessionRegistry,
    local_addr: SocketAddr,
}

/// The screen-share listener. One per process, owned by the host.
pub struct ShareServer {
    engine: CaptureEngine,
    ports: SessionPorts,
    config: ServerConfig,
    state: Mutex<Option<Running>>,
}

impl ShareServer {
    pub fn new(engine: CaptureEngine, ports: SessionPorts, config: ServerConfig) -> Self {
        Self {
            engine,
            ports,
            config,
            state: Mutex::new(None),
        }
    }

    /// Whether the listener is currently accepting connections.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Bind on `address` and start accepting viewers. Returns the
    /// bound socket address. When already running, emits an
    /// "already running" notification and returns the existing address
    /// without opening a second listener. A bind failure propagates
    /// and leaves the server not running.
    pub async fn start(&self, address: &str) -> Result<SocketAddr, GlintError> {
        let mut state = self.state.lock().await;
        if let Some(running) = state.as_ref() {
            self.ports.ui.notify("server is already running");
            info!(addr = %running.local_addr, "start ignored, server is already running");
            return Ok(running.local_addr);
        }

        let listener = TcpListener::bind((address, self.config.port)).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let sessions: SessionRegistry = Arc::new(StdMutex::new(HashMap::new()));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.engine.clone(),
            self.ports.clone(),
            shutdown.clone(),
            sessions.clone(),
        ));

        self.ports
            .ui
            .notify(&format!("server started at http://{address}:{}", local_addr.port()));
        info!(addr = %local_addr, "share server listening");

        *state = Some(Running {
            shutdown,
            accept_task,
            sessions,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Stop accepting and tear down every active session. Never fails;
    /// a failure in any cleanup step is logged and the remaining steps
    /// still run. Idempotent.
    pub async fn stop(&self) {
        let running = self.state.lock().await.take();
        let Some(running) = running else {
            return;
        };

        // Cancelling closes the acceptor and every session's channel.
        running.shutdown.cancel();
        running.accept_task.abort();

        // Lingering sessions are torn down directly; each step is
        // individually best-effort.
        let stragglers: Vec<(u64, JoinHandle<()>)> = match running.sessions.lock() {
            Ok(mut sessions) => sessions.drain().collect(),
            Err(poisoned) => poisoned.into_inner().drain().collect(),
        };
        for (id, handle) in stragglers {
            warn!(session = id, "aborting session during stop");
            handle.abort();
        }

        if let Err(e) = self.ports.ui.dispose_panel() {
            warn!(error = %e, "panel dispose failed during stop");
        }

        info!("WebSocket server closed.");
    }
}

// ── Accept loop ──────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    engine: CaptureEngine,
    ports: SessionPorts,
    shutdown: CancellationToken,
    sessions: SessionRegistry,
) {
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = next_id;
                    next_id += 1;
                    info!(session = id, peer = %peer, "viewer connecting");

                    let engine = engine.clone();
                    let ports = ports.clone();
                    let session_shutdown = shutdown.child_token();
                    let registry = sessions.clone();
                    let handle = tokio::spawn(async move {
                        match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws) => {
                                Session::new(id, engine, ports)
                                    .run(ws, session_shutdown)
                                    .await;
                            }
                            Err(e) => {
                                warn!(session = id, error = %e, "websocket upgrade failed");
                            }
                        }
                        if let Ok(mut registry) = registry.lock() {
                            registry.remove(&id);
                        }
                    });
                    if let Ok(mut registry) = sessions.lock() {
                        registry.insert(id, handle);
                    }
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
