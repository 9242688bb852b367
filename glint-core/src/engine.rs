//! The adaptive capture engine: sampler loop → dedup → coalesce →
//! encode → chunk → fan-out.
//!
//! The engine is an actor. One spawned task owns every piece of
//! mutable state (quality config, metrics, subscriber list, memory
//! accountant, pending frames) and processes commands from a channel,
//! so sampling, coalescing, emission, and quality review are all
//! serialized. Only the pixel work (decode / resize / JPEG) leaves the
//! actor, via `spawn_blocking`; its result comes back through the same
//! command channel.
//!
//! ```text
//! sample tick ──► dedup ──► pending ──► coalesce timer ──► encode
//!                                                            │
//! subscribers ◄── chunk? ◄── emit ◄──────────────────────────┘
//! ```
//!
//! The sampler runs iff at least one subscriber exists. At most one
//! frame is being encoded at any instant.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::codec::{FrameCodec, ResizeFilter};
use crate::controller::{self, ControllerInputs, QualityUpdate, PERFORMANCE_CHECK_INTERVAL};
use crate::error::GlintError;
use crate::memory::MemoryAccountant;
use crate::metrics::{frame_digest, StreamMetrics};
use crate::profile::{select_profile, DisplayProfile, QualityConfig, MIN_JPEG_QUALITY};
use crate::source::ScreenSource;
use crate::types::{ChunkedFrame, EncodedFrame, FrameUpdate, RawFrame, ScaledDims, ScreenSize};

// ── Cadence constants ────────────────────────────────────────────

/// Base sampling interval (~30 fps ceiling).
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(33);
/// Base interval for 4K-and-above displays (~20 fps ceiling).
const HIGH_RES_INTERVAL: Duration = Duration::from_millis(50);
/// Base interval for QHD-class displays (~25 fps ceiling).
const MID_RES_INTERVAL: Duration = Duration::from_millis(40);
/// Longest a pending frame waits before being encoded.
pub const COALESCE_MAX_WAIT: Duration = Duration::from_millis(100);
/// Emitted frame bytes are released from the accountant this long
/// after emission.
const RELEASE_DELAY: Duration = Duration::from_secs(1);
/// Cadence of the performance log tick (which resets the drop/sent
/// counters).
const STATS_INTERVAL: Duration = Duration::from_secs(1);
/// Per-subscriber delivery queue depth; a full queue drops the frame
/// for that subscriber instead of blocking the engine.
const SUBSCRIBER_QUEUE: usize = 8;

// ── Public handle ────────────────────────────────────────────────

/// Identifies one subscriber registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Cheaply cloneable handle to the engine actor. Sessions reach all
/// engine state exclusively through this.
#[derive(Clone)]
pub struct CaptureEngine {
    cmd_tx: mpsc::Sender<EngineCmd>,
    screen: ScreenSize,
}

/// A live subscription: frames arrive on `next()`, and the
/// subscription unsubscribes itself on drop (explicit `unsubscribe` is
/// idempotent).
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<FrameUpdate>,
    cmd_tx: mpsc::Sender<EngineCmd>,
    active: bool,
}

/// Point-in-time view of engine state, for status surfaces and tests.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub config: QualityConfig,
    pub scaled: ScaledDims,
    pub subscriber_count: usize,
    pub frames_sent: u64,
    pub dropped_frames: u64,
    pub in_flight_bytes: u64,
    pub pressure: bool,
    pub running: bool,
}

type EncodeResult = Result<Vec<u8>, GlintError>;

enum EngineCmd {
    Subscribe {
        reply: oneshot::Sender<(SubscriptionId, mpsc::Receiver<FrameUpdate>)>,
    },
    Unsubscribe(SubscriptionId),
    UpdateQuality {
        update: QualityUpdate,
        reply: Option<oneshot::Sender<bool>>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    /// Posted by the blocking encode task when it finishes.
    EncodeDone(EncodeResult),
    Shutdown,
}

impl CaptureEngine {
    /// Spawn the engine actor around `source`. The screen size is read
    /// once, here. Must be called from within a Tokio runtime.
    pub fn spawn(source: Box<dyn ScreenSource>, codec: FrameCodec) -> Self {
        let screen = source.size();
        let profile = select_profile(screen.width);
        let config = QualityConfig::from_profile(profile);
        info!(
            profile = profile.name,
            width = screen.width,
            height = screen.height,
            "capture engine initialized"
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let actor = EngineActor {
            source,
            codec,
            screen,
            profile,
            scaled: config.scaled_dims(screen),
            config,
            metrics: StreamMetrics::new(),
            accountant: MemoryAccountant::new(),
            subscribers: Vec::new(),
            next_sub_id: 0,
            pending: Vec::new(),
            adaptive_interval: MIN_FRAME_INTERVAL,
            encoding: false,
            encode_started: Instant::now(),
            encode_dims: config.scaled_dims(screen),
            sample_at: None,
            coalesce_at: None,
            stats_at: None,
            last_review: Instant::now(),
            releases: VecDeque::new(),
            cmd_tx: cmd_tx.clone(),
        };
        tokio::spawn(actor.run(cmd_rx));

        Self { cmd_tx, screen }
    }

    /// Real display dimensions, read once at engine creation.
    pub fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    /// Register a subscriber. The first subscription starts the
    /// sampler loop.
    pub async fn subscribe(&self) -> Result<Subscription, GlintError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(EngineCmd::Subscribe { reply }).await?;
        let (id, frames) = rx.await.map_err(|_| GlintError::EngineClosed)?;
        Ok(Subscription {
            id,
            rx: frames,
            cmd_tx: self.cmd_tx.clone(),
            active: true,
        })
    }

    /// Apply an external quality update. Returns whether any field was
    /// accepted. Applied before the next sample tick.
    pub async fn update_quality(&self, update: QualityUpdate) -> Result<bool, GlintError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCmd::UpdateQuality {
                update,
                reply: Some(reply),
            })
            .await?;
        rx.await.map_err(|_| GlintError::EngineClosed)
    }

    /// Current engine state.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, GlintError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(EngineCmd::Snapshot { reply }).await?;
        rx.await.map_err(|_| GlintError::EngineClosed)
    }

    /// Stop the actor. Safe to call at any point; subsequent commands
    /// fail with [`GlintError::EngineClosed`].
    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Shutdown).await;
    }
}

impl Subscription {
    /// Receive the next frame, or `None` once unsubscribed / engine
    /// stopped.
    pub async fn next(&mut self) -> Option<FrameUpdate> {
        self.rx.recv().await
    }

    /// Remove this subscriber. Idempotent.
    pub async fn unsubscribe(&mut self) {
        if self.active {
            self.active = false;
            let _ = self.cmd_tx.send(EngineCmd::Unsubscribe(self.id)).await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.active {
            let _ = self.cmd_tx.try_send(EngineCmd::Unsubscribe(self.id));
        }
    }
}

// ── Singleton ────────────────────────────────────────────────────

static ENGINE: Mutex<Option<CaptureEngine>> = Mutex::new(None);

/// Initialize the process-wide engine. Fails if one already exists;
/// sessions must never construct a second engine.
pub fn initialize(source: Box<dyn ScreenSource>) -> Result<CaptureEngine, GlintError> {
    let mut slot = ENGINE.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        return Err(GlintError::AlreadyInitialized);
    }
    let engine = CaptureEngine::spawn(source, FrameCodec::new());
    *slot = Some(engine.clone());
    Ok(engine)
}

/// The process-wide engine, if initialized.
pub fn global() -> Result<CaptureEngine, GlintError> {
    ENGINE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or(GlintError::NotInitialized)
}

/// Tear down the process-wide engine so tests (and restarts) get a
/// clean slate.
pub async fn shutdown() {
    let engine = ENGINE.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(engine) = engine {
        engine.stop().await;
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<FrameUpdate>,
}

struct EngineActor {
    source: Box<dyn ScreenSource>,
    codec: FrameCodec,
    screen: ScreenSize,
    profile: &'static DisplayProfile,
    config: QualityConfig,
    scaled: ScaledDims,
    metrics: StreamMetrics,
    accountant: MemoryAccountant,
    subscribers: Vec<Subscriber>,
    next_sub_id: u64,
    /// Raw frames sampled since the last encode; coalescing keeps only
    /// the most recent.
    pending: Vec<RawFrame>,
    adaptive_interval: Duration,
    /// True while a blocking encode is in flight.
    encoding: bool,
    encode_started: Instant,
    encode_dims: ScaledDims,
    sample_at: Option<Instant>,
    coalesce_at: Option<Instant>,
    stats_at: Option<Instant>,
    last_review: Instant,
    /// Delayed accountant releases: `(due, bytes)` in emission order.
    releases: VecDeque<(Instant, u64)>,
    /// Self-handle for the encode task to post its result back.
    cmd_tx: mpsc::Sender<EngineCmd>,
}

impl EngineActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<EngineCmd>) {
        loop {
            let deadline = self.next_deadline();
            let timer_at = tokio::time::Instant::from_std(
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
            );

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => match cmd {
                    None | Some(EngineCmd::Shutdown) => break,
                    Some(cmd) => self.handle_cmd(cmd),
                },

                _ = tokio::time::sleep_until(timer_at), if deadline.is_some() => {
                    self.on_deadline().await;
                },
            }
        }

        self.flush_releases();
        debug!("capture engine stopped");
    }

    // ── Command handling ─────────────────────────────────────────

    fn handle_cmd(&mut self, cmd: EngineCmd) {
        match cmd {
            EngineCmd::Subscribe { reply } => {
                let id = SubscriptionId(self.next_sub_id);
                self.next_sub_id += 1;
                let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
                self.subscribers.push(Subscriber { id, tx });
                if self.subscribers.len() == 1 {
                    self.start_sampling();
                }
                debug!(id = id.0, total = self.subscribers.len(), "subscriber added");
                let _ = reply.send((id, rx));
            }
            EngineCmd::Unsubscribe(id) => {
                let before = self.subscribers.len();
                self.subscribers.retain(|s| s.id != id);
                if self.subscribers.len() < before {
                    debug!(id = id.0, total = self.subscribers.len(), "subscriber removed");
                }
                if self.subscribers.is_empty() && before > 0 {
                    self.stop_sampling();
                }
            }
            EngineCmd::UpdateQuality { update, reply } => {
                let applied = controller::apply_update(&mut self.config, &update);
                if applied {
                    self.scaled = self.config.scaled_dims(self.screen);
                    self.metrics.reset_window();
                    info!(
                        width = self.config.width,
                        quality = self.config.jpeg_quality,
                        fps = self.config.fps,
                        "quality updated by viewer"
                    );
                }
                if let Some(reply) = reply {
                    let _ = reply.send(applied);
                }
            }
            EngineCmd::Snapshot { reply } => {
                let _ = reply.send(EngineSnapshot {
                    config: self.config,
                    scaled: self.scaled,
                    subscriber_count: self.subscribers.len(),
                    frames_sent: self.metrics.frames_sent,
                    dropped_frames: self.metrics.dropped_frames,
                    in_flight_bytes: self.accountant.total(),
                    pressure: self.accountant.pressure(),
                    running: !self.subscribers.is_empty(),
                });
            }
            EngineCmd::EncodeDone(result) => self.finish_encode(result),
            EngineCmd::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn start_sampling(&mut self) {
        let now = Instant::now();
        self.sample_at = Some(now);
        self.stats_at = Some(now + STATS_INTERVAL);
        self.last_review = now;
        info!("sampler started");
    }

    /// Stop transition: cancel timers, discard pending work, reset
    /// metrics, and flush outstanding delayed releases. Safe from any
    /// substate.
    fn stop_sampling(&mut self) {
        self.sample_at = None;
        self.coalesce_at = None;
        self.stats_at = None;
        self.pending.clear();
        self.metrics.reset();
        self.flush_releases();
        info!("sampler stopped, no subscribers remain");
    }

    fn flush_releases(&mut self) {
        while let Some((_, bytes)) = self.releases.pop_front() {
            self.accountant.release(bytes);
        }
    }

    // ── Timers ───────────────────────────────────────────────────

    fn next_deadline(&self) -> Option<Instant> {
        let mut next: Option<Instant> = None;
        let mut consider = |at: Option<Instant>| {
            if let Some(at) = at {
                next = Some(next.map_or(at, |n| n.min(at)));
            }
        };
        consider(self.sample_at);
        consider(self.coalesce_at);
        consider(self.stats_at);
        consider(self.releases.front().map(|(at, _)| *at));
        next
    }

    async fn on_deadline(&mut self) {
        let now = Instant::now();

        while let Some(&(at, bytes)) = self.releases.front() {
            if at > now {
                break;
            }
            self.releases.pop_front();
            self.accountant.release(bytes);
        }

        if self.stats_at.is_some_and(|at| at <= now) {
            self.stats_at = Some(now + STATS_INTERVAL);
            if self.metrics.frames_sent > 0 || self.metrics.dropped_frames > 0 {
                debug!(
                    sent = self.metrics.frames_sent,
                    dropped = self.metrics.dropped_frames,
                    in_flight = self.accountant.total(),
                    "stream stats"
                );
            }
            self.metrics.reset_counters();
        }

        if self.coalesce_at.is_some_and(|at| at <= now) {
            self.coalesce_at = None;
            if !self.encoding {
                self.start_encode();
            }
            // Encoder busy: finish_encode re-arms from the pending
            // buffer once it completes.
        }

        if self.sample_at.is_some_and(|at| at <= now) {
            self.sample().await;
            let fps_interval = Duration::from_millis(1000 / self.config.fps.max(1) as u64);
            self.sample_at = Some(Instant::now() + self.adaptive_interval.max(fps_interval));
        }
    }

    // ── Sampling ─────────────────────────────────────────────────

    /// Recompute the adaptive interval from resolution, pressure, and
    /// observed encode time.
    fn refresh_adaptive_interval(&mut self) {
        let mut base = if self.screen.width >= 3840 {
            HIGH_RES_INTERVAL
        } else if self.screen.width >= 2560 {
            MID_RES_INTERVAL
        } else {
            MIN_FRAME_INTERVAL
        };
        if self.accountant.pressure() {
            base = base.mul_f64(1.5);
        }
        let avg = self.metrics.avg_processing();
        if avg > base.mul_f64(0.7) {
            base = base.max(avg.mul_f64(1.2));
        }
        self.adaptive_interval = base;
    }

    async fn sample(&mut self) {
        self.refresh_adaptive_interval();

        let elapsed = self
            .metrics
            .last_sent_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::MAX);
        let pressure = self.accountant.pressure();

        let skip = self.encoding
            || elapsed < self.adaptive_interval
            || (pressure && elapsed < self.adaptive_interval.mul_f64(1.5));
        if skip {
            self.metrics.dropped_frames += 1;
            return;
        }

        let raw = match self.source.capture().await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "screen capture failed");
                return;
            }
        };

        let digest = frame_digest(&raw.data);
        if self.metrics.last_frame_hash == Some(digest) {
            self.metrics.dropped_frames += 1;
            return;
        }
        self.metrics.last_frame_hash = Some(digest);

        self.pending.push(raw);
        if self.coalesce_at.is_none() {
            self.coalesce_at = Some(Instant::now() + COALESCE_MAX_WAIT);
        }
    }

    // ── Encode & emit ────────────────────────────────────────────

    fn start_encode(&mut self) {
        // Coalesce: most recent pending frame wins, the rest are stale.
        let Some(raw) = self.pending.pop() else {
            return;
        };
        self.pending.clear();

        let target = self.scaled;
        let quality = self.effective_quality();
        let filter = if self.metrics.avg_processing() > MIN_FRAME_INTERVAL.mul_f64(0.8) {
            ResizeFilter::Nearest
        } else {
            ResizeFilter::Bilinear
        };

        self.encoding = true;
        self.encode_started = Instant::now();
        self.encode_dims = target;
        let codec = self.codec;
        let done = self.cmd_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = codec.process(&raw, target, filter, quality);
            // Receiver gone means the engine stopped; nothing to do.
            let _ = done.blocking_send(EngineCmd::EncodeDone(result));
        });
    }

    /// Base quality, dropped by 10 (floored at the minimum) while the
    /// high-motion heuristic holds.
    fn effective_quality(&self) -> u8 {
        if self.metrics.high_motion(MIN_FRAME_INTERVAL) {
            self.config
                .jpeg_quality
                .saturating_sub(10)
                .max(MIN_JPEG_QUALITY)
        } else {
            self.config.jpeg_quality
        }
    }

    fn finish_encode(&mut self, result: EncodeResult) {
        let elapsed = self.encode_started.elapsed();
        self.encoding = false;

        match result {
            Ok(jpeg) => {
                let frame = EncodedFrame {
                    data: Bytes::from(jpeg),
                    dims: self.encode_dims,
                };
                self.emit(frame, elapsed);
            }
            Err(e) => {
                error!(error = %e, "frame encode failed");
            }
        }

        // Frames that arrived during the encode get a short coalesce
        // window instead of the full wait.
        if !self.pending.is_empty() {
            let wait = COALESCE_MAX_WAIT.min(self.adaptive_interval);
            self.coalesce_at = Some(Instant::now() + wait);
        }
    }

    fn emit(&mut self, frame: EncodedFrame, elapsed: Duration) {
        let size = frame.size();
        let update = if size / 1024 > self.profile.max_frame_kb {
            FrameUpdate::Chunked(ChunkedFrame::split(&frame))
        } else {
            FrameUpdate::Full(frame)
        };

        // Sequential fan-out in subscription order. try_send keeps a
        // slow subscriber from ever blocking the engine.
        for sub in &self.subscribers {
            match sub.tx.try_send(update.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(id = sub.id.0, "subscriber queue full, frame dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(id = sub.id.0, "subscriber channel closed");
                }
            }
        }

        let now = Instant::now();
        self.metrics.frames_sent += 1;
        self.metrics.last_sent_at = Some(now);
        self.metrics.record_processing(elapsed);
        self.accountant.add(size as u64);
        self.releases.push_back((now + RELEASE_DELAY, size as u64));

        if self.last_review.elapsed() >= PERFORMANCE_CHECK_INTERVAL {
            self.last_review = now;
            self.review_quality();
        }
    }

    fn review_quality(&mut self) {
        let inputs = ControllerInputs {
            avg_processing: self.metrics.avg_processing(),
            adaptive_interval: self.adaptive_interval,
            drop_rate: self.metrics.drop_rate(),
            pressure: self.accountant.pressure(),
            high_res: self.screen.is_high_res(),
        };
        let action = controller::decide(&inputs);
        if controller::apply(action, &mut self.config, self.profile, inputs.high_res) {
            self.scaled = self.config.scaled_dims(self.screen);
            info!(
                action = ?action,
                width = self.config.width,
                quality = self.config.jpeg_quality,
                "quality adjusted"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameEncoding;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Synthetic source: reports an arbitrary screen size and serves
    /// small PNG frames. `distinct` controls whether consecutive
    /// frames differ.
    struct TestSource {
        size: ScreenSize,
        distinct: bool,
        counter: Arc<AtomicU32>,
    }

    impl TestSource {
        fn new(size: ScreenSize, distinct: bool) -> Self {
            Self {
                size,
                distinct,
                counter: Arc::new(AtomicU32::new(0)),
            }
        }

        fn png(tint: u8) -> Vec<u8> {
            let img = RgbImage::from_fn(64, 36, |x, _| image::Rgb([tint, (x % 256) as u8, 64]));
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, image::ImageFormat::Png)
                .unwrap();
            buf.into_inner()
        }
    }

    #[async_trait]
    impl ScreenSource for TestSource {
        fn size(&self) -> ScreenSize {
            self.size
        }

        async fn capture(&mut self) -> Result<RawFrame, GlintError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let tint = if self.distinct { (n % 251) as u8 } else { 7 };
            Ok(RawFrame::new(64, 36, FrameEncoding::Png, Self::png(tint)))
        }
    }

    fn engine_with(distinct: bool) -> CaptureEngine {
        let source = TestSource::new(ScreenSize::new(1920, 1080), distinct);
        CaptureEngine::spawn(Box::new(source), FrameCodec::new())
    }

    async fn recv_frame(sub: &mut Subscription) -> FrameUpdate {
        tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn first_subscriber_starts_the_sampler() {
        let engine = engine_with(true);
        assert!(!engine.snapshot().await.unwrap().running);

        let mut sub = engine.subscribe().await.unwrap();
        assert!(engine.snapshot().await.unwrap().running);

        let update = recv_frame(&mut sub).await;
        let dims = update.dims();
        // FHD profile: 1440-wide stream on a 1920x1080 screen.
        assert_eq!(dims.width, 1440);
        assert_eq!(dims.height, 810);

        sub.unsubscribe().await;
        engine.stop().await;
    }

    #[tokio::test]
    async fn identical_frames_are_deduplicated() {
        let engine = engine_with(false);
        let mut sub = engine.subscribe().await.unwrap();

        // The first frame always goes through.
        let _ = recv_frame(&mut sub).await;

        // Every later sample hashes identically and is dropped; no
        // second frame may arrive.
        let second = tokio::time::timeout(Duration::from_millis(500), sub.next()).await;
        assert!(second.is_err(), "duplicate frame was not deduplicated");

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.frames_sent, 1);
        assert!(snap.dropped_frames >= 1);

        sub.unsubscribe().await;
        engine.stop().await;
    }

    #[tokio::test]
    async fn frames_fan_out_to_every_subscriber() {
        let engine = engine_with(true);
        let mut a = engine.subscribe().await.unwrap();
        let mut b = engine.subscribe().await.unwrap();
        assert_eq!(engine.snapshot().await.unwrap().subscriber_count, 2);

        let fa = recv_frame(&mut a).await;
        let fb = recv_frame(&mut b).await;
        assert_eq!(fa.dims(), fb.dims());

        a.unsubscribe().await;
        b.unsubscribe().await;
        engine.stop().await;
    }

    #[tokio::test]
    async fn last_unsubscribe_stops_and_resets() {
        let engine = engine_with(true);
        let mut sub = engine.subscribe().await.unwrap();
        let _ = recv_frame(&mut sub).await;

        sub.unsubscribe().await;
        // Idempotent: a second unsubscribe is a no-op.
        sub.unsubscribe().await;

        let snap = engine.snapshot().await.unwrap();
        assert!(!snap.running);
        assert_eq!(snap.subscriber_count, 0);
        assert_eq!(snap.frames_sent, 0);
        assert_eq!(snap.in_flight_bytes, 0, "delayed releases flushed");

        engine.stop().await;
    }

    #[tokio::test]
    async fn quality_updates_validate_per_field() {
        let engine = engine_with(true);

        let applied = engine
            .update_quality(QualityUpdate {
                width: Some(1024),
                jpeg_quality: Some(200), // out of range, rejected alone
                fps: Some(10),
            })
            .await
            .unwrap();
        assert!(applied);

        let snap = engine.snapshot().await.unwrap();
        assert_eq!(snap.config.width, 1024);
        assert_eq!(snap.config.jpeg_quality, 85);
        assert_eq!(snap.config.fps, 10);
        // Scaled dims track the new width.
        assert_eq!(snap.scaled.width, 1024);
        assert_eq!(snap.scaled.height, 576);

        // A fully out-of-range update applies nothing.
        let applied = engine
            .update_quality(QualityUpdate {
                width: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!applied);

        engine.stop().await;
    }

    #[tokio::test]
    async fn commands_fail_after_stop() {
        let engine = engine_with(true);
        engine.stop().await;
        // Let the actor drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn singleton_rejects_double_initialize() {
        let source = TestSource::new(ScreenSize::new(1920, 1080), true);
        let first = initialize(Box::new(source)).expect("first initialize");

        let source = TestSource::new(ScreenSize::new(1920, 1080), true);
        let second = initialize(Box::new(source));
        assert!(matches!(second, Err(GlintError::AlreadyInitialized)));

        shutdown().await;
        assert!(matches!(global(), Err(GlintError::NotInitialized)));

        // After shutdown a fresh initialize succeeds again.
        let source = TestSource::new(ScreenSize::new(1920, 1080), true);
        let third = initialize(Box::new(source)).expect("re-initialize after shutdown");
        shutdown().await;

        drop(first);
        drop(third);
    }
}
