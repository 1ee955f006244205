use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    config::{CaptureConfig, ReplayConfig},
    collector::Collector,
    heatmap::normalize_tap,
    models::{Frame, NavigationEvent, ScrollEvent, SessionIdentity, TapEvent},
    sampling::should_sample,
};

use super::{
    clock::{Clock, MonotonicClock},
    screenshot::{CaptureTarget, FrameEncoder, Screenshotter},
    state::{
        CaptureOutcome, CaptureSnapshot, CaptureState, CaptureStatus, FlushOutcome, StartOutcome,
    },
    timers::{flush_loop, idle_watch, periodic_capture_loop},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Host application lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

enum Admission {
    /// Budget reserved for the given run.
    Proceed(u64),
    Skip(CaptureOutcome),
    CapReached,
}

struct EngineInner {
    config: CaptureConfig,
    sample_rate: f64,
    identity: SessionIdentity,
    screenshotter: Arc<dyn Screenshotter>,
    collector: Arc<dyn Collector>,
    clock: Arc<dyn Clock>,
    encoder: FrameEncoder,
    state: Mutex<CaptureState>,
    flush_done: Notify,
    capture_done: Notify,
}

/// Buffers frames and interaction events for one user and ships them to a
/// collector. Cheap to clone; clones share the same session.
///
/// `start` spawns timer tasks and must be called inside a Tokio runtime.
#[derive(Clone)]
pub struct CaptureEngine {
    inner: Arc<EngineInner>,
}

impl CaptureEngine {
    pub fn new(
        config: &ReplayConfig,
        identity: SessionIdentity,
        screenshotter: Arc<dyn Screenshotter>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        Self::with_clock(
            config,
            identity,
            screenshotter,
            collector,
            Arc::new(MonotonicClock::new()),
        )
    }

    pub fn with_clock(
        config: &ReplayConfig,
        identity: SessionIdentity,
        screenshotter: Arc<dyn Screenshotter>,
        collector: Arc<dyn Collector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                encoder: FrameEncoder::from_config(&config.capture),
                config: config.capture.clone(),
                sample_rate: config.sample_rate,
                identity,
                screenshotter,
                collector,
                clock,
                state: Mutex::new(CaptureState::new()),
                flush_done: Notify::new(),
                capture_done: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current time in the engine's timestamp domain.
    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    pub fn status(&self) -> CaptureStatus {
        self.lock().status()
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn frame_count(&self) -> u32 {
        self.lock().frame_count
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.lock().snapshot()
    }

    /// Opens a new session and arms the flush, periodic-capture and idle timers.
    pub fn start(&self) -> StartOutcome {
        let user_id = &self.inner.identity.user_id;
        if !should_sample(user_id, self.inner.sample_rate) {
            log_info!("user {user_id} not sampled at rate {}", self.inner.sample_rate);
            return StartOutcome::NotSampled;
        }

        let now = self.now_ms();
        let mut state = self.lock();
        if state.active {
            return StartOutcome::AlreadyActive;
        }
        if state.draining > 0 {
            return StartOutcome::Stopping;
        }

        let session_id = Uuid::new_v4().to_string();
        state.begin_session(session_id.clone(), now);

        let run_token = state.timers.arm_run();
        if let Some(period) = self.inner.config.flush_interval() {
            tokio::spawn(flush_loop(self.clone(), period, run_token.child_token()));
        }
        self.arm_periodic(&mut state);
        self.arm_idle(&mut state);

        log_info!("capture started for session {session_id}");
        StartOutcome::Started
    }

    /// Disarms every timer, marks the engine inactive and sends whatever is
    /// still buffered. Screenshots already in progress and a flush already in
    /// flight are waited out first, so their frames go out with this batch.
    pub async fn stop(&self) -> FlushOutcome {
        let run = {
            let mut state = self.lock();
            if state.active {
                state.end_session();
                state.timers.cancel_all();
                log_info!(
                    "capture stopped for session {} after {} frames",
                    state.session_id.as_deref().unwrap_or("-"),
                    state.frame_count
                );
            }
            state.draining += 1;
            state.run
        };
        let _draining = DrainGuard { engine: self };

        self.wait_for_pending_captures(run).await;

        loop {
            let notified = self.inner.flush_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.flush().await {
                FlushOutcome::InFlight => notified.await,
                outcome => return outcome,
            }
        }
    }

    async fn wait_for_pending_captures(&self, run: u64) {
        loop {
            let done = self.inner.capture_done.notified();
            tokio::pin!(done);
            done.as_mut().enable();

            let settled = {
                let state = self.lock();
                state.run != run || state.pending_captures == 0
            };
            if settled {
                return;
            }
            done.await;
        }
    }

    /// Throttled best-effort screenshot.
    pub async fn capture(&self, target: CaptureTarget) -> CaptureOutcome {
        self.capture_frame(target, true).await
    }

    /// Screenshot that skips the throttle window. Cap and active rules still apply.
    pub async fn capture_immediate(&self, target: CaptureTarget) -> CaptureOutcome {
        self.capture_frame(target, false).await
    }

    async fn capture_frame(&self, target: CaptureTarget, throttle: bool) -> CaptureOutcome {
        let now = self.now_ms();
        let admission = {
            let mut state = self.lock();
            if !state.active {
                Admission::Skip(CaptureOutcome::Inactive)
            } else if state.cap_reached(self.inner.config.max_frames) {
                Admission::CapReached
            } else if throttle && state.is_throttled(now, self.inner.config.throttle_ms) {
                state.stats.throttled += 1;
                Admission::Skip(CaptureOutcome::Throttled)
            } else {
                Admission::Proceed(state.reserve_frame(now))
            }
        };

        let run = match admission {
            Admission::Proceed(run) => run,
            Admission::Skip(outcome) => return outcome,
            Admission::CapReached => {
                log_info!(
                    "frame cap of {} reached, stopping capture",
                    self.inner.config.max_frames
                );
                self.stop().await;
                return CaptureOutcome::CapReached;
            }
        };

        let pending = PendingCapture {
            engine: self,
            run,
            booked: false,
        };
        let encoded = match self.inner.screenshotter.capture(&target).await {
            Ok(bytes) => self.encode(bytes).await,
            Err(err) => Err(err),
        };
        pending.book(now, encoded, &target)
    }

    async fn encode(&self, bytes: Vec<u8>) -> anyhow::Result<String> {
        let encoder = self.inner.encoder;
        if encoder.is_passthrough() {
            return encoder.encode(&bytes);
        }
        tokio::task::spawn_blocking(move || encoder.encode(&bytes))
            .await
            .map_err(|err| anyhow::anyhow!("frame encoder worker join failed: {err}"))?
    }

    /// Snapshots and clears all buffers, then uploads them as one batch.
    /// At most one upload runs at a time; a failed batch is dropped.
    pub async fn flush(&self) -> FlushOutcome {
        let batch = {
            let mut state = self.lock();
            if state.flush_in_flight {
                state.stats.skipped_flushes += 1;
                return FlushOutcome::InFlight;
            }
            let Some(batch) = state.take_batch(&self.inner.identity) else {
                return FlushOutcome::Empty;
            };
            state.flush_in_flight = true;
            batch
        };

        let _in_flight = InFlightGuard { engine: self };
        let frames = batch.frames.len();
        let events = batch.event_count();

        match self.inner.collector.upload(&batch).await {
            Ok(()) => {
                self.lock().stats.uploads += 1;
                FlushOutcome::Uploaded { frames, events }
            }
            Err(err) => {
                self.lock().stats.failed_uploads += 1;
                log_warn!(
                    "upload of {frames} frames / {events} events for session {} failed: {err:#}",
                    batch.session_id
                );
                FlushOutcome::Failed
            }
        }
    }

    pub async fn handle_lifecycle(&self, signal: AppLifecycle) -> Option<FlushOutcome> {
        match signal {
            AppLifecycle::Active => None,
            AppLifecycle::Inactive | AppLifecycle::Background => Some(self.flush().await),
        }
    }

    pub fn set_device_info(&self, width: u32, height: u32) {
        self.lock().device_dims = Some((width, height));
    }

    /// Events without a timestamp are stamped with [`Self::now_ms`].
    pub fn register_tap(&self, mut tap: TapEvent) {
        let now = self.now_ms();
        let mut state = self.lock();
        if !state.active {
            return;
        }
        tap.timestamp.get_or_insert(now);
        normalize_tap(&mut tap, state.device_dims);
        self.note_interaction(&mut state, now);
        state.buffers.taps.push(tap);
    }

    pub fn register_scroll(&self, mut scroll: ScrollEvent) {
        let now = self.now_ms();
        let mut state = self.lock();
        if !state.active {
            return;
        }
        scroll.timestamp.get_or_insert(now);
        self.note_interaction(&mut state, now);
        state.buffers.scrolls.push(scroll);
    }

    pub fn register_navigation(&self, mut navigation: NavigationEvent) {
        let now = self.now_ms();
        let mut state = self.lock();
        if !state.active {
            return;
        }
        navigation.timestamp.get_or_insert(now);
        self.note_interaction(&mut state, now);
        state.buffers.navigations.push(navigation);
    }

    /// Registers a tap and takes a throttled screenshot of the screen.
    pub async fn record_tap(&self, tap: TapEvent) -> CaptureOutcome {
        self.register_tap(tap);
        self.capture(CaptureTarget::Screen).await
    }

    /// Registers a navigation and captures the new screen immediately.
    pub async fn record_navigation(&self, navigation: NavigationEvent) -> CaptureOutcome {
        self.register_navigation(navigation);
        self.capture_immediate(CaptureTarget::Screen).await
    }

    fn note_interaction(&self, state: &mut CaptureState, now_ms: i64) {
        state.last_interaction_ms = now_ms;
        if state.idle {
            state.idle = false;
            self.arm_periodic(state);
            log_info!("interaction resumed periodic capture");
        }
        self.arm_idle(state);
    }

    fn arm_periodic(&self, state: &mut CaptureState) {
        let Some(period) = self.inner.config.periodic_interval() else {
            return;
        };
        if let Some(token) = state.timers.replace_periodic() {
            tokio::spawn(periodic_capture_loop(self.clone(), period, token));
        }
    }

    fn arm_idle(&self, state: &mut CaptureState) {
        let Some(timeout) = self.inner.config.idle_timeout() else {
            return;
        };
        if let Some(token) = state.timers.replace_idle() {
            tokio::spawn(idle_watch(self.clone(), timeout, state.run, token));
        }
    }

    pub(super) fn enter_idle(&self, run: u64) {
        let now = self.now_ms();
        let mut state = self.lock();
        if !state.active || state.idle || state.run != run {
            return;
        }
        let timeout = i64::try_from(self.inner.config.idle_timeout_ms).unwrap_or(i64::MAX);
        if now.saturating_sub(state.last_interaction_ms) < timeout {
            return;
        }

        state.idle = true;
        state.timers.cancel_periodic();
        log_info!("no interaction for {timeout}ms, pausing periodic capture");
    }
}

/// A screenshot admitted under `run` whose result is not booked yet.
/// Dropping it unbooked, when the capture future is cancelled, refunds the
/// reserved frame.
struct PendingCapture<'a> {
    engine: &'a CaptureEngine,
    run: u64,
    booked: bool,
}

impl PendingCapture<'_> {
    fn book(
        mut self,
        now: i64,
        encoded: anyhow::Result<String>,
        target: &CaptureTarget,
    ) -> CaptureOutcome {
        self.booked = true;
        let mut state = self.engine.lock();
        if !state.settle_pending(self.run) {
            // A new session started while the screenshot was pending.
            return CaptureOutcome::Inactive;
        }
        match encoded {
            Ok(image) => {
                state.buffers.frames.push(Frame {
                    timestamp: now,
                    image,
                });
                state.stats.captured += 1;
                CaptureOutcome::Captured
            }
            Err(err) => {
                state.frame_count = state.frame_count.saturating_sub(1);
                state.stats.failed_captures += 1;
                log_warn!("screenshot of {target:?} failed: {err:#}");
                CaptureOutcome::Failed
            }
        }
    }
}

impl Drop for PendingCapture<'_> {
    fn drop(&mut self) {
        if !self.booked {
            let mut state = self.engine.lock();
            if state.settle_pending(self.run) {
                state.frame_count = state.frame_count.saturating_sub(1);
            }
        }
        self.engine.inner.capture_done.notify_waiters();
    }
}

struct DrainGuard<'a> {
    engine: &'a CaptureEngine,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.lock();
        state.draining = state.draining.saturating_sub(1);
    }
}

/// Clears the in-flight flag however the upload ends, including when the
/// flush future is dropped mid-request.
struct InFlightGuard<'a> {
    engine: &'a CaptureEngine,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.engine.lock().flush_in_flight = false;
        self.engine.inner.flush_done.notify_waiters();
    }
}
