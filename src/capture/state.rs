use serde::Serialize;
use std::mem;

use crate::models::{Frame, NavigationEvent, ScrollEvent, SessionIdentity, TapEvent, UploadBatch};

use super::timers::RunTimers;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    #[default]
    Inactive,
    Active,
    /// Active, with periodic capture paused for inactivity.
    Idle,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartOutcome {
    Started,
    AlreadyActive,
    /// The user falls outside the configured sample rate.
    NotSampled,
    /// A previous session is still draining its last screenshots and upload.
    Stopping,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaptureOutcome {
    Captured,
    /// Too soon after the previous capture; dropped, not queued.
    Throttled,
    Inactive,
    /// The frame cap was hit and the engine stopped itself.
    CapReached,
    /// The screenshot failed; the frame budget was refunded.
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlushOutcome {
    Uploaded { frames: usize, events: usize },
    Empty,
    /// Another flush owns the network; nothing was taken from the buffers.
    InFlight,
    /// The upload failed and the batch was dropped.
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    pub captured: u64,
    pub throttled: u64,
    pub failed_captures: u64,
    pub uploads: u64,
    pub failed_uploads: u64,
    pub skipped_flushes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub status: CaptureStatus,
    pub session_id: Option<String>,
    pub frame_count: u32,
    pub buffered_frames: usize,
    pub buffered_events: usize,
    pub flush_in_flight: bool,
    pub pending_captures: u32,
    pub stats: CaptureStats,
}

/// Data captured since the previous flush, in append order.
#[derive(Debug, Default)]
pub struct CaptureBuffers {
    pub frames: Vec<Frame>,
    pub taps: Vec<TapEvent>,
    pub scrolls: Vec<ScrollEvent>,
    pub navigations: Vec<NavigationEvent>,
}

impl CaptureBuffers {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
            && self.taps.is_empty()
            && self.scrolls.is_empty()
            && self.navigations.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.taps.len() + self.scrolls.len() + self.navigations.len()
    }
}

#[derive(Debug, Default)]
pub struct CaptureState {
    pub active: bool,
    pub idle: bool,
    pub session_id: Option<String>,
    pub frame_count: u32,
    pub buffers: CaptureBuffers,
    pub last_capture_ms: Option<i64>,
    pub last_interaction_ms: i64,
    pub flush_in_flight: bool,
    pub device_dims: Option<(u32, u32)>,
    /// Bumped on every start so screenshot results from an earlier session
    /// can be recognized and discarded.
    pub run: u64,
    /// Screenshots admitted in the current run whose result is not booked yet.
    pub pending_captures: u32,
    /// `stop` calls still waiting on pending screenshots or the final upload.
    pub draining: u32,
    pub stats: CaptureStats,
    pub timers: RunTimers,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> CaptureStatus {
        match (self.active, self.idle) {
            (false, _) => CaptureStatus::Inactive,
            (true, false) => CaptureStatus::Active,
            (true, true) => CaptureStatus::Idle,
        }
    }

    pub fn begin_session(&mut self, session_id: String, now_ms: i64) {
        self.active = true;
        self.idle = false;
        self.session_id = Some(session_id);
        self.frame_count = 0;
        self.last_capture_ms = None;
        self.last_interaction_ms = now_ms;
        self.run = self.run.wrapping_add(1);
        self.pending_captures = 0;
        self.stats = CaptureStats::default();
    }

    /// Marks the engine inactive. Buffers are kept for the final flush, and
    /// screenshots still pending for this run may add to them.
    pub fn end_session(&mut self) {
        self.active = false;
        self.idle = false;
    }

    pub fn cap_reached(&self, max_frames: u32) -> bool {
        self.frame_count >= max_frames
    }

    /// Reserves one frame of budget for a screenshot about to be taken and
    /// returns the run it belongs to.
    pub fn reserve_frame(&mut self, now_ms: i64) -> u64 {
        self.last_capture_ms = Some(now_ms);
        self.frame_count += 1;
        self.pending_captures += 1;
        self.run
    }

    /// Releases a pending reservation. False when `run` is no longer current,
    /// in which case the caller's result belongs to a finished session.
    pub fn settle_pending(&mut self, run: u64) -> bool {
        if self.run != run {
            return false;
        }
        self.pending_captures = self.pending_captures.saturating_sub(1);
        true
    }

    pub fn is_throttled(&self, now_ms: i64, throttle_ms: u64) -> bool {
        let throttle_ms = i64::try_from(throttle_ms).unwrap_or(i64::MAX);
        self.last_capture_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < throttle_ms)
    }

    /// Moves every buffer into a batch in one step, leaving them empty.
    /// Returns `None` when there is nothing to send or no session to tag it with.
    pub fn take_batch(&mut self, identity: &SessionIdentity) -> Option<UploadBatch> {
        if self.buffers.is_empty() {
            return None;
        }
        let session_id = self.session_id.clone()?;
        let buffers = mem::take(&mut self.buffers);

        let mut batch = UploadBatch::new(session_id, identity);
        if let Some((width, height)) = self.device_dims {
            batch.device_width = Some(width);
            batch.device_height = Some(height);
        }
        batch.frames = buffers.frames;
        batch.taps = buffers.taps;
        batch.scrolls = buffers.scrolls;
        batch.navigations = buffers.navigations;
        Some(batch)
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            status: self.status(),
            session_id: self.session_id.clone(),
            frame_count: self.frame_count,
            buffered_frames: self.buffers.frames.len(),
            buffered_events: self.buffers.event_count(),
            flush_in_flight: self.flush_in_flight,
            pending_captures: self.pending_captures,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            user_id: "u1".into(),
            device: "android".into(),
            app_version: "3.1.0".into(),
        }
    }

    #[test]
    fn status_follows_flags() {
        let mut state = CaptureState::new();
        assert_eq!(state.status(), CaptureStatus::Inactive);
        state.begin_session("s1".into(), 0);
        assert_eq!(state.status(), CaptureStatus::Active);
        state.idle = true;
        assert_eq!(state.status(), CaptureStatus::Idle);
        state.end_session();
        assert_eq!(state.status(), CaptureStatus::Inactive);
    }

    #[test]
    fn throttle_window_is_exclusive() {
        let mut state = CaptureState::new();
        assert!(!state.is_throttled(1_000, 500));
        state.last_capture_ms = Some(1_000);
        assert!(state.is_throttled(1_499, 500));
        assert!(!state.is_throttled(1_500, 500));
    }

    #[test]
    fn take_batch_empties_every_buffer() {
        let mut state = CaptureState::new();
        state.begin_session("s1".into(), 0);
        state.device_dims = Some((1080, 1920));
        state.buffers.frames.push(Frame {
            timestamp: 1,
            image: "x".into(),
        });
        state.buffers.scrolls.push(ScrollEvent {
            offset_y: 4.0,
            timestamp: Some(2),
        });

        let batch = state.take_batch(&identity()).expect("batch");
        assert_eq!(batch.session_id, "s1");
        assert_eq!(batch.device_width, Some(1080));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(batch.scrolls.len(), 1);
        assert!(state.buffers.is_empty());
        assert!(state.take_batch(&identity()).is_none());
    }

    #[test]
    fn begin_session_resets_budget() {
        let mut state = CaptureState::new();
        state.begin_session("s1".into(), 0);
        state.frame_count = 7;
        state.last_capture_ms = Some(5);
        let first_run = state.run;

        state.end_session();
        state.begin_session("s2".into(), 10);
        assert_eq!(state.frame_count, 0);
        assert_eq!(state.last_capture_ms, None);
        assert_eq!(state.last_interaction_ms, 10);
        assert_ne!(state.run, first_run);
    }

    #[test]
    fn reservations_settle_only_within_their_run() {
        let mut state = CaptureState::new();
        state.begin_session("s1".into(), 0);
        let run = state.reserve_frame(100);
        assert_eq!(state.frame_count, 1);
        assert_eq!(state.pending_captures, 1);
        assert_eq!(state.last_capture_ms, Some(100));

        // Stopping keeps the run, so the late result still books.
        state.end_session();
        assert!(state.settle_pending(run));
        assert_eq!(state.pending_captures, 0);

        let stale = state.reserve_frame(200);
        state.begin_session("s2".into(), 300);
        assert!(!state.settle_pending(stale));
        assert_eq!(state.pending_captures, 0);
        assert_eq!(state.frame_count, 0);
    }
}
