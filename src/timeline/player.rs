use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{PlaybackClock, Timeline, TimelineError};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    /// Reached the last frame during this step.
    Finished,
}

struct PlayerState {
    displayed: usize,
    rate: f64,
    clock: Option<PlaybackClock>,
    loop_token: Option<CancellationToken>,
    /// Identifies the current render loop; older loops see a mismatch and exit.
    generation: u64,
}

impl PlayerState {
    fn halt(&mut self) {
        if let Some(token) = self.loop_token.take() {
            token.cancel();
        }
        self.clock = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

struct PlayerInner {
    timeline: Timeline,
    render_interval: Duration,
    state: Mutex<PlayerState>,
    displayed_tx: watch::Sender<usize>,
}

/// Drives the displayed frame index of a timeline in real time.
///
/// One render loop runs at a time. `play`, `pause` and every seek cancel the
/// running loop before touching the displayed index.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    pub fn new(timeline: Timeline) -> Self {
        Self::with_render_interval(timeline, DEFAULT_RENDER_INTERVAL)
    }

    pub fn with_render_interval(timeline: Timeline, render_interval: Duration) -> Self {
        let (displayed_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(PlayerInner {
                timeline,
                render_interval,
                state: Mutex::new(PlayerState {
                    displayed: 0,
                    rate: 1.0,
                    clock: None,
                    loop_token: None,
                    generation: 0,
                }),
                displayed_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.inner.timeline
    }

    pub fn displayed_index(&self) -> usize {
        self.lock().displayed
    }

    pub fn is_playing(&self) -> bool {
        self.lock().clock.is_some()
    }

    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    /// Receives the displayed index every time it changes.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.displayed_tx.subscribe()
    }

    fn show(&self, state: &mut PlayerState, index: usize) {
        state.displayed = index;
        self.inner.displayed_tx.send_if_modified(|current| {
            let changed = *current != index;
            *current = index;
            changed
        });
    }

    /// Starts playback from the displayed frame, or from the first frame when
    /// already at the end. Must be called inside a Tokio runtime.
    pub fn play(&self) {
        let mut state = self.lock();
        state.halt();

        if state.displayed >= self.inner.timeline.last_index() {
            self.show(&mut state, 0);
        }

        let token = CancellationToken::new();
        state.clock = Some(PlaybackClock::new(
            self.inner.timeline.frames(),
            state.displayed,
            Instant::now(),
            state.rate,
        ));
        state.loop_token = Some(token.clone());
        let generation = state.generation;

        log_info!("playback started at frame {} (rate {})", state.displayed, state.rate);
        tokio::spawn(render_loop(self.clone(), generation, token));
    }

    pub fn pause(&self) {
        self.lock().halt();
    }

    /// Changes the rate. While playing, the clock restarts from the displayed
    /// frame so time already played is not replayed at the new rate.
    pub fn set_rate(&self, rate: f64) -> Result<(), TimelineError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TimelineError::InvalidRate(rate));
        }

        let mut state = self.lock();
        state.rate = rate;
        if state.clock.is_some() {
            state.clock = Some(PlaybackClock::new(
                self.inner.timeline.frames(),
                state.displayed,
                Instant::now(),
                rate,
            ));
        }
        Ok(())
    }

    /// Stops playback and shows the frame nearest to `timestamp`.
    pub fn seek_to_timestamp(&self, timestamp: i64) -> usize {
        let mut state = self.lock();
        state.halt();
        let index = self.inner.timeline.frame_index_for_timestamp(timestamp);
        self.show(&mut state, index);
        index
    }

    /// Stops playback and shows the frame nearest to a normalized position.
    pub fn seek_to_position(&self, position: f64) -> usize {
        self.seek_to_timestamp(self.inner.timeline.timestamp_for_position(position))
    }

    /// Render callback: re-evaluates elapsed time and moves the displayed
    /// index forward. Safe to call at any cadence.
    pub fn step(&self, now: Instant) -> PlaybackStatus {
        let mut state = self.lock();
        self.step_locked(&mut state, now)
    }

    fn step_for(&self, generation: u64, now: Instant) -> PlaybackStatus {
        let mut state = self.lock();
        if state.generation != generation {
            return PlaybackStatus::Stopped;
        }
        self.step_locked(&mut state, now)
    }

    fn step_locked(&self, state: &mut PlayerState, now: Instant) -> PlaybackStatus {
        let Some(clock) = state.clock else {
            return PlaybackStatus::Stopped;
        };

        let timeline = &self.inner.timeline;
        let index = clock.advance(timeline.frames(), state.displayed, now);
        if index != state.displayed {
            self.show(state, index);
        }

        if index >= timeline.last_index() {
            state.halt();
            log_info!("playback finished at frame {index}");
            return PlaybackStatus::Finished;
        }
        PlaybackStatus::Playing
    }
}

async fn render_loop(player: Player, generation: u64, cancel_token: CancellationToken) {
    let mut ticker = time::interval(player.inner.render_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if player.step_for(generation, Instant::now()) != PlaybackStatus::Playing {
                    break;
                }
            }
        }
    }
}
