use tokio::time::Instant;

use crate::models::Frame;

/// Maps real elapsed time onto the frame sequence. Virtual time is
/// `(now - started_at) * rate`, measured from the start frame's timestamp.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    start_index: usize,
    base_timestamp: i64,
    started_at: Instant,
    rate: f64,
}

impl PlaybackClock {
    /// `start_index` must be a valid index into `frames`.
    pub fn new(frames: &[Frame], start_index: usize, started_at: Instant, rate: f64) -> Self {
        Self {
            start_index,
            base_timestamp: frames[start_index].timestamp,
            started_at,
            rate,
        }
    }

    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started_at).as_secs_f64() * 1000.0 * self.rate
    }

    /// Last frame due at `now`, scanning forward from `current`. Never
    /// returns an index earlier than `current`.
    pub fn advance(&self, frames: &[Frame], current: usize, now: Instant) -> usize {
        let elapsed = self.elapsed_ms(now);
        let mut index = current.max(self.start_index);
        while index + 1 < frames.len()
            && ((frames[index + 1].timestamp - self.base_timestamp) as f64) <= elapsed
        {
            index += 1;
        }
        index
    }
}
