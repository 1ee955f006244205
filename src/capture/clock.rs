use chrono::Utc;
use tokio::time::Instant;

/// Millisecond time source shared by capture timestamps, throttling and idle
/// detection.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Epoch-millisecond clock anchored once at construction and advanced by a
/// monotonic instant, so readings never step backwards when the wall clock
/// is adjusted.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch_anchor_ms: i64,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch_anchor_ms: Utc::now().timestamp_millis(),
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_anchor_ms.saturating_add(elapsed)
    }
}
