pub mod clock;
pub mod engine;
pub mod screenshot;
pub mod state;
pub mod timers;
pub mod tracking;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, MonotonicClock};
pub use engine::{AppLifecycle, CaptureEngine};
pub use screenshot::{CaptureTarget, FrameEncoder, Screenshotter};
pub use state::{
    CaptureOutcome, CaptureSnapshot, CaptureStats, CaptureStatus, FlushOutcome, StartOutcome,
};
pub use tracking::{Press, Pressable, Tracked};
