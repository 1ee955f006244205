//! Deterministic playback over a captured frame sequence.

use std::sync::Arc;

use thiserror::Error;

use crate::models::{Frame, Session};

pub mod clock;
pub mod player;
pub mod search;

pub use clock::PlaybackClock;
pub use player::{PlaybackStatus, Player};
pub use search::find_frame_index_for_timestamp;

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("timeline needs at least one frame")]
    EmptyFrames,
    #[error("playback rate must be a positive finite number, got {0}")]
    InvalidRate(f64),
}

/// An immutable, non-empty, time-ordered frame sequence.
#[derive(Debug, Clone)]
pub struct Timeline {
    frames: Arc<[Frame]>,
}

impl Timeline {
    /// Frames must already be sorted by timestamp.
    pub fn new(frames: Vec<Frame>) -> Result<Self, TimelineError> {
        if frames.is_empty() {
            return Err(TimelineError::EmptyFrames);
        }
        Ok(Self {
            frames: frames.into(),
        })
    }

    pub fn from_session(session: &Session) -> Result<Self, TimelineError> {
        Self::new(session.frames.clone())
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn last_index(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn first_timestamp(&self) -> i64 {
        self.frames[0].timestamp
    }

    pub fn last_timestamp(&self) -> i64 {
        self.frames[self.last_index()].timestamp
    }

    pub fn duration_ms(&self) -> i64 {
        self.last_timestamp() - self.first_timestamp()
    }

    pub fn frame_index_for_timestamp(&self, timestamp: i64) -> usize {
        find_frame_index_for_timestamp(&self.frames, timestamp).unwrap_or(0)
    }

    /// Timestamp at a normalized position in `[0, 1]` of the session.
    /// Out-of-range positions are clamped; NaN maps to the start.
    pub fn timestamp_for_position(&self, position: f64) -> i64 {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
        self.first_timestamp() + (position * self.duration_ms() as f64).round() as i64
    }

    pub fn frame_index_for_position(&self, position: f64) -> usize {
        self.frame_index_for_timestamp(self.timestamp_for_position(position))
    }

    /// Normalized position of a frame, for drawing a scrubber.
    pub fn position_of(&self, index: usize) -> f64 {
        let duration = self.duration_ms();
        if duration <= 0 {
            return 0.0;
        }
        let Some(frame) = self.frame(index) else {
            return 1.0;
        };
        (frame.timestamp - self.first_timestamp()) as f64 / duration as f64
    }
}
