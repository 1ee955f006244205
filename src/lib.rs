//! Session replay: capture screenshots and interaction events on a device,
//! ship them in batches, store them, and play them back on a timeline.

pub mod utils;

pub mod capture;
pub mod collector;
pub mod config;
pub mod heatmap;
pub mod models;
pub mod sampling;
pub mod store;
pub mod timeline;

pub use capture::{
    AppLifecycle, CaptureEngine, CaptureOutcome, CaptureTarget, FlushOutcome, Screenshotter,
    StartOutcome, Tracked,
};
pub use collector::{Collector, HttpCollector};
pub use config::ReplayConfig;
pub use models::{
    Frame, NavigationEvent, NavigationTrigger, ScrollEvent, Session, SessionIdentity,
    SessionSummary, TapEvent, UploadBatch,
};
pub use store::SessionStore;
pub use timeline::{Player, Timeline};
pub use utils::init_logging;
