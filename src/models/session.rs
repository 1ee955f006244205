use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Frame, NavigationEvent, ScrollEvent, TapEvent};

/// Producer-side identity carried on every upload batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub user_id: String,
    pub device: String,
    pub app_version: String,
}

/// A persisted session as returned by the ingestion store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub device: String,
    pub app_version: String,
    pub device_width: Option<u32>,
    pub device_height: Option<u32>,
    pub frames: Vec<Frame>,
    pub taps: Vec<TapEvent>,
    pub scrolls: Vec<ScrollEvent>,
    pub navigations: Vec<NavigationEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn device_dimensions(&self) -> Option<(u32, u32)> {
        self.device_width.zip(self.device_height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub user_id: String,
    pub device: String,
    pub app_version: String,
    pub frame_count: u64,
    pub tap_count: u64,
    pub scroll_count: u64,
    pub navigation_count: u64,
    pub updated_at: DateTime<Utc>,
}
