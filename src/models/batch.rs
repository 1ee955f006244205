use serde::{Deserialize, Serialize};

use super::{Frame, NavigationEvent, ScrollEvent, SessionIdentity, TapEvent};

/// Everything buffered between two flushes, tagged with session identity.
/// Serializes to the document the collector accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatch {
    pub session_id: String,
    pub user_id: String,
    pub device: String,
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_height: Option<u32>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub taps: Vec<TapEvent>,
    #[serde(default)]
    pub scrolls: Vec<ScrollEvent>,
    #[serde(default)]
    pub navigations: Vec<NavigationEvent>,
}

impl UploadBatch {
    pub fn new(session_id: String, identity: &SessionIdentity) -> Self {
        Self {
            session_id,
            user_id: identity.user_id.clone(),
            device: identity.device.clone(),
            app_version: identity.app_version.clone(),
            device_width: None,
            device_height: None,
            frames: Vec::new(),
            taps: Vec::new(),
            scrolls: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.taps.len() + self.scrolls.len() + self.navigations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.event_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_document_omits_unknown_dimensions() {
        let identity = SessionIdentity {
            user_id: "u1".into(),
            device: "ios".into(),
            app_version: "1.2.0".into(),
        };
        let batch = UploadBatch::new("s1".into(), &identity);
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["appVersion"], "1.2.0");
        assert!(json.get("deviceWidth").is_none());
        assert_eq!(json["frames"], serde_json::json!([]));
        assert!(batch.is_empty());
    }
}
