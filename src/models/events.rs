use serde::{Deserialize, Serialize};

/// One screenshot with its capture timestamp (epoch ms). `image` is the
/// base64 form of whatever encoded bytes the screenshotter produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub timestamp: i64,
    pub image: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TapOrigin {
    /// Emitted by a tracked pressable wrapper.
    #[default]
    Auto,
    /// Emitted by application code calling the engine directly.
    Explicit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TapEvent {
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ny: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub origin: TapOrigin,
    /// Epoch ms. Left empty, the capture engine stamps it on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TapEvent {
    pub fn at(x: f64, y: f64, timestamp: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollEvent {
    pub offset_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationTrigger {
    Push,
    BackButton,
    SwipeBack,
    Tab,
    Pop,
    Replace,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub trigger: NavigationTrigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_trigger_serializes_kebab_case() {
        let nav = NavigationEvent {
            timestamp: Some(10),
            from: Some("Home".into()),
            to: None,
            trigger: NavigationTrigger::SwipeBack,
        };
        let json = serde_json::to_value(&nav).unwrap();
        assert_eq!(json["trigger"], "swipe-back");
        assert!(json.get("to").is_none());
    }

    #[test]
    fn scroll_uses_camel_case_offset() {
        let json = serde_json::to_value(ScrollEvent { offset_y: 12.5, timestamp: Some(3) }).unwrap();
        assert_eq!(json["offsetY"], 12.5);
    }
}
