//! Recognition results and the persisted session document.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::types::SourceId;

/// Recognized text for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub bbox: Rect,
    pub text: String,
    /// Mean fragment confidence in `[0, 1]`; `0.0` when nothing was detected.
    pub confidence: f64,
}

/// One completed recognition pass. Field order is the on-disk field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub capture_time: DateTime<Local>,
    #[serde(rename = "monitor_index")]
    pub source: SourceId,
    pub image_size: (u32, u32),
    pub boxes: Vec<RecognitionResult>,
}

impl Session {
    pub fn new(
        capture_time: DateTime<Local>,
        source: SourceId,
        image_size: (u32, u32),
        boxes: Vec<RecognitionResult>,
    ) -> Self {
        Self {
            capture_time,
            source,
            image_size,
            boxes,
        }
    }

    /// Pretty-printed canonical JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// `ocr_result_YYYYMMDD_HHMMSS.json`, whole-second resolution.
    pub fn history_file_name(&self) -> String {
        format!(
            "ocr_result_{}.json",
            self.capture_time.format("%Y%m%d_%H%M%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Session {
        Session::new(
            Local.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap(),
            SourceId::Monitor(1),
            (1920, 1080),
            vec![RecognitionResult {
                bbox: Rect::from_corners(10, 10, 210, 60).unwrap(),
                text: "HELLO".into(),
                confidence: 0.95,
            }],
        )
    }

    #[test]
    fn json_has_expected_shape_and_order() {
        let json = sample().to_json().unwrap();
        let ct = json.find("\"capture_time\"").unwrap();
        let mi = json.find("\"monitor_index\"").unwrap();
        let is = json.find("\"image_size\"").unwrap();
        let bx = json.find("\"boxes\"").unwrap();
        assert!(ct < mi && mi < is && is < bx);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["monitor_index"], 1);
        assert_eq!(value["image_size"], serde_json::json!([1920, 1080]));
        assert_eq!(value["boxes"][0]["bbox"], serde_json::json!([10, 10, 210, 60]));
        assert_eq!(value["boxes"][0]["text"], "HELLO");
        assert_eq!(value["boxes"][0]["confidence"], 0.95);
    }

    #[test]
    fn round_trips_through_json() {
        let session = sample();
        let back: Session = serde_json::from_str(&session.to_json().unwrap()).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn history_name_uses_whole_seconds() {
        assert_eq!(sample().history_file_name(), "ocr_result_20260301_090507.json");
    }
}
