//! OcrDeck configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills the gaps
//! and `Settings` flattens the result for the runtime.

use ocrdeck_core::{Rect, SourceKind};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrDeckConfig {
    /// Which visual source feeds frames and how to reach it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Recognition languages and device preference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionConfig>,

    /// Preview refresh and auto-recognition intervals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleConfig>,

    /// Where sessions are written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,

    /// 1-based display index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_index: Option<u32>,

    /// Grab only this part of the monitor, `[left, top, right, bottom]` in its pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_region: Option<Rect>,

    /// e.g. `srt://127.0.0.1:9000`; `${VAR}` references are resolved at load time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_device: Option<String>,

    /// `WIDTHxHEIGHT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_fps: Option<String>,

    /// ffmpeg input format used for the card (`dshow`, `v4l2`, `avfoundation`, `decklink`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    /// Language codes; YAML accepts a list or a comma-separated string
    #[serde(
        default,
        deserialize_with = "deserialize_languages",
        skip_serializing_if = "Option::is_none"
    )]
    pub languages: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<bool>,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_interval_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Output / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Also write `ocr_result_<timestamp>.json` for every pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_history: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split `"en, vi,,"` into `["en", "vi"]`.
pub fn parse_languages(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `"1920x1080"` into `(1920, 1080)`.
pub fn parse_frame_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn deserialize_languages<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Languages {
        List(Vec<String>),
        Csv(String),
    }

    Ok(Option::<Languages>::deserialize(deserializer)?.map(|langs| match langs {
        Languages::List(list) => list
            .iter()
            .flat_map(|s| parse_languages(s))
            .collect(),
        Languages::Csv(csv) => parse_languages(&csv),
    }))
}
