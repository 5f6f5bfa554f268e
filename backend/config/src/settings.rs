//! Flattened runtime settings derived from a prepared config.

use std::path::PathBuf;

use ocrdeck_core::{Rect, SourceKind};

use crate::defaults::{self, apply_all_defaults};
use crate::schema::OcrDeckConfig;

/// Concrete values the runtime works with; every field is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_kind: SourceKind,
    pub monitor_index: u32,
    pub monitor_region: Option<Rect>,
    pub stream_url: String,
    pub card_device: String,
    pub card_size: String,
    pub card_fps: String,
    pub card_format: String,
    pub languages: Vec<String>,
    pub gpu: bool,
    pub preview_interval_ms: u64,
    pub auto_interval_ms: u64,
    pub output_dir: PathBuf,
    pub keep_history: bool,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Settings {
    pub fn from_config(config: &OcrDeckConfig) -> Self {
        let config = apply_all_defaults(config.clone());
        let source = config.source.unwrap_or_default();
        let recognition = config.recognition.unwrap_or_default();
        let schedule = config.schedule.unwrap_or_default();
        let output = config.output.unwrap_or_default();
        let logging = config.logging.unwrap_or_default();

        Self {
            source_kind: source.kind.unwrap_or_default(),
            monitor_index: source.monitor_index.unwrap_or(defaults::DEFAULT_MONITOR_INDEX),
            monitor_region: source.monitor_region,
            stream_url: source
                .stream_url
                .unwrap_or_else(|| defaults::DEFAULT_STREAM_URL.into()),
            card_device: source
                .card_device
                .unwrap_or_else(|| defaults::DEFAULT_CARD_DEVICE.into()),
            card_size: source
                .card_size
                .unwrap_or_else(|| defaults::DEFAULT_CARD_SIZE.into()),
            card_fps: source
                .card_fps
                .unwrap_or_else(|| defaults::DEFAULT_CARD_FPS.into()),
            card_format: source
                .card_format
                .unwrap_or_else(|| defaults::default_card_format().into()),
            languages: recognition.languages.unwrap_or_default(),
            gpu: recognition.gpu.unwrap_or(false),
            preview_interval_ms: schedule
                .preview_interval_ms
                .unwrap_or(defaults::DEFAULT_PREVIEW_INTERVAL_MS),
            auto_interval_ms: schedule
                .auto_interval_ms
                .unwrap_or(defaults::DEFAULT_AUTO_INTERVAL_MS),
            output_dir: PathBuf::from(
                output
                    .directory
                    .unwrap_or_else(|| defaults::DEFAULT_OUTPUT_DIR.into()),
            ),
            keep_history: output.keep_history.unwrap_or(false),
            log_level: logging
                .level
                .unwrap_or_else(|| defaults::DEFAULT_LOG_LEVEL.into()),
            log_dir: PathBuf::from(
                logging
                    .directory
                    .unwrap_or_else(|| defaults::DEFAULT_LOG_DIR.into()),
            ),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&OcrDeckConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScheduleConfig;

    #[test]
    fn defaults_resolve() {
        let s = Settings::default();
        assert_eq!(s.source_kind, SourceKind::Monitor);
        assert_eq!(s.languages, vec!["en", "vi"]);
        assert_eq!(s.auto_interval_ms, defaults::DEFAULT_AUTO_INTERVAL_MS);
        assert_eq!(s.output_dir, PathBuf::from("outputs"));
        assert!(!s.keep_history);
    }

    #[test]
    fn floors_survive_flattening() {
        let cfg = OcrDeckConfig {
            schedule: Some(ScheduleConfig {
                preview_interval_ms: Some(1),
                auto_interval_ms: Some(1),
            }),
            ..Default::default()
        };
        let s = Settings::from_config(&cfg);
        assert_eq!(s.preview_interval_ms, defaults::MIN_PREVIEW_INTERVAL_MS);
        assert_eq!(s.auto_interval_ms, defaults::MIN_AUTO_INTERVAL_MS);
    }
}
