//! Config defaults: fills unset values and enforces the interval floors.

use tracing::warn;

use crate::schema::{
    LoggingConfig, OcrDeckConfig, OutputConfig, RecognitionConfig, ScheduleConfig, SourceConfig,
};
use ocrdeck_core::SourceKind;

pub const DEFAULT_MONITOR_INDEX: u32 = 1;
pub const DEFAULT_STREAM_URL: &str = "srt://127.0.0.1:9000";
pub const DEFAULT_CARD_DEVICE: &str = "DeckLink Duo (1)";
pub const DEFAULT_CARD_SIZE: &str = "1920x1080";
pub const DEFAULT_CARD_FPS: &str = "60";
pub const DEFAULT_LANGUAGES: &[&str] = &["en", "vi"];

/// Preview refresh interval (ms) and its enforced minimum.
pub const DEFAULT_PREVIEW_INTERVAL_MS: u64 = 1_000;
pub const MIN_PREVIEW_INTERVAL_MS: u64 = 300;

/// Auto-recognition interval (ms) and its enforced minimum.
pub const DEFAULT_AUTO_INTERVAL_MS: u64 = 1_500;
pub const MIN_AUTO_INTERVAL_MS: u64 = 500;

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// ffmpeg input format for capture cards on this platform.
pub fn default_card_format() -> &'static str {
    if cfg!(target_os = "windows") {
        "dshow"
    } else if cfg!(target_os = "macos") {
        "avfoundation"
    } else {
        "v4l2"
    }
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: OcrDeckConfig) -> OcrDeckConfig {
    let config = apply_source_defaults(config);
    let config = apply_recognition_defaults(config);
    let config = apply_schedule_defaults(config);
    let config = apply_output_defaults(config);
    apply_logging_defaults(config)
}

/// Raise `value` to `floor`, warning when it had to be raised.
pub fn clamp_interval(name: &str, value: u64, floor: u64) -> u64 {
    if value < floor {
        warn!(interval = name, value, floor, "Interval below minimum; clamped");
        floor
    } else {
        value
    }
}

fn apply_source_defaults(mut config: OcrDeckConfig) -> OcrDeckConfig {
    let source = config.source.get_or_insert_with(SourceConfig::default);
    source.kind.get_or_insert(SourceKind::Monitor);
    source.monitor_index.get_or_insert(DEFAULT_MONITOR_INDEX);
    source
        .stream_url
        .get_or_insert_with(|| DEFAULT_STREAM_URL.to_string());
    source
        .card_device
        .get_or_insert_with(|| DEFAULT_CARD_DEVICE.to_string());
    source
        .card_size
        .get_or_insert_with(|| DEFAULT_CARD_SIZE.to_string());
    source
        .card_fps
        .get_or_insert_with(|| DEFAULT_CARD_FPS.to_string());
    source
        .card_format
        .get_or_insert_with(|| default_card_format().to_string());
    config
}

fn apply_recognition_defaults(mut config: OcrDeckConfig) -> OcrDeckConfig {
    let recognition = config
        .recognition
        .get_or_insert_with(RecognitionConfig::default);
    recognition
        .languages
        .get_or_insert_with(|| DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect());
    recognition.gpu.get_or_insert(false);
    config
}

fn apply_schedule_defaults(mut config: OcrDeckConfig) -> OcrDeckConfig {
    let schedule = config.schedule.get_or_insert_with(ScheduleConfig::default);
    let preview = schedule
        .preview_interval_ms
        .unwrap_or(DEFAULT_PREVIEW_INTERVAL_MS);
    schedule.preview_interval_ms = Some(clamp_interval(
        "schedule.previewIntervalMs",
        preview,
        MIN_PREVIEW_INTERVAL_MS,
    ));
    let auto = schedule.auto_interval_ms.unwrap_or(DEFAULT_AUTO_INTERVAL_MS);
    schedule.auto_interval_ms = Some(clamp_interval(
        "schedule.autoIntervalMs",
        auto,
        MIN_AUTO_INTERVAL_MS,
    ));
    config
}

fn apply_output_defaults(mut config: OcrDeckConfig) -> OcrDeckConfig {
    let output = config.output.get_or_insert_with(OutputConfig::default);
    output
        .directory
        .get_or_insert_with(|| DEFAULT_OUTPUT_DIR.to_string());
    output.keep_history.get_or_insert(false);
    config
}

fn apply_logging_defaults(mut config: OcrDeckConfig) -> OcrDeckConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging
        .directory
        .get_or_insert_with(|| DEFAULT_LOG_DIR.to_string());
    config
}
