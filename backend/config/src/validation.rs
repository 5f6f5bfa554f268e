//! Config validation: field-level checks with user-friendly messages.

use crate::defaults::{MIN_AUTO_INTERVAL_MS, MIN_PREVIEW_INTERVAL_MS};
use crate::schema::{parse_frame_size, OcrDeckConfig};
use ocrdeck_core::SourceKind;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &OcrDeckConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_source(config, &mut report);
    validate_recognition(config, &mut report);
    validate_schedule(config, &mut report);
    report
}

fn validate_source(config: &OcrDeckConfig, report: &mut ValidationReport) {
    let Some(source) = &config.source else { return };

    if source.monitor_index == Some(0) {
        report.error("source.monitorIndex", "Monitor index is 1-based; 0 is not a display");
    }

    if let Some(region) = &source.monitor_region {
        if region.left() < 0 || region.top() < 0 {
            report.error(
                "source.monitorRegion",
                format!("Region {region} starts outside the monitor"),
            );
        }
    }

    if source.kind == Some(SourceKind::Stream)
        && source.stream_url.as_deref().map(str::trim) == Some("")
    {
        report.error("source.streamUrl", "Stream URL is required when kind is 'stream'");
    }

    if source.kind == Some(SourceKind::Card)
        && source.card_device.as_deref().map(str::trim) == Some("")
    {
        report.error("source.cardDevice", "Capture card device name is required when kind is 'card'");
    }

    if let Some(size) = &source.card_size {
        if parse_frame_size(size).is_none() {
            report.error(
                "source.cardSize",
                format!("'{size}' is not a frame size; use WIDTHxHEIGHT, e.g. 1920x1080"),
            );
        }
    }

    if let Some(fps) = &source.card_fps {
        match fps.trim().parse::<f64>() {
            Ok(v) if v > 0.0 => {}
            _ => report.error("source.cardFps", format!("'{fps}' is not a positive frame rate")),
        }
    }
}

fn validate_recognition(config: &OcrDeckConfig, report: &mut ValidationReport) {
    let Some(recognition) = &config.recognition else { return };
    if let Some(languages) = &recognition.languages {
        if languages.is_empty() {
            report.error("recognition.languages", "At least one language is required (e.g. en,vi)");
        }
    }
    if recognition.gpu == Some(true) {
        report.warn(
            "recognition.gpu",
            "The Tesseract backend has no GPU path; recognition runs on the CPU",
        );
    }
}

fn validate_schedule(config: &OcrDeckConfig, report: &mut ValidationReport) {
    let Some(schedule) = &config.schedule else { return };
    if let Some(ms) = schedule.preview_interval_ms {
        if ms < MIN_PREVIEW_INTERVAL_MS {
            report.warn(
                "schedule.previewIntervalMs",
                format!("{ms}ms is below the {MIN_PREVIEW_INTERVAL_MS}ms minimum and will be raised"),
            );
        }
    }
    if let Some(ms) = schedule.auto_interval_ms {
        if ms < MIN_AUTO_INTERVAL_MS {
            report.warn(
                "schedule.autoIntervalMs",
                format!("{ms}ms is below the {MIN_AUTO_INTERVAL_MS}ms minimum and will be raised"),
            );
        }
    }
}
