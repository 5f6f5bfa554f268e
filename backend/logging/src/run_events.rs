//! Run Event Logger
//!
//! Typed capture/recognition events emitted on the `ocrdeck::events` target,
//! so the NDJSON log carries one machine-readable line per pass.

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_stream_url;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    SourceConnected {
        kind: String,
        source: String,
    },
    SourceFailed {
        source: String,
        error: String,
    },
    PassCompleted {
        source: String,
        regions: usize,
        latest_path: String,
        history_path: Option<String>,
    },
    PassFailed {
        category: String,
        error: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RunEventEntry {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: RunEvent,
}

pub struct RunEventLogger;

impl RunEventLogger {
    /// Scrub source identifiers and emit the event.
    pub fn log(mut event: RunEvent) -> RunEventEntry {
        match &mut event {
            RunEvent::SourceConnected { source, .. }
            | RunEvent::SourceFailed { source, .. }
            | RunEvent::PassCompleted { source, .. } => {
                *source = redact_stream_url(source);
            }
            RunEvent::PassFailed { .. } => {}
        }

        let entry = RunEventEntry {
            timestamp: Local::now(),
            event,
        };
        let json = serde_json::to_string(&entry).unwrap_or_default();
        match entry.event {
            RunEvent::SourceFailed { .. } | RunEvent::PassFailed { .. } => {
                warn!(target: "ocrdeck::events", event = %json, "Run event");
            }
            _ => info!(target: "ocrdeck::events", event = %json, "Run event"),
        }
        entry
    }
}
