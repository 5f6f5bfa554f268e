//! Structured logging for OcrDeck.
//!
//! Console + rolling NDJSON file output, secret scrubbing for stream URLs,
//! and typed run events for capture and recognition activity.

pub mod logger;
pub mod redact;
pub mod run_events;

pub use logger::{init_logger, STATUS_TARGET};
pub use redact::redact_stream_url;
pub use run_events::{RunEvent, RunEventLogger};
