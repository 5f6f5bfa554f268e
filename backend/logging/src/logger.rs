//! Logger setup: readable console output plus a daily rolling NDJSON file.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Target of status-line events. The CLI prints status lines itself, so the
/// console skips them and only the log file keeps them.
pub const STATUS_TARGET: &str = "ocrdeck::status";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`. When `log_dir` is unusable, logging continues
/// on the console only. Calling this twice leaves the first subscriber in place.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) {
    let log_dir = log_dir.as_ref();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // `ocrdeck.log.YYYY-MM-DD`
    let (file_layer, file_error) = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("ocrdeck.log")
        .build(log_dir)
    {
        Ok(writer) => (
            Some(fmt::layer().json().with_writer(writer).with_ansi(false)),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() != STATUS_TARGET));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (true, Some(e)) = (installed, file_error) {
        tracing::warn!(dir = %log_dir.display(), error = %e, "File logging disabled");
    }
}
