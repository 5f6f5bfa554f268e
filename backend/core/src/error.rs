use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the OcrDeck runtime.
#[derive(Debug, Error)]
pub enum OcrDeckError {
    /// No source is connected or no frame has arrived yet.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("connection failure ({source_id}): {message}")]
    ConnectionFailure { source_id: String, message: String },

    /// Recognition requested with nothing to recognize (no regions, no languages).
    #[error("empty configuration: {0}")]
    EmptyConfiguration(String),

    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("failed to persist {path}: {source}")]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OcrDeckError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    /// Short category label used in status lines and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::ConnectionFailure { .. } => "connection_failure",
            Self::EmptyConfiguration(_) => "empty_configuration",
            Self::RecognitionFailure(_) => "recognition_failure",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::InvalidRegion(_) => "invalid_region",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, OcrDeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_names_path() {
        let err = OcrDeckError::persistence(
            "/tmp/out/latest_result.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("latest_result.json"), "{msg}");
        assert_eq!(err.kind(), "persistence_failure");
    }
}
