//! Session persistence: a stable `latest_result.json` plus optional history.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ocrdeck_core::{OcrDeckError, Result, Session};
use tokio::fs;
use tracing::{debug, info};

pub const LATEST_FILE_NAME: &str = "latest_result.json";

/// Where a session ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPaths {
    pub latest: PathBuf,
    pub history: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SessionRecorder {
    dir: PathBuf,
    keep_history: bool,
}

impl SessionRecorder {
    pub fn new(dir: impl Into<PathBuf>, keep_history: bool) -> Self {
        Self {
            dir: dir.into(),
            keep_history,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn keep_history(&self) -> bool {
        self.keep_history
    }

    pub fn set_keep_history(&mut self, keep: bool) {
        self.keep_history = keep;
    }

    /// Write the session. `latest_result.json` is always replaced; a
    /// timestamped copy is added when history is kept. A history file from
    /// the same second is overwritten.
    pub async fn persist(&self, session: &Session) -> Result<SavedPaths> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OcrDeckError::persistence(&self.dir, e))?;

        let json = session
            .to_json()
            .map_err(|e| OcrDeckError::Other(anyhow::Error::new(e).context("serialize session")))?;

        let history = if self.keep_history {
            let path = self.dir.join(session.history_file_name());
            write_atomic(&path, &json).await?;
            Some(path)
        } else {
            None
        };

        let latest = self.dir.join(LATEST_FILE_NAME);
        write_atomic(&latest, &json).await?;

        info!(
            latest = %latest.display(),
            history = ?history.as_ref().map(|p| p.display().to_string()),
            boxes = session.boxes.len(),
            "Session saved"
        );
        Ok(SavedPaths { latest, history })
    }

    /// Read back `latest_result.json` from `dir`, if one exists.
    pub async fn load_latest(dir: &Path) -> Result<Option<Session>> {
        let path = dir.join(LATEST_FILE_NAME);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No latest result yet");
                return Ok(None);
            }
            Err(e) => return Err(OcrDeckError::persistence(path, e)),
        };
        let session = serde_json::from_str(&raw).map_err(|e| {
            OcrDeckError::Other(
                anyhow::Error::new(e).context(format!("malformed {}", path.display())),
            )
        })?;
        Ok(Some(session))
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A sibling of `path` no other write, in this process or another, uses.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

/// Write to a private temp file, then rename over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, contents.as_bytes()).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(OcrDeckError::persistence(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(OcrDeckError::persistence(path, e));
    }
    Ok(())
}
