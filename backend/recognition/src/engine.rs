//! Region recognition over a frame.

use std::sync::{Arc, Mutex, PoisonError};

use ocrdeck_core::{
    Frame, OcrDeckError, RecognitionResult, RegionSet, Result, Session, SourceId,
};
use tracing::{debug, info};

use crate::backend::{TextBackend, TextFragment};

/// Engine shared between the controller and blocking recognition workers.
pub type SharedEngine = Arc<Mutex<RecognitionEngine>>;

/// A backend bound to the language list and GPU preference it was built for.
pub struct RecognitionEngine {
    backend: Box<dyn TextBackend>,
    languages: Vec<String>,
    gpu: bool,
}

impl RecognitionEngine {
    pub fn new(backend: Box<dyn TextBackend>, languages: Vec<String>, gpu: bool) -> Self {
        Self {
            backend,
            languages,
            gpu,
        }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn gpu(&self) -> bool {
        self.gpu
    }

    /// Recognize every region, in order, and build a session stamped with the
    /// frame's capture time. Any region failure aborts the whole pass.
    pub fn recognize(
        &mut self,
        frame: &Frame,
        regions: &RegionSet,
        source: SourceId,
    ) -> Result<Session> {
        if regions.is_empty() {
            return Err(OcrDeckError::EmptyConfiguration("no regions defined".into()));
        }

        let mut boxes = Vec::with_capacity(regions.len());
        for (i, rect) in regions.iter().enumerate() {
            let crop = frame.crop(rect)?;
            let fragments = self.backend.read_fragments(&crop).map_err(|e| {
                OcrDeckError::RecognitionFailure(format!("region {} {rect}: {e:#}", i + 1))
            })?;
            let (text, confidence) = aggregate(&fragments);
            debug!(region = i + 1, fragments = fragments.len(), confidence, "Region recognized");
            boxes.push(RecognitionResult {
                bbox: *rect,
                text,
                confidence,
            });
        }

        info!(source = %source, regions = boxes.len(), "Recognition pass complete");
        Ok(Session::new(frame.captured_at(), source, frame.size(), boxes))
    }
}

/// Space-joined, trimmed text and mean confidence (`0.0` for no fragments).
pub fn aggregate(fragments: &[TextFragment]) -> (String, f64) {
    let text = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    let confidence = if fragments.is_empty() {
        0.0
    } else {
        fragments.iter().map(|f| f.confidence).sum::<f64>() / fragments.len() as f64
    };
    (text, confidence)
}

/// Run one pass on the blocking pool. Passes on the same engine queue on its
/// mutex and never overlap.
pub async fn recognize_blocking(
    engine: SharedEngine,
    frame: Arc<Frame>,
    regions: RegionSet,
    source: SourceId,
) -> Result<Session> {
    tokio::task::spawn_blocking(move || {
        let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
        engine.recognize(&frame, &regions, source)
    })
    .await
    .map_err(|e| OcrDeckError::RecognitionFailure(format!("recognition worker failed: {e}")))?
}
