//! The seam between region cropping and a concrete text recognizer.

use image::RgbImage;

/// One piece of text found inside a crop, in detection order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A loaded recognizer. Calls on one instance are never concurrent.
pub trait TextBackend: Send {
    fn read_fragments(&mut self, crop: &RgbImage) -> anyhow::Result<Vec<TextFragment>>;
}

/// Builds backends for a language list and GPU preference. Building may be
/// slow (model loading), which is why engines are cached.
pub trait BackendFactory: Send + Sync {
    fn build(&self, languages: &[String], gpu: bool) -> anyhow::Result<Box<dyn TextBackend>>;
}
