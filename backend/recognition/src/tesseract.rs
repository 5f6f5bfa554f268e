//! Tesseract backend driven through the `tesseract` executable.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use image::RgbImage;
use rusty_tesseract::{Args, Image};
use tracing::{debug, warn};

use crate::backend::{BackendFactory, TextBackend, TextFragment};

/// Word rows in Tesseract's TSV output.
const WORD_LEVEL: i32 = 5;

static CROP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Map short language codes to Tesseract traineddata names.
pub fn tesseract_lang(code: &str) -> String {
    let code = code.trim();
    let mapped = match code.to_ascii_lowercase().as_str() {
        "en" => "eng",
        "vi" => "vie",
        "ja" => "jpn",
        "ko" => "kor",
        "ch_sim" | "zh" | "zh-cn" => "chi_sim",
        "ch_tra" | "zh-tw" => "chi_tra",
        "fr" => "fra",
        "de" => "deu",
        "es" => "spa",
        "ru" => "rus",
        "th" => "tha",
        _ => return code.to_string(),
    };
    mapped.to_string()
}

/// `eng+vie` style language argument.
pub fn lang_arg(languages: &[String]) -> String {
    languages
        .iter()
        .map(|l| tesseract_lang(l))
        .collect::<Vec<_>>()
        .join("+")
}

pub struct TesseractBackend {
    args: Args,
}

impl TesseractBackend {
    pub fn new(languages: &[String]) -> Self {
        Self {
            args: Args {
                lang: lang_arg(languages),
                ..Default::default()
            },
        }
    }

    fn scratch_path() -> PathBuf {
        let n = CROP_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("ocrdeck-crop-{}-{n}.png", std::process::id()))
    }
}

impl TextBackend for TesseractBackend {
    fn read_fragments(&mut self, crop: &RgbImage) -> Result<Vec<TextFragment>> {
        let path = Self::scratch_path();
        crop.save(&path)
            .with_context(|| format!("failed to write crop to {}", path.display()))?;

        let result = Image::from_path(path.clone())
            .context("failed to load crop for tesseract")
            .and_then(|image| {
                rusty_tesseract::image_to_data(&image, &self.args).context("tesseract failed")
            });
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(path = %path.display(), error = %e, "Failed to remove crop scratch file");
        }

        let fragments = result?
            .data
            .into_iter()
            .filter(|row| row.level == WORD_LEVEL && row.conf >= 0.0 && !row.text.trim().is_empty())
            .map(|row| TextFragment::new(row.text.trim(), f64::from(row.conf) / 100.0))
            .collect();
        Ok(fragments)
    }
}

/// Factory for [`TesseractBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TesseractFactory;

impl BackendFactory for TesseractFactory {
    fn build(&self, languages: &[String], gpu: bool) -> Result<Box<dyn TextBackend>> {
        if gpu {
            warn!("GPU acceleration is not available for the tesseract backend; running on CPU");
        }
        debug!(lang = %lang_arg(languages), "Building tesseract backend");
        Ok(Box::new(TesseractBackend::new(languages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes_and_passes_through_unknown() {
        assert_eq!(tesseract_lang("en"), "eng");
        assert_eq!(tesseract_lang("vi"), "vie");
        assert_eq!(tesseract_lang("ch_sim"), "chi_sim");
        assert_eq!(tesseract_lang("osd"), "osd");
    }

    #[test]
    fn joins_languages_with_plus() {
        let langs = vec!["en".to_string(), "vi".to_string()];
        assert_eq!(lang_arg(&langs), "eng+vie");
        assert_eq!(TesseractBackend::new(&langs).args.lang, "eng+vie");
    }

    #[test]
    fn scratch_paths_are_unique() {
        assert_ne!(TesseractBackend::scratch_path(), TesseractBackend::scratch_path());
    }
}
