//! `ocrdeck-recognition`: text recognition over frame regions.
//!
//! A [`RecognitionEngine`] wraps a [`TextBackend`] (Tesseract by default),
//! [`EngineCache`] keeps one engine per language/GPU key, and
//! [`SessionRecorder`] writes finished sessions to disk.

pub mod backend;
pub mod cache;
pub mod engine;
pub mod recorder;
pub mod tesseract;

pub use backend::{BackendFactory, TextBackend, TextFragment};
pub use cache::EngineCache;
pub use engine::{aggregate, recognize_blocking, RecognitionEngine, SharedEngine};
pub use recorder::{SavedPaths, SessionRecorder, LATEST_FILE_NAME};
pub use tesseract::{TesseractBackend, TesseractFactory};
