//! Reuse of a built engine across passes.

use std::sync::{Arc, Mutex};

use ocrdeck_core::{OcrDeckError, Result};
use tracing::info;

use crate::backend::BackendFactory;
use crate::engine::{RecognitionEngine, SharedEngine};

#[derive(Debug, Clone, PartialEq, Eq)]
struct EngineKey {
    languages: Vec<String>,
    gpu: bool,
}

/// Holds at most one engine; a different `(languages, gpu)` key replaces it.
pub struct EngineCache {
    factory: Arc<dyn BackendFactory>,
    current: Option<(EngineKey, SharedEngine)>,
    builds: u64,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            current: None,
            builds: 0,
        }
    }

    /// The cached engine when the key matches, otherwise a freshly built one.
    pub fn get_or_build(&mut self, languages: &[String], gpu: bool) -> Result<SharedEngine> {
        if languages.is_empty() {
            return Err(OcrDeckError::EmptyConfiguration(
                "no recognition languages configured".into(),
            ));
        }
        let key = EngineKey {
            languages: languages.to_vec(),
            gpu,
        };
        if let Some((cached, engine)) = &self.current {
            if *cached == key {
                return Ok(Arc::clone(engine));
            }
        }

        info!(languages = ?languages, gpu, "Building recognition engine");
        let backend = self.factory.build(languages, gpu).map_err(|e| {
            OcrDeckError::RecognitionFailure(format!("failed to build engine: {e:#}"))
        })?;
        let engine = Arc::new(Mutex::new(RecognitionEngine::new(
            backend,
            key.languages.clone(),
            gpu,
        )));
        self.current = Some((key, Arc::clone(&engine)));
        self.builds += 1;
        Ok(engine)
    }

    /// Engines built so far.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}
