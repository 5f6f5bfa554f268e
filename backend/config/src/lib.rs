//! `ocrdeck-config`: OcrDeck runtime configuration management.
//!
//! Provides:
//! - Typed config schema (source, recognition, schedule, output, logging)
//! - YAML read/write with atomic rename and backup
//! - `${ENV_VAR}` substitution and `OCRDECK_*` overrides
//! - Default values, including the preview/auto-recognition interval floors
//! - Validation with user-friendly messages
//! - One `prepare` pipeline: env references, env overrides, an optional
//!   caller layer (command-line flags), validation, then defaults

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod settings;
pub mod validation;

pub use defaults::{apply_all_defaults, clamp_interval, MIN_AUTO_INTERVAL_MS, MIN_PREVIEW_INTERVAL_MS};
pub use env::{apply_env_overrides, process_env, resolve_env_refs, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::{parse_frame_size, parse_languages, OcrDeckConfig};
pub use settings::Settings;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::collections::HashMap;

/// Apply env handling, validate, and apply defaults to a loaded config.
pub fn prepare(config: OcrDeckConfig, env: &HashMap<String, String>) -> Result<OcrDeckConfig> {
    prepare_with(config, env, Ok)
}

/// [`prepare`] with one more layer, usually command-line flags, applied over
/// the environment overrides. The layer's values are validated like the rest.
pub fn prepare_with<F>(
    config: OcrDeckConfig,
    env: &HashMap<String, String>,
    overlay: F,
) -> Result<OcrDeckConfig>
where
    F: FnOnce(OcrDeckConfig) -> Result<OcrDeckConfig>,
{
    let config = resolve_env_refs(config, env)?;
    let config = apply_env_overrides(config, env)?;
    let config = overlay(config)?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        bail!(
            "{} config error(s); first: {}",
            report.errors.len(),
            first
        );
    }

    Ok(apply_all_defaults(config))
}
