//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside string values (typically an SRT
//!   passphrase kept out of the YAML file), resolved at load time;
//! - `OCRDECK_*` variables that override individual settings.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use ocrdeck_core::{Rect, SourceKind};
use regex::Regex;
use serde_json::Value;

use crate::schema::{
    parse_languages, OcrDeckConfig, OutputConfig, RecognitionConfig, SourceConfig,
};

/// Pattern matching valid uppercase env var names.
static ENV_REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Process environment as a map.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Substitute `${VAR}` references in every string value of the config.
pub fn resolve_env_refs(
    config: OcrDeckConfig,
    env: &HashMap<String, String>,
) -> Result<OcrDeckConfig> {
    let value = serde_json::to_value(&config).context("Failed to serialize config for env refs")?;
    let resolved = substitute_value(&value, env, "")?;
    serde_json::from_value(resolved).context("Failed to deserialize config after env refs")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }
    let mut missing: Option<MissingEnvVarError> = None;
    let replaced = ENV_REF_PATTERN.replace_all(s, |caps: &regex::Captures| {
        match env.get(&caps[1]) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: caps[1].to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });
    if let Some(err) = missing {
        bail!(err);
    }
    Ok(replaced.into_owned())
}

/// Apply `OCRDECK_*` overrides on top of the file config.
pub fn apply_env_overrides(
    mut config: OcrDeckConfig,
    env: &HashMap<String, String>,
) -> Result<OcrDeckConfig> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(kind) = get("OCRDECK_SOURCE") {
        let kind = kind.parse::<SourceKind>().context("OCRDECK_SOURCE")?;
        config.source.get_or_insert_with(SourceConfig::default).kind = Some(kind);
    }
    if let Some(idx) = get("OCRDECK_MONITOR") {
        let idx = idx
            .parse::<u32>()
            .with_context(|| format!("OCRDECK_MONITOR='{idx}' is not a monitor index"))?;
        config.source.get_or_insert_with(SourceConfig::default).monitor_index = Some(idx);
    }
    if let Some(region) = get("OCRDECK_MONITOR_REGION") {
        let region = region
            .parse::<Rect>()
            .with_context(|| format!("OCRDECK_MONITOR_REGION='{region}'"))?;
        config.source.get_or_insert_with(SourceConfig::default).monitor_region = Some(region);
    }
    if let Some(url) = get("OCRDECK_STREAM_URL") {
        config.source.get_or_insert_with(SourceConfig::default).stream_url = Some(url.to_string());
    }
    if let Some(device) = get("OCRDECK_CARD_DEVICE") {
        config.source.get_or_insert_with(SourceConfig::default).card_device =
            Some(device.to_string());
    }
    if let Some(langs) = get("OCRDECK_LANGUAGES") {
        config
            .recognition
            .get_or_insert_with(RecognitionConfig::default)
            .languages = Some(parse_languages(langs));
    }
    if let Some(gpu) = get("OCRDECK_GPU") {
        config.recognition.get_or_insert_with(RecognitionConfig::default).gpu =
            Some(parse_bool("OCRDECK_GPU", gpu)?);
    }
    if let Some(dir) = get("OCRDECK_OUTPUT_DIR") {
        config.output.get_or_insert_with(OutputConfig::default).directory = Some(dir.to_string());
    }
    if let Some(keep) = get("OCRDECK_KEEP_HISTORY") {
        config.output.get_or_insert_with(OutputConfig::default).keep_history =
            Some(parse_bool("OCRDECK_KEEP_HISTORY", keep)?);
    }
    Ok(config)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key}='{raw}' is not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn with_url(url: &str) -> OcrDeckConfig {
        OcrDeckConfig {
            source: Some(SourceConfig {
                stream_url: Some(url.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn substitutes_passphrase_reference() {
        let cfg = with_url("srt://host:9000?passphrase=${SRT_PASSPHRASE}");
        let cfg = resolve_env_refs(cfg, &env(&[("SRT_PASSPHRASE", "0123456789")])).unwrap();
        assert_eq!(
            cfg.source.unwrap().stream_url.unwrap(),
            "srt://host:9000?passphrase=0123456789"
        );
    }

    #[test]
    fn missing_reference_names_var_and_path() {
        let cfg = with_url("srt://host:9000?passphrase=${NOPE}");
        let err = resolve_env_refs(cfg, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("NOPE"), "{err}");
        assert!(err.contains("source.streamUrl"), "{err}");
    }

    #[test]
    fn overrides_take_precedence() {
        let cfg = with_url("srt://file:9000");
        let cfg = apply_env_overrides(
            cfg,
            &env(&[
                ("OCRDECK_SOURCE", "srt"),
                ("OCRDECK_STREAM_URL", "srt://env:9000"),
                ("OCRDECK_LANGUAGES", "ja,en"),
                ("OCRDECK_KEEP_HISTORY", "yes"),
            ]),
        )
        .unwrap();
        let source = cfg.source.unwrap();
        assert_eq!(source.kind, Some(SourceKind::Stream));
        assert_eq!(source.stream_url.as_deref(), Some("srt://env:9000"));
        assert_eq!(cfg.recognition.unwrap().languages.unwrap(), vec!["ja", "en"]);
        assert_eq!(cfg.output.unwrap().keep_history, Some(true));
    }

    #[test]
    fn monitor_region_override() {
        let cfg = apply_env_overrides(
            OcrDeckConfig::default(),
            &env(&[("OCRDECK_MONITOR_REGION", "0,0,1280,720")]),
        )
        .unwrap();
        let region = cfg.source.unwrap().monitor_region.unwrap();
        assert_eq!(region.edges(), [0, 0, 1280, 720]);

        let err = apply_env_overrides(
            OcrDeckConfig::default(),
            &env(&[("OCRDECK_MONITOR_REGION", "0,0,0,720")]),
        );
        assert!(err.is_err());
    }

    #[test]
    fn bad_override_is_error() {
        let err = apply_env_overrides(OcrDeckConfig::default(), &env(&[("OCRDECK_GPU", "maybe")]));
        assert!(err.is_err());
    }
}
