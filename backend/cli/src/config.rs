//! Command-line and environment settings specific to the binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

use ocrdeck_config::schema::{OutputConfig, RecognitionConfig, SourceConfig};
use ocrdeck_config::{parse_languages, OcrDeckConfig};
use ocrdeck_core::{Rect, SourceKind};

/// Viewer server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Page reload interval in seconds
    pub refresh_secs: u32,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8787,
            refresh_secs: 1,
        }
    }
}

impl ServeConfig {
    /// Load from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: std::env::var("OCRDECK_BIND").unwrap_or(defaults.bind_address),
            port: std::env::var("OCRDECK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            refresh_secs: std::env::var("OCRDECK_VIEW_REFRESH")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.refresh_secs),
        }
    }
}

/// Flags that override the config file for one invocation.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Config file (defaults to ~/.ocrdeck/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Frame source: monitor, stream or card
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// 1-based monitor index
    #[arg(long, global = true)]
    pub monitor: Option<u32>,

    /// Grab only left,top,right,bottom of the monitor
    #[arg(long, global = true)]
    pub monitor_region: Option<String>,

    /// Stream URL, e.g. srt://127.0.0.1:9000
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Capture device name
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Comma-separated language codes, e.g. en,vi
    #[arg(long, global = true)]
    pub languages: Option<String>,

    /// Ask the recognizer for GPU acceleration
    #[arg(long, global = true)]
    pub gpu: bool,

    /// Directory for latest_result.json and history files
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,
}

impl Overrides {
    /// Layer the flags over a config. `--url` and `--device` also select
    /// their source kind unless `--source` names one.
    pub fn apply(&self, mut config: OcrDeckConfig) -> Result<OcrDeckConfig> {
        if let Some(kind) = &self.source {
            let kind = kind.parse::<SourceKind>()?;
            config.source.get_or_insert_with(SourceConfig::default).kind = Some(kind);
        }
        if let Some(index) = self.monitor {
            config.source.get_or_insert_with(SourceConfig::default).monitor_index = Some(index);
        }
        if let Some(region) = &self.monitor_region {
            let region = region
                .parse::<Rect>()
                .with_context(|| format!("--monitor-region {region}"))?;
            config.source.get_or_insert_with(SourceConfig::default).monitor_region = Some(region);
        }
        if let Some(url) = &self.url {
            let source = config.source.get_or_insert_with(SourceConfig::default);
            source.stream_url = Some(url.clone());
            if self.source.is_none() {
                source.kind = Some(SourceKind::Stream);
            }
        }
        if let Some(device) = &self.device {
            let source = config.source.get_or_insert_with(SourceConfig::default);
            source.card_device = Some(device.clone());
            if self.source.is_none() {
                source.kind = Some(SourceKind::Card);
            }
        }
        if let Some(languages) = &self.languages {
            config
                .recognition
                .get_or_insert_with(RecognitionConfig::default)
                .languages = Some(parse_languages(languages));
        }
        if self.gpu {
            config.recognition.get_or_insert_with(RecognitionConfig::default).gpu = Some(true);
        }
        if let Some(dir) = &self.output {
            config.output.get_or_insert_with(OutputConfig::default).directory =
                Some(dir.display().to_string());
        }
        Ok(config)
    }
}
