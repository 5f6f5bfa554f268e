use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OcrDeckError;

/// Which kind of visual source is feeding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A numbered display, grabbed synchronously on demand.
    #[default]
    Monitor,
    /// A network video stream (SRT, RTMP, RTSP, ...).
    Stream,
    /// A capture-card input.
    Card,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Monitor => "monitor",
            SourceKind::Stream => "stream",
            SourceKind::Card => "card",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = OcrDeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monitor" | "screen" => Ok(SourceKind::Monitor),
            "stream" | "network-stream" | "srt" => Ok(SourceKind::Stream),
            "card" | "capture-card" | "decklink" => Ok(SourceKind::Card),
            other => Err(OcrDeckError::Config(format!(
                "unknown source kind '{other}'. Use 'monitor', 'stream', or 'card'"
            ))),
        }
    }
}

/// Identifier recorded with each session: a monitor index or a stream/device name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Monitor(u32),
    Named(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Monitor(idx) => write!(f, "monitor {idx}"),
            SourceId::Named(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_aliases() {
        assert_eq!("SRT".parse::<SourceKind>().unwrap(), SourceKind::Stream);
        assert_eq!("decklink".parse::<SourceKind>().unwrap(), SourceKind::Card);
        assert_eq!("monitor".parse::<SourceKind>().unwrap(), SourceKind::Monitor);
        assert!("webcam".parse::<SourceKind>().is_err());
    }

    #[test]
    fn source_id_serializes_untagged() {
        assert_eq!(serde_json::to_string(&SourceId::Monitor(1)).unwrap(), "1");
        assert_eq!(
            serde_json::to_string(&SourceId::Named("srt://host:9000".into())).unwrap(),
            "\"srt://host:9000\""
        );
        let back: SourceId = serde_json::from_str("2").unwrap();
        assert_eq!(back, SourceId::Monitor(2));
    }
}
