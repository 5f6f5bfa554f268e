//! Capture-card receiver (DeckLink and other ffmpeg input devices).

use std::sync::Arc;

use ocrdeck_core::{Frame, FrameSource, SourceId, SourceKind};
use tracing::info;

use crate::ffmpeg;
use crate::worker::Feed;

/// Device parameters for a capture card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSettings {
    pub device: String,
    /// `WIDTHxHEIGHT`, e.g. `1920x1080`.
    pub size: String,
    pub fps: String,
    /// ffmpeg input format: `dshow`, `avfoundation`, `v4l2`, `decklink`, ...
    pub format: String,
}

pub struct CardCapture {
    settings: CardSettings,
    feed: Feed,
}

impl CardCapture {
    pub fn new(settings: CardSettings) -> Self {
        Self {
            settings,
            feed: Feed::new(),
        }
    }

    pub fn settings(&self) -> &CardSettings {
        &self.settings
    }
}

impl FrameSource for CardCapture {
    fn kind(&self) -> SourceKind {
        SourceKind::Card
    }

    fn source_id(&self) -> SourceId {
        SourceId::Named(self.settings.device.clone())
    }

    fn start(&self) -> ocrdeck_core::Result<()> {
        let s = &self.settings;
        info!(device = %s.device, size = %s.size, fps = %s.fps, format = %s.format, "Opening capture card");
        self.feed.start(
            &ffmpeg::card_args(&s.format, &s.device, &s.size, &s.fps),
            &s.device,
        )
    }

    fn stop(&self) {
        self.feed.stop();
    }

    fn latest_frame(&self) -> ocrdeck_core::Result<Arc<Frame>> {
        self.feed.latest_frame(&self.settings.device)
    }

    fn is_running(&self) -> bool {
        self.feed.is_running()
    }

    fn last_error(&self) -> Option<String> {
        self.feed.last_error()
    }
}
