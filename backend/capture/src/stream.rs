//! Network stream receiver (SRT and anything else ffmpeg can open).

use std::sync::Arc;

use ocrdeck_core::{Frame, FrameSource, SourceId, SourceKind};
use ocrdeck_logging::redact_stream_url;
use tracing::info;

use crate::ffmpeg;
use crate::worker::Feed;

pub struct StreamCapture {
    url: String,
    display_id: String,
    feed: Feed,
}

impl StreamCapture {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            display_id: redact_stream_url(&url),
            url,
            feed: Feed::new(),
        }
    }

    /// The URL as given, secrets included. Only ffmpeg should see it.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for StreamCapture {
    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn source_id(&self) -> SourceId {
        SourceId::Named(self.display_id.clone())
    }

    fn start(&self) -> ocrdeck_core::Result<()> {
        info!(source = %self.display_id, "Connecting to stream");
        self.feed
            .start(&ffmpeg::stream_args(&self.url), &self.display_id)
    }

    fn stop(&self) {
        self.feed.stop();
    }

    fn latest_frame(&self) -> ocrdeck_core::Result<Arc<Frame>> {
        self.feed.latest_frame(&self.display_id)
    }

    fn is_running(&self) -> bool {
        self.feed.is_running()
    }

    fn last_error(&self) -> Option<String> {
        self.feed.last_error()
    }
}
