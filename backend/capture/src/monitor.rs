//! Monitor capture: one still grab per request, no background activity.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use ocrdeck_core::{Frame, FrameSource, OcrDeckError, Rect, SourceId, SourceKind};
use tracing::{debug, warn};

/// A selectable monitor, 1-based like the rest of the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

/// Grabs the selected monitor synchronously on every `latest_frame` call.
/// Holds no background activity, so `start` and `stop` do nothing.
pub struct StaticCapture {
    index: u32,
    region: Option<Rect>,
    last_error: Mutex<Option<String>>,
}

impl StaticCapture {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            region: None,
            last_error: Mutex::new(None),
        }
    }

    /// Restrict grabs to a pixel rectangle of the monitor.
    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn grab(&self) -> Result<Frame> {
        if self.index == 0 {
            anyhow::bail!("monitor indices start at 1");
        }
        let image = backend::grab(self.index)?;
        let frame = Frame::new(image);
        match &self.region {
            Some(region) => {
                let rect = region.clamp_to(frame.width(), frame.height())?;
                Ok(Frame::with_timestamp(frame.crop(&rect)?, frame.captured_at()))
            }
            None => Ok(frame),
        }
    }

    fn set_error(&self, message: Option<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }
}

impl FrameSource for StaticCapture {
    fn kind(&self) -> SourceKind {
        SourceKind::Monitor
    }

    fn source_id(&self) -> SourceId {
        SourceId::Monitor(self.index)
    }

    fn start(&self) -> ocrdeck_core::Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn latest_frame(&self) -> ocrdeck_core::Result<Arc<Frame>> {
        match self.grab() {
            Ok(frame) => {
                self.set_error(None);
                Ok(Arc::new(frame))
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(monitor = self.index, error = %message, "Monitor grab failed");
                self.set_error(Some(message.clone()));
                Err(OcrDeckError::SourceUnavailable(format!(
                    "monitor {}: {message}",
                    self.index
                )))
            }
        }
    }

    fn is_running(&self) -> bool {
        true
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Monitors available for capture. Empty if none can be detected.
pub fn list_monitors() -> Vec<MonitorInfo> {
    match backend::list() {
        Ok(monitors) => monitors,
        Err(e) => {
            debug!(error = %e, "Monitor enumeration failed");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "xcap"))]
mod backend {
    use super::*;
    use std::process::{Command, Stdio};

    use anyhow::{bail, Context};
    use image::RgbImage;

    use crate::ffmpeg::{self, DesktopGrabber};
    use crate::ppm;

    pub fn grab(index: u32) -> Result<RgbImage> {
        let grabber = DesktopGrabber::detect();
        grabber.check_index(index)?;
        let output = Command::new(ffmpeg::program())
            .args(grabber.grab_args(index))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("failed to run ffmpeg for a desktop grab")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "desktop grab exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }
        ppm::decode_single(&output.stdout)
    }

    pub fn list() -> Result<Vec<MonitorInfo>> {
        if DesktopGrabber::detect() == DesktopGrabber::AvFoundation {
            let screens = ffmpeg::list_devices("avfoundation")
                .into_iter()
                .filter(|name| name.starts_with("Capture screen"))
                .count() as u32;
            let mut monitors = Vec::new();
            for index in 1..=screens {
                let image = grab(index)?;
                monitors.push(MonitorInfo {
                    index,
                    width: image.width(),
                    height: image.height(),
                });
            }
            return Ok(monitors);
        }
        // x11grab and gdigrab see one virtual desktop.
        let image = grab(1)?;
        Ok(vec![MonitorInfo {
            index: 1,
            width: image.width(),
            height: image.height(),
        }])
    }
}

#[cfg(feature = "xcap")]
mod backend {
    use super::*;
    use anyhow::Context;
    use image::{DynamicImage, RgbImage};

    fn monitor(index: u32) -> Result<xcap::Monitor> {
        let monitors = xcap::Monitor::all()?;
        let count = monitors.len();
        index
            .checked_sub(1)
            .and_then(|i| monitors.into_iter().nth(i as usize))
            .with_context(|| format!("monitor {index} not found ({count} detected)"))
    }

    pub fn grab(index: u32) -> Result<RgbImage> {
        let shot = monitor(index)?.capture_image()?;
        Ok(DynamicImage::ImageRgba8(shot).into_rgb8())
    }

    pub fn list() -> Result<Vec<MonitorInfo>> {
        let mut out = Vec::new();
        for (i, monitor) in xcap::Monitor::all()?.iter().enumerate() {
            out.push(MonitorInfo {
                index: i as u32 + 1,
                width: monitor.width()?,
                height: monitor.height()?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_source_identity() {
        let capture = StaticCapture::new(2);
        assert_eq!(capture.kind(), SourceKind::Monitor);
        assert_eq!(capture.source_id(), SourceId::Monitor(2));
        capture.start().unwrap();
        capture.stop();
        assert!(capture.is_running());
    }

    #[test]
    fn index_zero_is_unavailable() {
        let capture = StaticCapture::new(0);
        let err = capture.latest_frame().unwrap_err();
        assert!(matches!(err, OcrDeckError::SourceUnavailable(_)));
        assert!(capture.last_error().unwrap().contains("start at 1"));
    }
}
