//! `ocrdeck-capture`: frame sources for the OcrDeck runtime.
//!
//! - [`StaticCapture`]: one desktop grab per request
//! - [`StreamCapture`]: background ffmpeg receiver for network streams
//! - [`CardCapture`]: background ffmpeg receiver for capture devices
//!
//! Receivers keep only the newest decoded frame.

pub mod card;
pub mod ffmpeg;
pub mod latest;
pub mod monitor;
pub mod ppm;
pub mod stream;
pub mod worker;

pub use card::{CardCapture, CardSettings};
pub use ffmpeg::list_devices;
pub use latest::LatestFrame;
pub use monitor::{list_monitors, MonitorInfo, StaticCapture};
pub use stream::StreamCapture;
