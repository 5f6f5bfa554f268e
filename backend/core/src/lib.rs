//! `ocrdeck-core`: shared types for the OcrDeck region OCR runtime.
//!
//! Geometry, region bookkeeping, preview coordinate mapping, frames, sessions,
//! and the `FrameSource` seam implemented by the capture crate.

pub mod error;
pub mod frame;
pub mod geometry;
pub mod mapper;
pub mod region;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{OcrDeckError, Result};
pub use frame::Frame;
pub use geometry::Rect;
pub use mapper::{CoordinateMapper, DragTracker};
pub use region::RegionSet;
pub use session::{RecognitionResult, Session};
pub use traits::FrameSource;
pub use types::{SourceId, SourceKind};
