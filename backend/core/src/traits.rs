use std::sync::Arc;

use crate::error::Result;
use crate::frame::Frame;
use crate::types::{SourceId, SourceKind};

/// A producer of decoded still frames.
///
/// Implementations use interior mutability so one instance can be shared
/// between the event loop and background receivers.
pub trait FrameSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Identifier recorded in persisted sessions.
    fn source_id(&self) -> SourceId;

    /// Begin producing frames. Restarting a stopped source is always legal.
    fn start(&self) -> Result<()>;

    /// Best-effort, time-bounded shutdown of any background activity.
    fn stop(&self);

    /// Most recent frame, or `SourceUnavailable` if none has arrived. Never blocks
    /// waiting for a frame.
    fn latest_frame(&self) -> Result<Arc<Frame>>;

    fn is_running(&self) -> bool;

    /// Message of the error that ended the last receive loop, if any.
    fn last_error(&self) -> Option<String>;
}
