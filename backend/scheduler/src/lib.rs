//! `ocrdeck-scheduler`: repeating tasks driving preview refresh and
//! automatic recognition.

pub mod task;

pub use task::{RepeatingTask, TickJob};

/// Initial delays used by the controller.
pub mod delays {
    use std::time::Duration;

    /// Preview refresh at startup.
    pub const PREVIEW_STARTUP: Duration = Duration::from_millis(200);
    /// Preview refresh after being switched back on.
    pub const PREVIEW_RESUME: Duration = Duration::from_millis(50);
}
