//! Single-slot frame store shared between a receiver thread and readers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ocrdeck_core::Frame;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the newest frame only. Each receiver run gets a generation, and
/// writes from a stale generation are dropped.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Arc<Frame>>>,
    last_error: Mutex<Option<String>>,
    running: AtomicBool,
    generation: AtomicU64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the slot and error, mark running, and return the new generation.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.slot) = None;
        *lock(&self.last_error) = None;
        self.running.store(true, Ordering::SeqCst);
        generation
    }

    /// Invalidate the current generation and mark stopped. The last frame
    /// stays readable.
    pub fn end(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Replace the slot content. Returns false if `generation` is stale.
    pub fn publish(&self, generation: u64, frame: Frame) -> bool {
        let mut slot = lock(&self.slot);
        if !self.is_current(generation) {
            return false;
        }
        *slot = Some(Arc::new(frame));
        true
    }

    /// Record why the receive loop ended and mark it stopped.
    pub fn fail(&self, generation: u64, message: String) {
        if !self.is_current(generation) {
            return;
        }
        *lock(&self.last_error) = Some(message);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn get(&self) -> Option<Arc<Frame>> {
        lock(&self.slot).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(w: u32) -> Frame {
        Frame::new(RgbImage::new(w, 1))
    }

    #[test]
    fn newest_frame_wins() {
        let latest = LatestFrame::new();
        assert!(latest.get().is_none());
        let generation = latest.begin();
        assert!(latest.publish(generation, frame(1)));
        assert!(latest.publish(generation, frame(2)));
        assert_eq!(latest.get().unwrap().width(), 2);
    }

    #[test]
    fn stale_generation_cannot_write() {
        let latest = LatestFrame::new();
        let old = latest.begin();
        latest.end();
        let current = latest.begin();
        assert!(!latest.publish(old, frame(9)));
        latest.fail(old, "late".into());
        assert!(latest.get().is_none());
        assert!(latest.last_error().is_none());
        assert!(latest.is_running());

        latest.fail(current, "connection reset".into());
        assert!(!latest.is_running());
        assert_eq!(latest.last_error().as_deref(), Some("connection reset"));
    }

    #[test]
    fn restart_resets_slot_and_error() {
        let latest = LatestFrame::new();
        let g = latest.begin();
        latest.publish(g, frame(3));
        latest.fail(g, "eof".into());
        latest.begin();
        assert!(latest.get().is_none());
        assert!(latest.last_error().is_none());
        assert!(latest.is_running());
    }
}
