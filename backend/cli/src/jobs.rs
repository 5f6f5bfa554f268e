//! Scheduler ticks marshalled back onto the controller's event loop.
//!
//! The repeating tasks never touch controller state directly. Each tick sends
//! a request over a channel and waits for the controller to answer it.
//! Recognition passes run off the loop and report back on the same channel.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use ocrdeck_core::{Result, Session};
use ocrdeck_recognition::SavedPaths;
use ocrdeck_scheduler::TickJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Preview,
    Recognize,
}

pub type TickReply = oneshot::Sender<anyhow::Result<String>>;

pub struct TickRequest {
    pub kind: TickKind,
    pub reply: TickReply,
}

/// An auto pass that ran off the event loop. The scheduler's tick stays
/// unanswered until the controller records the outcome.
pub struct PassFinished {
    pub(crate) outcome: Result<(Session, SavedPaths)>,
    pub(crate) reply: TickReply,
}

/// Everything the controller loop reacts to.
pub enum ControllerEvent {
    Tick(TickRequest),
    PassFinished(PassFinished),
}

pub struct ChannelJob {
    kind: TickKind,
    tx: mpsc::Sender<ControllerEvent>,
}

impl ChannelJob {
    pub fn new(kind: TickKind, tx: mpsc::Sender<ControllerEvent>) -> Self {
        Self { kind, tx }
    }
}

#[async_trait]
impl TickJob for ChannelJob {
    async fn tick(&self) -> anyhow::Result<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControllerEvent::Tick(TickRequest {
                kind: self.kind,
                reply,
            }))
            .await
            .map_err(|_| anyhow::anyhow!("controller is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("controller dropped the {:?} tick", self.kind))?
    }
}
