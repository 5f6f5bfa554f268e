//! Background receiver: an ffmpeg child decoded on a dedicated thread.

use std::io::BufReader;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use ocrdeck_core::{Frame, OcrDeckError};
use tracing::{debug, info, warn};

use crate::ffmpeg;
use crate::latest::LatestFrame;
use crate::ppm::PpmReader;

/// How long `stop` waits for the receive thread before detaching it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// A running ffmpeg child plus the thread publishing its frames.
pub struct Receiver {
    child: Child,
    thread: Option<JoinHandle<()>>,
    done: mpsc::Receiver<()>,
    label: String,
}

impl Receiver {
    /// Spawn `program` with `args` and decode its stdout into `latest`.
    ///
    /// `label` is used in logs and must already be redacted.
    pub fn spawn(
        program: &str,
        args: &[String],
        latest: Arc<LatestFrame>,
        label: String,
    ) -> Result<Self> {
        let generation = latest.begin();
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                latest.fail(generation, format!("failed to start {program}: {e}"));
                return Err(e).with_context(|| format!("failed to start {program}"));
            }
        };
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                abandon(&mut child, &latest, generation, "decoder stdout unavailable");
                anyhow::bail!("decoder stdout unavailable");
            }
        };

        let (done_tx, done) = mpsc::channel();
        let thread_label = label.clone();
        let thread_latest = Arc::clone(&latest);
        let spawned = std::thread::Builder::new()
            .name("ocrdeck-receiver".into())
            .spawn(move || {
                let latest = thread_latest;
                let mut reader = PpmReader::new(BufReader::with_capacity(1 << 20, stdout));
                let mut frames: u64 = 0;
                let outcome = loop {
                    match reader.next_image() {
                        Ok(Some(image)) => {
                            if !latest.publish(generation, Frame::new(image)) {
                                break None;
                            }
                            frames += 1;
                            if frames == 1 {
                                info!(source = %thread_label, "First frame received");
                            }
                        }
                        Ok(None) => break Some("stream ended".to_string()),
                        Err(e) => break Some(format!("{e:#}")),
                    }
                };
                match outcome {
                    Some(message) if latest.is_current(generation) => {
                        warn!(source = %thread_label, frames, error = %message, "Receive loop ended");
                        latest.fail(generation, message);
                    }
                    _ => debug!(source = %thread_label, frames, "Receive loop stopped"),
                }
                let _ = done_tx.send(());
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                abandon(&mut child, &latest, generation, &format!("receiver thread: {e}"));
                return Err(e).context("failed to spawn receiver thread");
            }
        };

        info!(source = %label, pid = child.id(), "Receiver started");
        Ok(Self {
            child,
            thread: Some(thread),
            done,
            label,
        })
    }

    /// Kill the child and wait up to [`STOP_TIMEOUT`] for the thread.
    pub fn stop(mut self, latest: &LatestFrame) {
        latest.end();
        if let Err(e) = self.child.kill() {
            debug!(source = %self.label, error = %e, "ffmpeg already exited");
        }
        let _ = self.child.wait();

        match self.done.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                info!(source = %self.label, "Receiver stopped");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    source = %self.label,
                    "Receiver thread did not finish within {:?}; detaching",
                    STOP_TIMEOUT
                );
            }
        }
    }
}

/// Kill a child that never got a receive thread and record why.
fn abandon(child: &mut Child, latest: &LatestFrame, generation: u64, message: &str) {
    let _ = child.kill();
    let _ = child.wait();
    latest.fail(generation, message.to_string());
}

/// Start/stop bookkeeping shared by the receiver-backed sources.
#[derive(Default)]
pub struct Feed {
    latest: Arc<LatestFrame>,
    receiver: Mutex<Option<Receiver>>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running receiver with a fresh ffmpeg one.
    pub fn start(&self, args: &[String], source_id: &str) -> ocrdeck_core::Result<()> {
        self.start_program(&ffmpeg::program(), args, source_id)
    }

    pub fn start_program(
        &self,
        program: &str,
        args: &[String],
        source_id: &str,
    ) -> ocrdeck_core::Result<()> {
        let mut guard = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.take() {
            previous.stop(&self.latest);
        }
        let receiver = Receiver::spawn(program, args, Arc::clone(&self.latest), source_id.to_string())
            .map_err(|e| OcrDeckError::ConnectionFailure {
                source_id: source_id.to_string(),
                message: format!("{e:#}"),
            })?;
        *guard = Some(receiver);
        Ok(())
    }

    /// No-op when nothing is running.
    pub fn stop(&self) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match receiver {
            Some(receiver) => receiver.stop(&self.latest),
            None => self.latest.end(),
        }
    }

    pub fn latest_frame(&self, source_id: &str) -> ocrdeck_core::Result<Arc<Frame>> {
        self.latest.get().ok_or_else(|| {
            let detail = match self.latest.last_error() {
                Some(err) => format!("no frame from {source_id} ({err})"),
                None if self.latest.is_running() => format!("no frame from {source_id} yet"),
                None => format!("{source_id} is not running"),
            };
            OcrDeckError::SourceUnavailable(detail)
        })
    }

    pub fn is_running(&self) -> bool {
        self.latest.is_running()
    }

    pub fn last_error(&self) -> Option<String> {
        self.latest.last_error()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.stop();
    }
}
