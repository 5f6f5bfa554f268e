//! The controller: owns regions, frame sources, the engine cache and both
//! repeating tasks. Everything here runs on the single-threaded event loop.
//! Recognition is pushed onto the blocking pool; automatic passes run as
//! spawned tasks so preview ticks keep being answered meanwhile.

use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ocrdeck_capture::{CardCapture, CardSettings, StaticCapture, StreamCapture};
use ocrdeck_config::{clamp_interval, Settings, MIN_AUTO_INTERVAL_MS, MIN_PREVIEW_INTERVAL_MS};
use ocrdeck_core::{
    CoordinateMapper, Frame, FrameSource, OcrDeckError, Rect, RegionSet, Result, Session,
    SourceId, SourceKind,
};
use ocrdeck_logging::{RunEvent, RunEventLogger, STATUS_TARGET};
use ocrdeck_recognition::{
    recognize_blocking, BackendFactory, EngineCache, SavedPaths, SessionRecorder, SharedEngine,
};
use ocrdeck_scheduler::{delays, RepeatingTask};

use crate::jobs::{ChannelJob, ControllerEvent, PassFinished, TickKind, TickReply, TickRequest};

/// Creates the concrete frame sources. Swapped out in tests.
pub trait SourceProvider: Send + Sync {
    /// `region` restricts the grab to a rectangle of that monitor.
    fn monitor(&self, index: u32, region: Option<Rect>) -> Box<dyn FrameSource>;
    fn stream(&self, url: &str) -> Box<dyn FrameSource>;
    fn card(&self, settings: CardSettings) -> Box<dyn FrameSource>;
    /// Capture devices for `format`; empty when they cannot be listed.
    fn devices(&self, format: &str) -> Vec<String>;
}

/// ffmpeg-backed sources.
pub struct LiveSources;

impl SourceProvider for LiveSources {
    fn monitor(&self, index: u32, region: Option<Rect>) -> Box<dyn FrameSource> {
        let capture = StaticCapture::new(index);
        Box::new(match region {
            Some(region) => capture.with_region(region),
            None => capture,
        })
    }

    fn stream(&self, url: &str) -> Box<dyn FrameSource> {
        Box::new(StreamCapture::new(url))
    }

    fn card(&self, settings: CardSettings) -> Box<dyn FrameSource> {
        Box::new(CardCapture::new(settings))
    }

    fn devices(&self, format: &str) -> Vec<String> {
        ocrdeck_capture::list_devices(format)
    }
}

/// A region translated to preview coordinates, labelled 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayBox {
    pub label: usize,
    pub edges: [i32; 4],
}

/// Everything one recognition pass needs, detached from the controller.
struct PassJob {
    engine: SharedEngine,
    frame: Arc<Frame>,
    regions: RegionSet,
    source: SourceId,
    recorder: SessionRecorder,
}

impl PassJob {
    async fn run(self) -> Result<(Session, SavedPaths)> {
        let session = recognize_blocking(self.engine, self.frame, self.regions, self.source).await?;
        let saved = self.recorder.persist(&session).await?;
        Ok((session, saved))
    }
}

/// The frame currently on screen and where it came from.
struct Captured {
    frame: Arc<Frame>,
    source: SourceId,
}

pub struct App {
    settings: Settings,
    provider: Arc<dyn SourceProvider>,
    monitor: Box<dyn FrameSource>,
    stream: Option<Box<dyn FrameSource>>,
    card: Option<Box<dyn FrameSource>>,
    active: SourceKind,
    current: Option<Captured>,
    regions: RegionSet,
    engines: EngineCache,
    preview: RepeatingTask,
    auto: RepeatingTask,
    events_tx: mpsc::Sender<ControllerEvent>,
    events_rx: Option<mpsc::Receiver<ControllerEvent>>,
    pass: Option<JoinHandle<()>>,
    last_session: Option<Session>,
    status: String,
}

impl App {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn SourceProvider>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(8);
        let monitor = provider.monitor(settings.monitor_index, settings.monitor_region);
        Self {
            monitor,
            provider,
            stream: None,
            card: None,
            active: SourceKind::Monitor,
            current: None,
            regions: RegionSet::new(),
            engines: EngineCache::new(factory),
            preview: RepeatingTask::new("preview").with_initial_delay(delays::PREVIEW_STARTUP),
            auto: RepeatingTask::new("auto"),
            events_tx,
            events_rx: Some(events_rx),
            pass: None,
            last_session: None,
            status: "Ready".to_string(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn active_kind(&self) -> SourceKind {
        self.active
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.current.as_ref().map(|c| Arc::clone(&c.frame))
    }

    pub fn last_session(&self) -> Option<&Session> {
        self.last_session.as_ref()
    }

    pub fn preview_running(&self) -> bool {
        self.preview.is_running()
    }

    pub fn auto_running(&self) -> bool {
        self.auto.is_running()
    }

    /// Successful automatic passes since auto recognition was last switched on.
    pub fn auto_cycles(&self) -> u64 {
        self.auto.cycles()
    }

    /// Whether an automatic pass is running off the event loop.
    pub fn pass_in_flight(&self) -> bool {
        self.pass.is_some()
    }

    /// The receiving end for scheduler ticks and finished passes; hand each
    /// event to [`App::handle_event`]. Can be taken once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ControllerEvent>> {
        self.events_rx.take()
    }

    // ── Sources ────────────────────────────────────────────────────────────

    /// Switch to the source kind named in the settings.
    pub fn activate_configured_source(&mut self) -> Result<()> {
        match self.settings.source_kind {
            SourceKind::Monitor => {
                self.select_monitor(self.settings.monitor_index);
                Ok(())
            }
            SourceKind::Stream => {
                let url = self.settings.stream_url.clone();
                self.connect_stream(&url)
            }
            SourceKind::Card => {
                let (device, size, fps) = (
                    self.settings.card_device.clone(),
                    self.settings.card_size.clone(),
                    self.settings.card_fps.clone(),
                );
                self.connect_card(&device, &size, &fps)
            }
        }
    }

    pub fn select_monitor(&mut self, index: u32) {
        self.settings.monitor_index = index;
        self.monitor = self.provider.monitor(index, self.settings.monitor_region);
        self.active = SourceKind::Monitor;
        self.set_status(format!("Monitor {index} selected"));
    }

    /// Replace any previous stream receiver and start a new one.
    pub fn connect_stream(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(self.report(OcrDeckError::Config(
                "enter a stream URL, e.g. srt://127.0.0.1:9000".into(),
            )));
        }
        if let Some(previous) = self.stream.take() {
            previous.stop();
        }
        let source = self.provider.stream(url);
        self.settings.stream_url = url.to_string();
        self.active = SourceKind::Stream;
        let started = self.start_source(source.as_ref());
        self.stream = Some(source);
        started?;
        self.set_status("Connecting to stream... waiting for the first frame");
        Ok(())
    }

    /// Open a capture device. An empty `device` falls back to the first
    /// listed device; empty `size`/`fps` fall back to the configured values.
    pub fn connect_card(&mut self, device: &str, size: &str, fps: &str) -> Result<()> {
        let format = self.settings.card_format.clone();
        let device = match device.trim() {
            "" => self
                .provider
                .devices(&format)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    self.report(OcrDeckError::Config(
                        "no capture devices found; enter the device name manually".into(),
                    ))
                })?,
            name => name.to_string(),
        };
        let size = non_empty_or(size, &self.settings.card_size);
        let fps = non_empty_or(fps, &self.settings.card_fps);

        if let Some(previous) = self.card.take() {
            previous.stop();
        }
        let source = self.provider.card(CardSettings {
            device: device.clone(),
            size: size.clone(),
            fps: fps.clone(),
            format,
        });
        self.settings.card_device = device;
        self.settings.card_size = size;
        self.settings.card_fps = fps;
        self.active = SourceKind::Card;
        let started = self.start_source(source.as_ref());
        self.card = Some(source);
        started?;
        self.ensure_preview_running();
        self.set_status("Opening capture card... waiting for the first frame");
        Ok(())
    }

    fn start_source(&mut self, source: &dyn FrameSource) -> Result<()> {
        match source.start() {
            Ok(()) => {
                RunEventLogger::log(RunEvent::SourceConnected {
                    kind: source.kind().to_string(),
                    source: source.source_id().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                RunEventLogger::log(RunEvent::SourceFailed {
                    source: source.source_id().to_string(),
                    error: e.to_string(),
                });
                Err(self.report(e))
            }
        }
    }

    fn active_source(&self) -> Option<&dyn FrameSource> {
        match self.active {
            SourceKind::Monitor => Some(self.monitor.as_ref()),
            SourceKind::Stream => self.stream.as_deref(),
            SourceKind::Card => self.card.as_deref(),
        }
    }

    /// Read a frame from the active source without storing it.
    pub fn grab_current_frame(&self) -> Result<Arc<Frame>> {
        let what = match self.active {
            SourceKind::Monitor => "monitor",
            SourceKind::Stream => "stream",
            SourceKind::Card => "capture card",
        };
        let source = self
            .active_source()
            .ok_or_else(|| OcrDeckError::SourceUnavailable(format!("no {what} connected")))?;
        if !source.is_running() {
            let id = source.source_id();
            return Err(OcrDeckError::SourceUnavailable(match source.last_error() {
                Some(err) => format!("{what} {id} is not running: {err}"),
                None => format!("{what} {id} is not running"),
            }));
        }
        source.latest_frame()
    }

    fn store_frame(&mut self) -> Result<Arc<Frame>> {
        let frame = self.grab_current_frame()?;
        let source = self
            .active_source()
            .map(|s| s.source_id())
            .unwrap_or(SourceId::Monitor(self.settings.monitor_index));
        self.current = Some(Captured {
            frame: Arc::clone(&frame),
            source,
        });
        Ok(frame)
    }

    /// Grab a frame from the active source and make it the current frame.
    pub fn capture_now(&mut self) -> Result<Arc<Frame>> {
        match self.store_frame() {
            Ok(frame) => {
                self.set_status(format!(
                    "Captured {}x{}. Draw regions to recognize.",
                    frame.width(),
                    frame.height()
                ));
                Ok(frame)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Poll the active source until it produces a frame. Gives up early when
    /// the source stops running.
    pub async fn wait_for_first_frame(&mut self, retries: u32, delay: Duration) -> Result<Arc<Frame>> {
        let mut attempts = 0;
        loop {
            match self.store_frame() {
                Ok(frame) => {
                    self.set_status(format!(
                        "Source is live ({}x{}). Draw regions, then run recognition.",
                        frame.width(),
                        frame.height()
                    ));
                    return Ok(frame);
                }
                Err(e) => {
                    let stopped = self.active_source().map_or(true, |s| !s.is_running());
                    if stopped || attempts >= retries {
                        warn!(attempts, error = %e, "No frame from source");
                        self.set_status(format!(
                            "No picture yet ({e}). Check the cable or input format."
                        ));
                        return Err(e);
                    }
                    attempts += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // ── Regions ────────────────────────────────────────────────────────────

    /// Add a region in source pixels, clamped to the current frame if there
    /// is one.
    pub fn add_region(&mut self, rect: Rect) -> Result<Rect> {
        let bounds = self.current.as_ref().map(|c| c.frame.size());
        let rect = match bounds {
            Some((width, height)) => match rect.clamp_to(width, height) {
                Ok(clamped) => clamped,
                Err(e) => return Err(self.report(e)),
            },
            None => rect,
        };
        self.regions.add(rect);
        self.set_status(format!("Region {} added: {rect}", self.regions.len()));
        Ok(rect)
    }

    /// Add a region from a drag rectangle in preview coordinates.
    pub fn add_region_from_display(&mut self, drag: [i32; 4], viewport: (u32, u32)) -> Result<Rect> {
        let frame = self.current_frame().ok_or_else(|| {
            OcrDeckError::SourceUnavailable("capture a frame before drawing regions".into())
        })?;
        let mapper = CoordinateMapper::fit(frame.size(), viewport)
            .ok_or_else(|| OcrDeckError::InvalidRegion("preview area is empty".into()))?;
        let rect = mapper.rect_to_source(drag).map_err(|e| self.report(e))?;
        self.add_region(rect)
    }

    /// 0-based, like list selection. Out of range does nothing.
    pub fn remove_region(&mut self, index: usize) -> Option<Rect> {
        let removed = self.regions.remove(index);
        if removed.is_some() {
            self.set_status(format!("{} region(s) left", self.regions.len()));
        }
        removed
    }

    pub fn clear_regions(&mut self) {
        self.regions.clear();
        self.set_status("Regions cleared");
    }

    /// Regions mapped into a preview of `viewport` size. Empty without a frame.
    pub fn overlay(&self, viewport: (u32, u32)) -> Vec<OverlayBox> {
        let Some(mapper) = self
            .current
            .as_ref()
            .and_then(|c| CoordinateMapper::fit(c.frame.size(), viewport))
        else {
            return Vec::new();
        };
        self.regions
            .iter()
            .enumerate()
            .map(|(i, rect)| OverlayBox {
                label: i + 1,
                edges: mapper.rect_to_display(rect),
            })
            .collect()
    }

    /// The current frame scaled to fit `viewport`.
    pub fn preview_image(&self, viewport: (u32, u32)) -> Option<RgbImage> {
        let current = self.current.as_ref()?;
        let mapper = CoordinateMapper::fit(current.frame.size(), viewport)?;
        Some(current.frame.preview(&mapper))
    }

    // ── Recognition ────────────────────────────────────────────────────────

    /// Recognize the current frame and save the session.
    pub async fn run_recognition(&mut self, keep_history: bool) -> Result<SavedPaths> {
        self.set_status("Running recognition...");
        match self.recognize_and_save(keep_history).await {
            Ok(saved) => {
                self.set_status(format!("Done. Saved {}", saved.latest.display()));
                Ok(saved)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    async fn recognize_and_save(&mut self, keep_history: bool) -> Result<SavedPaths> {
        let outcome = match self.prepare_pass(keep_history) {
            Ok(job) => job.run().await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok((session, saved)) => {
                self.record_pass(session, &saved);
                Ok(saved)
            }
            Err(e) => {
                log_pass_failure(&e);
                Err(e)
            }
        }
    }

    fn prepare_pass(&mut self, keep_history: bool) -> Result<PassJob> {
        let current = self.current.as_ref().ok_or_else(|| {
            OcrDeckError::SourceUnavailable("capture a frame first".into())
        })?;
        let (frame, source) = (Arc::clone(&current.frame), current.source.clone());
        if self.regions.is_empty() {
            return Err(OcrDeckError::EmptyConfiguration(
                "draw at least one region".into(),
            ));
        }
        let regions = self
            .regions
            .iter()
            .map(|r| r.clamp_to(frame.width(), frame.height()))
            .collect::<Result<RegionSet>>()?;

        let engine = self
            .engines
            .get_or_build(&self.settings.languages, self.settings.gpu)?;
        Ok(PassJob {
            engine,
            frame,
            regions,
            source,
            recorder: SessionRecorder::new(&self.settings.output_dir, keep_history),
        })
    }

    fn record_pass(&mut self, session: Session, saved: &SavedPaths) {
        RunEventLogger::log(RunEvent::PassCompleted {
            source: session.source.to_string(),
            regions: session.boxes.len(),
            latest_path: saved.latest.display().to_string(),
            history_path: saved.history.as_ref().map(|p| p.display().to_string()),
        });
        self.last_session = Some(session);
    }

    pub fn set_languages(&mut self, languages: Vec<String>) {
        self.settings.languages = languages;
    }

    pub fn set_gpu(&mut self, gpu: bool) {
        self.settings.gpu = gpu;
    }

    // ── Schedules ──────────────────────────────────────────────────────────

    /// Start the preview refresh the way the app does at startup.
    pub fn start_live_preview(&mut self) {
        self.start_preview(delays::PREVIEW_STARTUP);
    }

    pub fn ensure_preview_running(&mut self) {
        if !self.preview.is_running() {
            self.start_live_preview();
        }
    }

    fn start_preview(&mut self, initial: Duration) {
        let interval = self.set_preview_interval(self.settings.preview_interval_ms);
        self.preview.set_initial_delay(Some(initial));
        let job = Arc::new(ChannelJob::new(TickKind::Preview, self.events_tx.clone()));
        if self.preview.start(interval, job) {
            self.set_status("Live preview running");
        }
    }

    /// Returns whether the preview is running afterwards.
    pub fn toggle_preview(&mut self) -> bool {
        if self.preview.is_running() {
            self.preview.stop();
            self.set_status("Live preview paused");
            return false;
        }
        self.start_preview(delays::PREVIEW_RESUME);
        true
    }

    /// Returns whether auto recognition is running afterwards. Switching it
    /// on needs a frame (one is captured if missing) and at least one region.
    pub fn toggle_auto(&mut self) -> Result<bool> {
        if self.auto.is_running() {
            self.auto.stop();
            self.set_status("Auto recognition stopped");
            return Ok(false);
        }
        if self.current.is_none() {
            self.capture_now()?;
        }
        if self.regions.is_empty() {
            return Err(self.report(OcrDeckError::EmptyConfiguration(
                "auto recognition needs at least one region".into(),
            )));
        }
        let interval = self.set_auto_interval(self.settings.auto_interval_ms);
        let job = Arc::new(ChannelJob::new(TickKind::Recognize, self.events_tx.clone()));
        self.auto.start(interval, job);
        self.set_status(format!("Auto recognition every {interval} ms"));
        Ok(true)
    }

    /// Clamp to the floor and apply from the next tick. Returns the value used.
    pub fn set_preview_interval(&mut self, ms: u64) -> u64 {
        let ms = clamp_interval("previewIntervalMs", ms, MIN_PREVIEW_INTERVAL_MS);
        self.settings.preview_interval_ms = ms;
        self.preview.set_interval(ms);
        ms
    }

    pub fn set_auto_interval(&mut self, ms: u64) -> u64 {
        let ms = clamp_interval("autoIntervalMs", ms, MIN_AUTO_INTERVAL_MS);
        self.settings.auto_interval_ms = ms;
        self.auto.set_interval(ms);
        ms
    }

    /// React to one controller event. Outcomes become the status line.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Tick(request) => self.handle_tick(request),
            ControllerEvent::PassFinished(done) => self.finish_auto_pass(done),
        }
    }

    fn handle_tick(&mut self, request: TickRequest) {
        match request.kind {
            TickKind::Preview => {
                let outcome = self.preview_tick();
                match &outcome {
                    // Preview refreshes are too frequent to log.
                    Ok(message) => self.status = message.clone(),
                    Err(e) => self.set_status(format!("Preview error: {e}")),
                }
                let _ = request.reply.send(outcome.map_err(anyhow::Error::from));
            }
            TickKind::Recognize => self.start_auto_pass(request.reply),
        }
    }

    pub fn preview_tick(&mut self) -> Result<String> {
        let frame = self.store_frame()?;
        Ok(format!(
            "Live preview {}x{}",
            frame.width(),
            frame.height()
        ))
    }

    /// Grab a fresh frame and run the pass as a task. The tick is answered
    /// from [`App::finish_auto_pass`] once the result is saved.
    fn start_auto_pass(&mut self, reply: TickReply) {
        if self.pass.is_some() {
            let _ = reply.send(Err(anyhow::anyhow!("previous pass is still running")));
            return;
        }
        let prepared = self
            .store_frame()
            .and_then(|_| self.prepare_pass(self.settings.keep_history));
        let job = match prepared {
            Ok(job) => job,
            Err(e) => {
                log_pass_failure(&e);
                self.set_status(format!("Auto recognition error: {e}"));
                let _ = reply.send(Err(e.into()));
                return;
            }
        };
        let events = self.events_tx.clone();
        self.pass = Some(tokio::spawn(async move {
            let outcome = job.run().await;
            let _ = events
                .send(ControllerEvent::PassFinished(PassFinished { outcome, reply }))
                .await;
        }));
    }

    fn finish_auto_pass(&mut self, done: PassFinished) {
        self.pass = None;
        let answer = match done.outcome {
            Ok((session, saved)) => {
                self.record_pass(session, &saved);
                let name = saved
                    .latest
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let message = format!(
                    "Auto recognition #{} | JSON: {name} (overwritten)",
                    self.auto.cycles() + 1
                );
                self.set_status(message.clone());
                Ok(message)
            }
            Err(e) => {
                log_pass_failure(&e);
                self.set_status(format!("Auto recognition error: {e}"));
                Err(e.into())
            }
        };
        let _ = done.reply.send(answer);
    }

    /// Stop both schedules and every background receiver.
    pub fn shutdown(&mut self) {
        self.preview.stop();
        self.auto.stop();
        if let Some(stream) = &self.stream {
            stream.stop();
        }
        if let Some(card) = &self.card {
            card.stop();
        }
        info!("Controller shut down");
    }

    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: STATUS_TARGET, "{message}");
        self.status = message;
    }

    /// Put the error on the status line and hand it back.
    fn report(&mut self, e: OcrDeckError) -> OcrDeckError {
        warn!(target: STATUS_TARGET, category = e.kind(), "{e}");
        self.status = e.to_string();
        e
    }
}

fn log_pass_failure(e: &OcrDeckError) {
    RunEventLogger::log(RunEvent::PassFailed {
        category: e.kind().to_string(),
        error: e.to_string(),
    });
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    match value.trim() {
        "" => fallback.to_string(),
        v => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use image::Rgb;
    use tokio::sync::oneshot;

    use ocrdeck_recognition::{TextBackend, TextFragment, LATEST_FILE_NAME};

    struct StubSource {
        kind: SourceKind,
        id: SourceId,
        frame: Option<Arc<Frame>>,
        running: AtomicBool,
        start_error: Option<String>,
    }

    impl StubSource {
        fn new(kind: SourceKind, id: SourceId, frame: Option<Arc<Frame>>) -> Self {
            Self {
                kind,
                id,
                frame,
                running: AtomicBool::new(false),
                start_error: None,
            }
        }
    }

    impl FrameSource for StubSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn source_id(&self) -> SourceId {
            self.id.clone()
        }

        fn start(&self) -> Result<()> {
            if let Some(message) = &self.start_error {
                return Err(OcrDeckError::ConnectionFailure {
                    source_id: self.id.to_string(),
                    message: message.clone(),
                });
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn latest_frame(&self) -> Result<Arc<Frame>> {
            self.frame
                .clone()
                .ok_or_else(|| OcrDeckError::SourceUnavailable("no frame received yet".into()))
        }

        fn is_running(&self) -> bool {
            self.kind == SourceKind::Monitor || self.running.load(Ordering::SeqCst)
        }

        fn last_error(&self) -> Option<String> {
            self.start_error.clone()
        }
    }

    #[derive(Default)]
    struct StubProvider {
        size: Option<(u32, u32)>,
        stream_error: Option<String>,
        stream_has_frame: bool,
        devices: Vec<String>,
        opened_cards: Arc<Mutex<Vec<CardSettings>>>,
        opened_monitors: Arc<Mutex<Vec<(u32, Option<Rect>)>>>,
    }

    impl StubProvider {
        fn picture(&self) -> Option<Arc<Frame>> {
            self.size.map(|(w, h)| {
                Arc::new(Frame::new(RgbImage::from_fn(w, h, |x, y| {
                    Rgb([(x % 256) as u8, (y % 256) as u8, 9])
                })))
            })
        }
    }

    impl SourceProvider for StubProvider {
        fn monitor(&self, index: u32, region: Option<Rect>) -> Box<dyn FrameSource> {
            self.opened_monitors.lock().unwrap().push((index, region));
            Box::new(StubSource::new(
                SourceKind::Monitor,
                SourceId::Monitor(index),
                self.picture(),
            ))
        }

        fn stream(&self, url: &str) -> Box<dyn FrameSource> {
            let frame = if self.stream_has_frame { self.picture() } else { None };
            let mut source = StubSource::new(SourceKind::Stream, SourceId::Named(url.into()), frame);
            source.start_error = self.stream_error.clone();
            Box::new(source)
        }

        fn card(&self, settings: CardSettings) -> Box<dyn FrameSource> {
            let id = SourceId::Named(settings.device.clone());
            self.opened_cards.lock().unwrap().push(settings);
            Box::new(StubSource::new(SourceKind::Card, id, self.picture()))
        }

        fn devices(&self, _format: &str) -> Vec<String> {
            self.devices.clone()
        }
    }

    type Script = Arc<Mutex<VecDeque<anyhow::Result<Vec<TextFragment>>>>>;

    struct ScriptedBackend {
        script: Script,
    }

    impl TextBackend for ScriptedBackend {
        fn read_fragments(&mut self, _crop: &RgbImage) -> anyhow::Result<Vec<TextFragment>> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![TextFragment::new("HELLO", 0.95)]))
        }
    }

    struct ScriptedFactory {
        script: Script,
    }

    impl BackendFactory for ScriptedFactory {
        fn build(&self, _languages: &[String], _gpu: bool) -> anyhow::Result<Box<dyn TextBackend>> {
            Ok(Box::new(ScriptedBackend {
                script: Arc::clone(&self.script),
            }))
        }
    }

    /// Holds every read until the test sends on the paired channel.
    struct GatedBackend {
        gate: Arc<Mutex<std::sync::mpsc::Receiver<()>>>,
    }

    impl TextBackend for GatedBackend {
        fn read_fragments(&mut self, _crop: &RgbImage) -> anyhow::Result<Vec<TextFragment>> {
            self.gate.lock().unwrap().recv()?;
            Ok(vec![TextFragment::new("SLOW", 0.9)])
        }
    }

    struct GatedFactory {
        gate: Arc<Mutex<std::sync::mpsc::Receiver<()>>>,
    }

    impl BackendFactory for GatedFactory {
        fn build(&self, _languages: &[String], _gpu: bool) -> anyhow::Result<Box<dyn TextBackend>> {
            Ok(Box::new(GatedBackend {
                gate: Arc::clone(&self.gate),
            }))
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            languages: vec!["en".into()],
            output_dir: dir.to_path_buf(),
            keep_history: false,
            monitor_index: 1,
            ..Settings::default()
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ocrdeck-app-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn app(name: &str, provider: StubProvider) -> (App, Script, PathBuf) {
        let dir = scratch(name);
        let script: Script = Arc::default();
        let factory = Arc::new(ScriptedFactory {
            script: Arc::clone(&script),
        });
        (App::new(settings_in(&dir), Arc::new(provider), factory), script, dir)
    }

    fn tick(app: &mut App, kind: TickKind) -> oneshot::Receiver<anyhow::Result<String>> {
        let (reply, rx) = oneshot::channel();
        app.handle_event(ControllerEvent::Tick(TickRequest { kind, reply }));
        rx
    }

    /// One automatic pass, driven the way the watch loop drives it.
    async fn auto_pass(
        app: &mut App,
        events: &mut mpsc::Receiver<ControllerEvent>,
    ) -> anyhow::Result<String> {
        let mut reply = tick(app, TickKind::Recognize);
        if let Ok(answer) = reply.try_recv() {
            return answer;
        }
        let event = events.recv().await.unwrap();
        app.handle_event(event);
        reply.await.unwrap()
    }

    fn full_hd() -> StubProvider {
        StubProvider {
            size: Some((1920, 1080)),
            ..Default::default()
        }
    }

    fn rect(l: i32, t: i32, r: i32, b: i32) -> Rect {
        Rect::from_corners(l, t, r, b).unwrap()
    }

    #[test]
    fn drag_on_preview_maps_to_source_pixels() {
        let (mut app, _, _) = app("drag", full_hd());
        app.capture_now().unwrap();

        let added = app.add_region_from_display([5, 5, 105, 30], (960, 540)).unwrap();
        assert_eq!(added.edges(), [10, 10, 210, 60]);
        assert_eq!(
            app.overlay((960, 540)),
            vec![OverlayBox {
                label: 1,
                edges: [5, 5, 105, 30]
            }]
        );
        assert_eq!(app.preview_image((960, 540)).unwrap().dimensions(), (960, 540));
    }

    #[test]
    fn drawing_needs_a_frame() {
        let (mut app, _, _) = app("noframe", full_hd());
        let err = app.add_region_from_display([0, 0, 10, 10], (960, 540)).unwrap_err();
        assert!(matches!(err, OcrDeckError::SourceUnavailable(_)));
        assert!(app.overlay((960, 540)).is_empty());
    }

    #[test]
    fn regions_are_clamped_to_the_frame() {
        let (mut app, _, _) = app(
            "clamp",
            StubProvider {
                size: Some((100, 50)),
                ..Default::default()
            },
        );
        app.capture_now().unwrap();

        assert_eq!(app.add_region(rect(90, 40, 150, 80)).unwrap().edges(), [90, 40, 100, 50]);
        let err = app.add_region(rect(200, 200, 300, 300)).unwrap_err();
        assert!(matches!(err, OcrDeckError::InvalidRegion(_)));
        assert!(app.status().contains("invalid region"), "{}", app.status());
        assert_eq!(app.regions().len(), 1);

        assert_eq!(app.remove_region(5), None);
        assert!(app.remove_region(0).is_some());
        assert!(app.regions().is_empty());
    }

    #[tokio::test]
    async fn recognition_needs_regions_and_writes_nothing() {
        let (mut app, _, dir) = app("noregions", full_hd());
        app.capture_now().unwrap();

        let err = app.run_recognition(false).await.unwrap_err();
        assert!(matches!(err, OcrDeckError::EmptyConfiguration(_)));
        assert!(!dir.join(LATEST_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn recognition_needs_a_frame() {
        let (mut app, _, _) = app("noframe-pass", full_hd());
        app.add_region(rect(0, 0, 10, 10)).unwrap();
        let err = app.run_recognition(false).await.unwrap_err();
        assert!(matches!(err, OcrDeckError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn recognition_needs_languages() {
        let (mut app, _, _) = app("nolangs", full_hd());
        app.capture_now().unwrap();
        app.add_region(rect(0, 0, 10, 10)).unwrap();
        app.set_languages(Vec::new());
        let err = app.run_recognition(false).await.unwrap_err();
        assert!(matches!(err, OcrDeckError::EmptyConfiguration(_)));
    }

    #[tokio::test]
    async fn recognition_saves_latest_session() {
        let (mut app, _, dir) = app("pass", full_hd());
        app.capture_now().unwrap();
        app.add_region(rect(100, 100, 400, 200)).unwrap();

        let saved = app.run_recognition(false).await.unwrap();
        assert_eq!(saved.latest, dir.join(LATEST_FILE_NAME));
        assert!(saved.history.is_none());

        let body = std::fs::read_to_string(&saved.latest).unwrap();
        let session: Session = serde_json::from_str(&body).unwrap();
        assert_eq!(session.image_size, (1920, 1080));
        assert_eq!(session.source, SourceId::Monitor(1));
        assert_eq!(session.boxes.len(), 1);
        assert_eq!(session.boxes[0].text, "HELLO");
        assert!((session.boxes[0].confidence - 0.95).abs() < 1e-9);
        assert_eq!(app.last_session(), Some(&session));
        assert!(app.status().starts_with("Done."), "{}", app.status());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn failed_auto_pass_keeps_previous_result() {
        let (mut app, script, dir) = app("auto-fail", full_hd());
        let mut events = app.take_event_receiver().unwrap();
        app.capture_now().unwrap();
        app.add_region(rect(0, 0, 50, 50)).unwrap();
        app.run_recognition(false).await.unwrap();

        script
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("model crashed")));
        let err = auto_pass(&mut app, &mut events).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrDeckError>(),
            Some(OcrDeckError::RecognitionFailure(_))
        ));
        assert!(app.status().starts_with("Auto recognition error:"), "{}", app.status());
        let kept = std::fs::read_to_string(dir.join(LATEST_FILE_NAME)).unwrap();
        assert!(kept.contains("HELLO"));

        let message = auto_pass(&mut app, &mut events).await.unwrap();
        assert!(message.contains("latest_result.json (overwritten)"), "{message}");
        assert!(!app.pass_in_flight());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn auto_pass_without_regions_answers_at_once() {
        let (mut app, _, _) = app("auto-empty", full_hd());
        let mut reply = tick(&mut app, TickKind::Recognize);
        let err = reply.try_recv().unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrDeckError>(),
            Some(OcrDeckError::EmptyConfiguration(_))
        ));
        assert!(!app.pass_in_flight());
    }

    #[tokio::test]
    async fn preview_is_answered_while_a_pass_runs() {
        let (release, gate) = std::sync::mpsc::channel();
        let factory = Arc::new(GatedFactory {
            gate: Arc::new(Mutex::new(gate)),
        });
        let dir = scratch("slow-pass");
        let mut app = App::new(settings_in(&dir), Arc::new(full_hd()), factory);
        let mut events = app.take_event_receiver().unwrap();
        app.capture_now().unwrap();
        app.add_region(rect(0, 0, 50, 50)).unwrap();

        let mut first = tick(&mut app, TickKind::Recognize);
        assert!(app.pass_in_flight());

        let mut preview = tick(&mut app, TickKind::Preview);
        assert_eq!(preview.try_recv().unwrap().unwrap(), "Live preview 1920x1080");

        let mut second = tick(&mut app, TickKind::Recognize);
        let err = second.try_recv().unwrap().unwrap_err();
        assert!(err.to_string().contains("still running"), "{err}");
        assert!(first.try_recv().is_err());

        release.send(()).unwrap();
        let event = events.recv().await.unwrap();
        app.handle_event(event);
        let message = first.await.unwrap().unwrap();
        assert!(message.starts_with("Auto recognition #1"), "{message}");
        assert!(!app.pass_in_flight());
        assert_eq!(app.last_session().unwrap().boxes[0].text, "SLOW");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn monitor_region_reaches_every_monitor_source() {
        let provider = full_hd();
        let opened = Arc::clone(&provider.opened_monitors);
        let dir = scratch("monitor-region");
        let settings = Settings {
            monitor_region: Some(rect(100, 50, 900, 650)),
            ..settings_in(&dir)
        };
        let factory = Arc::new(ScriptedFactory {
            script: Arc::default(),
        });
        let mut app = App::new(settings, Arc::new(provider), factory);
        app.select_monitor(2);

        let region = Some(rect(100, 50, 900, 650));
        assert_eq!(*opened.lock().unwrap(), vec![(1, region), (2, region)]);
    }

    #[test]
    fn failed_stream_reports_its_error() {
        let (mut app, _, _) = app(
            "stream-fail",
            StubProvider {
                stream_error: Some("Connection refused".into()),
                ..full_hd()
            },
        );
        assert!(matches!(
            app.connect_stream("   ").unwrap_err(),
            OcrDeckError::Config(_)
        ));

        let err = app.connect_stream("srt://10.0.0.9:9000").unwrap_err();
        assert!(matches!(err, OcrDeckError::ConnectionFailure { .. }));
        assert_eq!(app.active_kind(), SourceKind::Stream);

        let err = app.grab_current_frame().unwrap_err();
        assert!(matches!(err, OcrDeckError::SourceUnavailable(_)));
        assert!(err.to_string().contains("Connection refused"), "{err}");
    }

    #[tokio::test]
    async fn waits_for_first_stream_frame() {
        let (mut app, _, _) = app("wait-none", full_hd());
        app.connect_stream("srt://127.0.0.1:9000").unwrap();
        let err = app
            .wait_for_first_frame(3, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrDeckError::SourceUnavailable(_)));
        assert!(app.current_frame().is_none());

    }

    #[tokio::test]
    async fn first_stream_frame_goes_live() {
        let (mut app, _, _) = app(
            "wait-live",
            StubProvider {
                stream_has_frame: true,
                ..full_hd()
            },
        );
        app.connect_stream("srt://127.0.0.1:9000").unwrap();
        let frame = app
            .wait_for_first_frame(3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(frame.size(), (1920, 1080));
        assert!(app.status().contains("1920x1080"));
    }

    #[tokio::test]
    async fn card_falls_back_to_first_device_and_starts_preview() {
        let provider = StubProvider {
            devices: vec!["Cam A".into(), "Cam B".into()],
            ..full_hd()
        };
        let opened = Arc::clone(&provider.opened_cards);
        let (mut app, _, _) = app("card", provider);

        app.connect_card("", "", "").unwrap();
        let cards = opened.lock().unwrap().clone();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].device, "Cam A");
        assert_eq!(cards[0].size, app.settings().card_size);
        assert!(app.preview_running());
        app.shutdown();
        assert!(!app.preview_running());
    }

    #[test]
    fn card_without_devices_is_rejected() {
        let (mut app, _, _) = app("card-none", full_hd());
        let err = app.connect_card(" ", "", "").unwrap_err();
        assert!(matches!(err, OcrDeckError::Config(_)));
    }

    #[tokio::test]
    async fn auto_needs_regions() {
        let (mut app, _, _) = app("auto-toggle", full_hd());
        let err = app.toggle_auto().unwrap_err();
        assert!(matches!(err, OcrDeckError::EmptyConfiguration(_)));
        assert!(!app.auto_running());
        assert!(app.current_frame().is_some());

        app.add_region(rect(0, 0, 10, 10)).unwrap();
        assert_eq!(app.set_auto_interval(100), 500);
        assert!(app.toggle_auto().unwrap());
        assert!(app.auto_running());
        assert!(app.status().contains("500 ms"), "{}", app.status());
        assert!(!app.toggle_auto().unwrap());
        assert!(!app.auto_running());
    }

    #[tokio::test(start_paused = true)]
    async fn preview_ticks_reach_the_controller() {
        let (mut app, _, _) = app("preview", full_hd());
        let mut events = app.take_event_receiver().unwrap();
        assert!(app.take_event_receiver().is_none());

        assert!(app.toggle_preview());
        let event = events.recv().await.unwrap();
        assert!(matches!(&event, ControllerEvent::Tick(r) if r.kind == TickKind::Preview));
        app.handle_event(event);
        assert_eq!(app.status(), "Live preview 1920x1080");
        assert!(app.current_frame().is_some());

        assert!(!app.toggle_preview());
        assert_eq!(app.status(), "Live preview paused");
    }

    #[tokio::test(start_paused = true)]
    async fn preview_errors_land_on_the_status_line() {
        let (mut app, _, _) = app("preview-err", StubProvider::default());
        let mut events = app.take_event_receiver().unwrap();
        app.start_live_preview();

        let event = events.recv().await.unwrap();
        app.handle_event(event);
        assert!(app.status().starts_with("Preview error:"), "{}", app.status());
        assert!(app.preview_running());
    }
}
