//! The acquisition loop and the "save each plate once" bookkeeping.

use std::collections::HashSet;

use chrono::{Local, NaiveDateTime};
use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use super::bounding_box_render::draw_summary;
use super::display::is_stop_key;
use super::frame_processor::FrameProcessor;
use super::image_sink::{snapshot_stem, OutputLayout};
use super::{DisplaySink, FrameSource, ImageSink, OcrEngine, PlateDetector, PlateRecord};
use crate::config::PlateCaptureConfig;
use crate::error::{PlateError, Result};
use crate::metrics;
use crate::utils::FpsLimiter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Stop key pressed in the window.
    UserExit,
    /// Ctrl-C.
    Interrupted,
    /// The source ran out of frames.
    EndOfStream,
    /// The source failed to deliver a frame.
    CaptureFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub plates_saved: usize,
    pub stop_reason: StopReason,
}

/// A newly seen valid plate, ready to be written out.
pub struct PersistRequest {
    pub plate: String,
    pub stem: String,
    pub full_frame: Mat,
    pub crop: Mat,
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub confidence_threshold: f32,
    pub layout: OutputLayout,
    /// Log every record each `log_every_frames` frames, 0 disables.
    pub log_every_frames: u64,
    pub max_fps: Option<u32>,
}

impl SessionSettings {
    pub fn from_config(config: &PlateCaptureConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            layout: OutputLayout::new(&config.output_dir),
            log_every_frames: config.log_every_frames,
            max_fps: config.max_fps,
        }
    }
}

/// Releases the capture device and closes the window when dropped, so every
/// way out of the loop (including a panic) cleans up exactly once.
struct Cleanup<'a, S: FrameSource, V: DisplaySink> {
    source: &'a mut S,
    display: &'a mut V,
}

impl<S: FrameSource, V: DisplaySink> Drop for Cleanup<'_, S, V> {
    fn drop(&mut self) {
        if let Err(e) = self.source.release() {
            warn!("cannot release capture device: {}", e);
        }
        if let Err(e) = self.display.close_all() {
            warn!("cannot close display: {}", e);
        }
        info!("capture released");
    }
}

/// Owns the set of plates already saved during this run.
pub struct SessionController {
    settings: SessionSettings,
    state: SessionState,
    seen: HashSet<String>,
    frames: u64,
    plates_saved: usize,
    stop_signal: Option<Receiver<()>>,
    state_listener: Option<Sender<SessionState>>,
}

impl SessionController {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            seen: HashSet::new(),
            frames: 0,
            plates_saved: 0,
            stop_signal: None,
            state_listener: None,
        }
    }

    /// Stops the loop as soon as anything arrives on `signal`.
    pub fn with_stop_signal(mut self, signal: Receiver<()>) -> Self {
        self.stop_signal = Some(signal);
        self
    }

    /// Sends every state change to `listener` as it happens.
    pub fn with_state_listener(mut self, listener: Sender<SessionState>) -> Self {
        self.state_listener = Some(listener);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn seen_plates(&self) -> &HashSet<String> {
        &self.seen
    }

    /// Picks the valid plates not saved before and marks them as seen.
    ///
    /// The plate enters the seen set before its request is built, so a
    /// plate appearing twice (in this frame or any later one) yields one
    /// request only.
    pub fn select_new_plates(
        &mut self,
        records: &[PlateRecord],
        annotated: &Mat,
        at: &NaiveDateTime,
    ) -> Result<Vec<PersistRequest>> {
        let mut requests = Vec::new();
        for record in records {
            if !record.is_valid() {
                continue;
            }
            if !self.seen.insert(record.text().to_string()) {
                continue;
            }

            requests.push(PersistRequest {
                plate: record.text().to_string(),
                stem: snapshot_stem(record.text(), at),
                full_frame: annotated.try_clone()?,
                crop: record.cropped().try_clone()?,
            });
        }
        Ok(requests)
    }

    fn persist<W: ImageSink>(&mut self, sink: &mut W, request: &PersistRequest) {
        let full_path = self.settings.layout.full_path(&request.stem);
        let crop_path = self.settings.layout.crop_path(&request.stem);

        if let Err(e) = sink.write(&full_path, &request.full_frame) {
            error!(
                "cannot save plate {}: full frame {}: {}",
                request.plate,
                full_path.display(),
                e
            );
            return;
        }
        if let Err(e) = sink.write(&crop_path, &request.crop) {
            error!(
                "cannot save plate {}: crop {}: {} (full frame left at {})",
                request.plate,
                crop_path.display(),
                e,
                full_path.display()
            );
            return;
        }

        self.plates_saved += 1;
        metrics::PLATES_SAVED.inc();
        info!(
            "new plate {} saved: full={} crop={}",
            request.plate,
            full_path.display(),
            crop_path.display()
        );
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        if let Some(listener) = &self.state_listener {
            let _ = listener.try_send(state);
        }
    }

    fn interrupted(&self) -> bool {
        self.stop_signal
            .as_ref()
            .map_or(false, |signal| signal.try_recv().is_ok())
    }

    fn log_records(&self, records: &[PlateRecord]) {
        let every = self.settings.log_every_frames;
        if every == 0 || self.frames % every != 0 {
            return;
        }
        for record in records {
            info!(
                "[frame {}] plate {} conf {:.1}% {}",
                self.frames,
                record.text(),
                record.confidence() * 100.0,
                if record.is_valid() { "valid" } else { "unclear" }
            );
        }
    }

    /// Runs until a stop key, an interrupt, or the source gives out.
    ///
    /// The source and the display are released on every exit path. Errors
    /// from frame processing are returned once cleanup has happened.
    pub fn run<S, V, W, D, O>(
        &mut self,
        source: &mut S,
        processor: &mut FrameProcessor<D, O>,
        display: &mut V,
        sink: &mut W,
    ) -> Result<SessionSummary>
    where
        S: FrameSource,
        V: DisplaySink,
        W: ImageSink,
        D: PlateDetector,
        O: OcrEngine,
    {
        if self.state == SessionState::Stopped {
            return Err(PlateError::Capture("session already stopped".to_string()));
        }

        let outcome = {
            let mut io = Cleanup { source, display };
            let outcome = self.run_loop(&mut io, processor, sink);
            self.set_state(SessionState::Stopped);
            outcome
        };

        let stop_reason = outcome?;
        info!(
            "session stopped ({:?}) after {} frame(s), {} plate(s) saved",
            stop_reason, self.frames, self.plates_saved
        );
        Ok(SessionSummary {
            frames: self.frames,
            plates_saved: self.plates_saved,
            stop_reason,
        })
    }

    fn run_loop<S, V, W, D, O>(
        &mut self,
        io: &mut Cleanup<'_, S, V>,
        processor: &mut FrameProcessor<D, O>,
        sink: &mut W,
    ) -> Result<StopReason>
    where
        S: FrameSource,
        V: DisplaySink,
        W: ImageSink,
        D: PlateDetector,
        O: OcrEngine,
    {
        let mut limiter = self.settings.max_fps.map(FpsLimiter::new);

        loop {
            if self.interrupted() {
                info!("interrupt received, stopping");
                return Ok(StopReason::Interrupted);
            }

            let frame = match io.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    error!("no frame from capture device");
                    return Ok(StopReason::EndOfStream);
                }
                Err(e) => {
                    error!("frame acquisition failed: {}", e);
                    return Ok(StopReason::CaptureFailed);
                }
            };

            if self.state == SessionState::Idle {
                self.set_state(SessionState::Running);
                info!("frame size {}x{}, detecting plates", frame.cols(), frame.rows());
            }
            self.frames += 1;

            let (mut annotated, records) =
                processor.process(&frame, self.settings.confidence_threshold)?;
            self.log_records(&records);

            let now = Local::now().naive_local();
            for request in self.select_new_plates(&records, &annotated, &now)? {
                self.persist(sink, &request);
            }

            draw_summary(
                &mut annotated,
                &records,
                &self.settings.layout.root().display().to_string(),
            )?;
            io.display.show(&annotated)?;

            if let Some(key) = io.display.poll_key()? {
                debug!("key {} pressed", key);
                if is_stop_key(key) {
                    info!("exit requested");
                    return Ok(StopReason::UserExit);
                }
            }

            if let Some(limiter) = limiter.as_mut() {
                limiter.wait();
            }
        }
    }
}
