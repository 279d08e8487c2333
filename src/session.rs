//! # Capture Session Orchestration
//!
//! The composition root for both capture kinds. [`CaptureRig`] owns the
//! readback conversion pipeline, both schedulers, and the event channel that
//! funnels completed frames and worker errors back onto the tick thread.
//!
//! Event flow per tick: drain everything the conversion thread and workers
//! queued since the last tick, hand frames to the owning scheduler, then let
//! each scheduler advance its own state machine.

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;

use crate::capture::panorama::PanoramaCapture;
use crate::capture::readback::ReadbackPipeline;
use crate::capture::single::SingleCapture;
use crate::host::{ReadbackTicket, RenderHost, TargetId, Vec3};
use crate::state::StateHandle;

/// Scheduler clock rate. Intervals in seconds are converted with
/// [`interval_ticks`].
pub const TICKS_PER_SECOND: f64 = 20.0;

/// Convert a capture interval in seconds to whole ticks, minimum one.
pub fn interval_ticks(seconds: f64) -> u64 {
    ((seconds * TICKS_PER_SECOND).round() as u64).max(1)
}

/// The two capture kinds the rig schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Single,
    Panorama,
}

impl CaptureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Panorama => "panorama",
        }
    }
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A readback that finished conversion (or failed on the way).
pub struct FrameEvent {
    pub kind: CaptureKind,
    /// Session the readback was issued under; stale sessions are dropped.
    pub session: u64,
    /// Cube face index for panorama frames, `None` for single shots.
    pub face: Option<usize>,
    pub target: TargetId,
    /// Mapped-buffer ticket to hand back to the host, when one was issued.
    pub ticket: Option<ReadbackTicket>,
    pub result: Result<RgbaImage, String>,
}

/// Everything the tick thread drains at the start of a tick.
pub enum Event {
    Frame(FrameEvent),
    /// A worker thread failed; surfaced as a user notice.
    WorkerError {
        kind: CaptureKind,
        message: String,
    },
}

/// Owns both schedulers and the channels that feed them.
pub struct CaptureRig {
    events_rx: Receiver<Event>,
    pub single: SingleCapture,
    pub panorama: PanoramaCapture,
}

impl CaptureRig {
    pub fn new() -> Self {
        let (events_tx, events_rx): (Sender<Event>, Receiver<Event>) = unbounded();
        let readback = ReadbackPipeline::spawn(events_tx.clone());
        let single = SingleCapture::new(readback.handle(), events_tx.clone());
        let panorama = PanoramaCapture::new(readback.handle(), events_tx);
        Self {
            events_rx,
            single,
            panorama,
        }
    }

    /// Advance one tick: deliver queued events, then run both schedulers.
    pub fn tick(&mut self, host: &mut dyn RenderHost) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                Event::Frame(frame) => match frame.kind {
                    CaptureKind::Single => self.single.on_event(host, frame),
                    CaptureKind::Panorama => self.panorama.on_event(host, frame),
                },
                Event::WorkerError { kind, message } => {
                    tracing::warn!(kind = kind.label(), %message, "worker error");
                    host.notify(&format!("{} worker error: {}", kind, message));
                }
            }
        }
        self.single.tick(host);
        self.panorama.tick(host);
    }

    /// Start single-shot capture. Only one kind runs at a time; a running
    /// panorama session is stopped first.
    pub fn start_single(&mut self, host: &mut dyn RenderHost, interval_seconds: f64) {
        self.start_single_at(host, interval_seconds, None, None);
    }

    /// Start single-shot capture from an explicit position and/or
    /// `(yaw, pitch)`; `None` fields fall back to the viewer's pose.
    pub fn start_single_at(
        &mut self,
        host: &mut dyn RenderHost,
        interval_seconds: f64,
        position: Option<Vec3>,
        orientation: Option<(f32, f32)>,
    ) {
        if self.panorama.is_running() {
            self.panorama.stop(host);
        }
        self.single.start_at(host, interval_seconds, position, orientation);
    }

    /// Start panorama capture, stopping a running single-shot session first.
    pub fn start_panorama(&mut self, host: &mut dyn RenderHost, interval_seconds: f64) {
        self.start_panorama_at(host, interval_seconds, None, None);
    }

    /// Start panorama capture from an explicit position and/or
    /// `(yaw, pitch)`; `None` fields fall back to the viewer's pose.
    pub fn start_panorama_at(
        &mut self,
        host: &mut dyn RenderHost,
        interval_seconds: f64,
        position: Option<Vec3>,
        orientation: Option<(f32, f32)>,
    ) {
        if self.single.is_running() {
            self.single.stop(host);
        }
        self.panorama.start_at(host, interval_seconds, position, orientation);
    }

    pub fn stop_single(&mut self, host: &mut dyn RenderHost) {
        self.single.stop(host);
    }

    pub fn stop_panorama(&mut self, host: &mut dyn RenderHost) {
        self.panorama.stop(host);
    }

    pub fn single_state(&self) -> StateHandle {
        self.single.state()
    }

    pub fn panorama_state(&self) -> StateHandle {
        self.panorama.state()
    }
}

impl Default for CaptureRig {
    fn default() -> Self {
        Self::new()
    }
}
