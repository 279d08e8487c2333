//! Single-shot capture scheduler.
//!
//! Renders one frame per interval from the camera pose the session was
//! started with. The cadence is steady: the next due tick advances from the
//! previous due tick, not from when the frame actually landed, and ticks
//! that would overlap an in-flight readback are skipped without shifting
//! the schedule.

use crossbeam_channel::Sender;

use crate::capture::context::{CaptureOverrides, ContextGuard};
use crate::capture::readback::ReadbackHandle;
use crate::config::SingleConfig;
use crate::error::CaptureResult;
use crate::host::{CameraPose, RenderHost, TargetId, Vec3, clamp_pitch};
use crate::session::{CaptureKind, Event, FrameEvent, interval_ticks};
use crate::state::StateHandle;
use crate::worker::{EncodeWorker, Submit};

/// Status snapshot for console display.
pub struct SingleStatus {
    pub running: bool,
    pub interval_ticks: u64,
    pub completed_captures: u64,
    pub width: u32,
    pub height: u32,
    pub fov: f64,
    pub origin: CameraPose,
}

impl SingleStatus {
    /// One-line summary in the console's status format.
    pub fn describe(&self) -> String {
        format!(
            "single: {}, {}x{}, fov {}, every {} ticks, {} captured, origin {} (yaw {:.1} pitch {:.1})",
            if self.running { "running" } else { "stopped" },
            self.width,
            self.height,
            crate::config::format_fov(self.fov),
            self.interval_ticks,
            self.completed_captures,
            self.origin.position,
            self.origin.yaw,
            self.origin.pitch
        )
    }
}

pub struct SingleCapture {
    readback: ReadbackHandle,
    worker: EncodeWorker,
    state: StateHandle,
    config: SingleConfig,
    running: bool,
    tick_counter: u64,
    interval_ticks: u64,
    next_capture_tick: u64,
    completed_captures: u64,
    /// A readback is in flight; due ticks are skipped until it lands.
    capture_pending: bool,
    /// Bumped on every start/stop so stale completions are discarded.
    session_id: u64,
    origin: CameraPose,
    target: Option<(TargetId, u32, u32)>,
}

impl SingleCapture {
    pub fn new(readback: ReadbackHandle, events: Sender<Event>) -> Self {
        let state = StateHandle::new();
        let worker = EncodeWorker::spawn(state.clone(), events);
        Self {
            readback,
            worker,
            state,
            config: SingleConfig::default(),
            running: false,
            tick_counter: 0,
            interval_ticks: interval_ticks(1.0),
            next_capture_tick: 0,
            completed_captures: 0,
            capture_pending: false,
            session_id: 0,
            origin: CameraPose::default(),
            target: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn config(&self) -> &SingleConfig {
        &self.config
    }

    pub fn status(&self) -> SingleStatus {
        SingleStatus {
            running: self.running,
            interval_ticks: self.interval_ticks,
            completed_captures: self.completed_captures,
            width: self.config.width,
            height: self.config.height,
            fov: self.config.fov,
            origin: self.origin,
        }
    }

    /// Start capturing from the host's current camera pose.
    pub fn start(&mut self, host: &mut dyn RenderHost, interval_seconds: f64) {
        self.start_at(host, interval_seconds, None, None);
    }

    /// Start capturing from an explicit eye position and/or `(yaw, pitch)`
    /// orientation. Either may be `None` to take the viewer's current value.
    pub fn start_at(
        &mut self,
        host: &mut dyn RenderHost,
        interval_seconds: f64,
        position: Option<Vec3>,
        orientation: Option<(f32, f32)>,
    ) {
        if !host.context_ready() {
            host.notify("Cannot start capture: no scene is loaded");
            return;
        }
        // The render target is allocated up front so an exhausted GPU
        // surfaces here instead of on the first due tick.
        if let Err(err) = self.ensure_target(host) {
            host.notify(&format!("Cannot start capture: {}", err));
            return;
        }
        self.session_id += 1;
        self.running = true;
        self.capture_pending = false;
        self.completed_captures = 0;
        self.interval_ticks = interval_ticks(interval_seconds);
        self.next_capture_tick = self.tick_counter + 1;
        let viewer = host.overrides().camera;
        self.origin = CameraPose {
            position: position.unwrap_or(viewer.position),
            yaw: orientation.map_or(viewer.yaw, |(yaw, _)| yaw),
            pitch: clamp_pitch(orientation.map_or(viewer.pitch, |(_, pitch)| pitch)),
        };
        self.state.set_running(true);
        host.notify(&format!(
            "Single capture started: {} every {:.1}s (fov {})",
            self.config.describe_resolution(),
            interval_seconds,
            crate::config::format_fov(self.config.fov)
        ));
    }

    pub fn stop(&mut self, host: &mut dyn RenderHost) {
        if !self.running {
            host.notify("Single capture is not running");
            return;
        }
        self.stop_internal(host);
        host.notify("Single capture stopped");
    }

    fn stop_internal(&mut self, host: &mut dyn RenderHost) {
        self.session_id += 1;
        self.running = false;
        self.capture_pending = false;
        self.state.set_running(false);
        if let Some((target, _, _)) = self.target.take() {
            host.release_target(target);
        }
    }

    pub fn set_resolution(&mut self, host: &mut dyn RenderHost, width: u32, height: u32) {
        self.config.set_resolution(width, height);
        host.notify(&format!(
            "Single capture resolution set to {}",
            self.config.describe_resolution()
        ));
    }

    pub fn set_fov(&mut self, host: &mut dyn RenderHost, fov: f64) {
        self.config.set_fov(fov);
        host.notify(&format!(
            "Single capture FOV set to {}",
            crate::config::format_fov(self.config.fov)
        ));
    }

    pub fn set_companion(&mut self, host: &mut dyn RenderHost, enabled: bool) {
        self.config.companion_enabled = enabled;
        host.notify(&format!(
            "Single capture companion {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    /// Advance one tick. Must run after the rig has delivered queued events.
    pub fn tick(&mut self, host: &mut dyn RenderHost) {
        self.tick_counter += 1;
        if !self.running {
            return;
        }
        if !host.context_ready() {
            self.stop_internal(host);
            host.notify("Single capture stopped: scene unloaded");
            return;
        }
        if self.capture_pending || self.tick_counter < self.next_capture_tick {
            return;
        }

        // Steady cadence: advance from the due tick, skipping any due ticks
        // that passed while a readback was pending.
        self.next_capture_tick += self.interval_ticks;
        while self.next_capture_tick <= self.tick_counter {
            self.next_capture_tick += self.interval_ticks;
        }

        if let Err(err) = self.capture_frame(host) {
            self.stop_internal(host);
            host.notify(&format!("Single capture failed: {}", err));
        }
    }

    fn capture_frame(&mut self, host: &mut dyn RenderHost) -> CaptureResult<()> {
        let target = self.ensure_target(host)?;
        let overrides = CaptureOverrides {
            camera: self.origin,
            width: self.config.width,
            height: self.config.height,
            fov: self.config.fov,
            panorama_mode: false,
            target,
            companion: self.config.companion_enabled,
        };
        let mut guard = ContextGuard::begin(host, &overrides)?;
        guard.host().render_frame()?;
        self.readback.request(
            guard.host(),
            target,
            CaptureKind::Single,
            self.session_id,
            None,
        )?;
        self.capture_pending = true;
        Ok(())
    }

    /// Allocate (or reallocate after a resolution change) the render target.
    fn ensure_target(&mut self, host: &mut dyn RenderHost) -> CaptureResult<TargetId> {
        let (w, h) = (self.config.width, self.config.height);
        if let Some((target, tw, th)) = self.target {
            if tw == w && th == h {
                return Ok(target);
            }
            host.release_target(target);
            self.target = None;
        }
        let target = host.alloc_target(w, h)?;
        self.target = Some((target, w, h));
        Ok(target)
    }

    /// Handle a completed (or failed) readback for this kind.
    pub fn on_event(&mut self, host: &mut dyn RenderHost, event: FrameEvent) {
        // The mapped buffer is released whether or not the result is used.
        let mut unmap_failed = false;
        if let Some(ticket) = event.ticket {
            if host.finish_readback(ticket).is_err() {
                unmap_failed = true;
            }
        }

        let current = event.session == self.session_id && self.running;
        let image = match event.result {
            Ok(image) if !unmap_failed => Some(image),
            failed => {
                if !current {
                    None
                } else {
                    if let Err(reason) = &failed {
                        tracing::debug!(%reason, "async readback failed, trying sync capture");
                    }
                    match host.capture_sync(event.target) {
                        Ok(image) => Some(image),
                        Err(err) => {
                            host.notify(&format!("Frame lost: {}", err));
                            None
                        }
                    }
                }
            }
        };

        if !current {
            return;
        }
        self.capture_pending = false;
        let Some(image) = image else {
            return;
        };
        self.completed_captures += 1;
        if let Submit::Dropped {
            notice: Some(notice),
        } = self.worker.submit(self.tick_counter, image)
        {
            host.notify(&notice);
        }
    }
}
