//! Panorama capture scheduler.
//!
//! Each cycle renders the six cube faces from the pose the session was
//! started with and hands the complete set to the stitch worker. Smooth
//! mode spreads the six renders evenly across the interval; precise mode
//! renders them back-to-back, one per tick, gated only on the previous
//! face's readback.

use crossbeam_channel::Sender;

use crate::capture::context::{CaptureOverrides, ContextGuard};
use crate::capture::faces::{FACE_COUNT, FaceSlots, face_pose};
use crate::capture::readback::ReadbackHandle;
use crate::config::PanoramaConfig;
use crate::error::CaptureResult;
use crate::host::{CameraPose, RenderHost, TargetId, Vec3, clamp_pitch};
use crate::session::{CaptureKind, Event, FrameEvent, interval_ticks};
use crate::state::StateHandle;
use crate::worker::{StitchJob, StitchWorker, Submit};

/// File name for the on-disk export in the screenshots directory.
pub const EXPORT_FILE_NAME: &str = "panorama_cubemap.png";

/// Status snapshot for console display.
pub struct PanoramaStatus {
    pub running: bool,
    pub interval_ticks: u64,
    pub completed_cycles: u64,
    pub cycle_in_progress: bool,
    pub faces_scheduled_in_cycle: usize,
    pub resolution: u32,
    pub precise_mode: bool,
    pub origin: CameraPose,
}

impl PanoramaStatus {
    /// One-line summary in the console's status format.
    pub fn describe(&self) -> String {
        let progress = if self.cycle_in_progress {
            format!(", face {}/6", self.faces_scheduled_in_cycle)
        } else {
            String::new()
        };
        format!(
            "panorama: {}, {}x{} faces, {} mode, every {} ticks, {} cycles{}, origin {} (yaw {:.1})",
            if self.running { "running" } else { "stopped" },
            self.resolution,
            self.resolution,
            if self.precise_mode { "precise" } else { "smooth" },
            self.interval_ticks,
            self.completed_cycles,
            progress,
            self.origin.position,
            self.origin.yaw
        )
    }
}

pub struct PanoramaCapture {
    readback: ReadbackHandle,
    worker: StitchWorker,
    state: StateHandle,
    config: PanoramaConfig,
    running: bool,
    tick_counter: u64,
    interval_ticks: u64,
    cycle_in_progress: bool,
    cycle_start_tick: u64,
    next_cycle_tick: u64,
    faces_scheduled_in_cycle: usize,
    pending_face_captures: usize,
    completed_cycles: u64,
    /// Face resolution snapshotted when the cycle started; config changes
    /// apply from the next cycle.
    cycle_resolution: u32,
    faces: FaceSlots,
    session_id: u64,
    origin: CameraPose,
    target: Option<(TargetId, u32)>,
}

impl PanoramaCapture {
    pub fn new(readback: ReadbackHandle, events: Sender<Event>) -> Self {
        let state = StateHandle::new();
        let worker = StitchWorker::spawn(state.clone(), events);
        Self {
            readback,
            worker,
            state,
            config: PanoramaConfig::default(),
            running: false,
            tick_counter: 0,
            interval_ticks: interval_ticks(10.0),
            cycle_in_progress: false,
            cycle_start_tick: 0,
            next_cycle_tick: 0,
            faces_scheduled_in_cycle: 0,
            pending_face_captures: 0,
            completed_cycles: 0,
            cycle_resolution: 0,
            faces: FaceSlots::new(),
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

    pub fn config(&self) -> &PanoramaConfig {
        &self.config
    }

    pub fn status(&self) -> PanoramaStatus {
        PanoramaStatus {
            running: self.running,
            interval_ticks: self.interval_ticks,
            completed_cycles: self.completed_cycles,
            cycle_in_progress: self.cycle_in_progress,
            faces_scheduled_in_cycle: self.faces_scheduled_in_cycle,
            resolution: self.config.resolution,
            precise_mode: self.config.precise_mode,
            origin: self.origin,
        }
    }

    /// Start capturing cycles from the host's current camera pose.
    pub fn start(&mut self, host: &mut dyn RenderHost, interval_seconds: f64) {
        self.start_at(host, interval_seconds, None, None);
    }

    /// Start capturing cycles from an explicit eye position and/or
    /// `(yaw, pitch)` orientation. Either may be `None` to take the viewer's
    /// current value.
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
        // Allocate the face target up front so an exhausted GPU surfaces
        // here instead of at the first cycle. The first cycle re-snapshots
        // the resolution, so a config change before then still reallocates.
        self.cycle_resolution = self.config.resolution;
        if let Err(err) = self.ensure_target(host) {
            host.notify(&format!("Cannot start capture: {}", err));
            return;
        }
        self.session_id += 1;
        self.running = true;
        self.reset_cycle_progress();
        self.completed_cycles = 0;
        self.interval_ticks = interval_ticks(interval_seconds);
        self.next_cycle_tick = self.tick_counter + 1;
        let viewer = host.overrides().camera;
        self.origin = CameraPose {
            position: position.unwrap_or(viewer.position),
            yaw: orientation.map_or(viewer.yaw, |(yaw, _)| yaw),
            pitch: clamp_pitch(orientation.map_or(viewer.pitch, |(_, pitch)| pitch)),
        };
        self.state.set_running(true);
        host.notify(&format!(
            "Panorama capture started: {} faces every {:.1}s ({} mode, downscale {})",
            self.config.describe_resolution(),
            interval_seconds,
            self.config.mode_label(),
            self.config.describe_downscale()
        ));
    }

    pub fn stop(&mut self, host: &mut dyn RenderHost) {
        if !self.running {
            host.notify("Panorama capture is not running");
            return;
        }
        self.stop_internal(host);
        host.notify("Panorama capture stopped");
    }

    fn stop_internal(&mut self, host: &mut dyn RenderHost) {
        self.session_id += 1;
        self.running = false;
        self.reset_cycle_progress();
        self.state.set_running(false);
        if let Some((target, _)) = self.target.take() {
            host.release_target(target);
        }
    }

    fn reset_cycle_progress(&mut self) {
        self.cycle_in_progress = false;
        self.faces_scheduled_in_cycle = 0;
        self.pending_face_captures = 0;
        self.faces.clear();
    }

    pub fn set_resolution(&mut self, host: &mut dyn RenderHost, size: u32) {
        self.config.set_resolution(size);
        host.notify(&format!(
            "Panorama resolution set to {} (applies from the next cycle)",
            self.config.describe_resolution()
        ));
    }

    pub fn set_downscale(
        &mut self,
        host: &mut dyn RenderHost,
        factor: f64,
        stage: Option<pano_scale::Stage>,
        algorithm: Option<pano_scale::Algorithm>,
    ) {
        self.config.set_downscale(factor, stage, algorithm);
        host.notify(&format!(
            "Panorama downscale set to {}",
            self.config.describe_downscale()
        ));
    }

    /// Switch between precise and smooth scheduling. Abandons any cycle in
    /// progress; in-flight readbacks become stale.
    pub fn set_mode(&mut self, host: &mut dyn RenderHost, precise: bool) {
        if self.config.precise_mode == precise {
            host.notify(&format!("Panorama mode is already {}", self.config.mode_label()));
            return;
        }
        self.config.precise_mode = precise;
        self.session_id += 1;
        self.reset_cycle_progress();
        host.notify(&format!("Panorama mode set to {}", self.config.mode_label()));
    }

    pub fn set_export(&mut self, host: &mut dyn RenderHost, enabled: bool) {
        self.config.export_enabled = enabled;
        host.notify(&format!(
            "Panorama export {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    pub fn set_companion(&mut self, host: &mut dyn RenderHost, enabled: bool) {
        self.config.companion_enabled = enabled;
        host.notify(&format!(
            "Panorama companion {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    pub fn set_nudge(&mut self, host: &mut dyn RenderHost, distance: f64) {
        self.config.set_nudge(distance);
        host.notify(&format!(
            "Panorama nudge set to {}",
            self.config.describe_nudge()
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
            host.notify("Panorama capture stopped: scene unloaded");
            return;
        }
        if !self.cycle_in_progress && self.tick_counter < self.next_cycle_tick {
            return;
        }
        if let Err(err) = self.advance(host) {
            self.stop_internal(host);
            host.notify(&format!("Panorama capture failed: {}", err));
        }
    }

    fn advance(&mut self, host: &mut dyn RenderHost) -> CaptureResult<()> {
        if !self.cycle_in_progress {
            self.cycle_in_progress = true;
            self.cycle_start_tick = self.tick_counter;
            self.faces_scheduled_in_cycle = 0;
            self.pending_face_captures = 0;
            self.faces.clear();
            self.cycle_resolution = self.config.resolution;
        }

        // Precise mode renders faces back-to-back but still one per tick,
        // waiting for the previous readback so face order stays stable.
        if self.pending_face_captures > 0 {
            return Ok(());
        }
        if self.faces_scheduled_in_cycle >= FACE_COUNT {
            return Ok(());
        }
        if !self.config.precise_mode {
            let due = self.cycle_start_tick
                + self.interval_ticks * self.faces_scheduled_in_cycle as u64 / FACE_COUNT as u64;
            if self.tick_counter < due {
                return Ok(());
            }
        }

        self.schedule_face(host, self.faces_scheduled_in_cycle)
    }

    fn schedule_face(&mut self, host: &mut dyn RenderHost, face: usize) -> CaptureResult<()> {
        let target = self.ensure_target(host)?;
        let pose = face_pose(&self.origin, face, self.config.nudge_distance);
        let overrides = CaptureOverrides {
            camera: pose,
            width: self.cycle_resolution,
            height: self.cycle_resolution,
            fov: 90.0,
            panorama_mode: true,
            target,
            companion: self.config.companion_enabled,
        };
        self.pending_face_captures += 1;
        self.faces_scheduled_in_cycle += 1;

        let result = (|| -> CaptureResult<()> {
            let mut guard = ContextGuard::begin(host, &overrides)?;
            guard.host().render_frame()?;
            self.readback.request(
                guard.host(),
                target,
                CaptureKind::Panorama,
                self.session_id,
                Some(face),
            )
        })();

        if result.is_err() {
            self.pending_face_captures -= 1;
            self.faces_scheduled_in_cycle -= 1;
        }
        result
    }

    fn ensure_target(&mut self, host: &mut dyn RenderHost) -> CaptureResult<TargetId> {
        let size = self.cycle_resolution;
        if let Some((target, current)) = self.target {
            if current == size {
                return Ok(target);
            }
            host.release_target(target);
            self.target = None;
        }
        let target = host.alloc_target(size, size)?;
        self.target = Some((target, size));
        Ok(target)
    }

    /// Handle a completed (or failed) face readback.
    pub fn on_event(&mut self, host: &mut dyn RenderHost, event: FrameEvent) {
        let mut unmap_failed = false;
        if let Some(ticket) = event.ticket {
            if host.finish_readback(ticket).is_err() {
                unmap_failed = true;
            }
        }

        let current = event.session == self.session_id && self.running;
        if !current {
            return;
        }
        self.pending_face_captures = self.pending_face_captures.saturating_sub(1);

        let Some(face) = event.face else {
            return;
        };
        let image = match event.result {
            Ok(image) if !unmap_failed => Some(image),
            failed => {
                if let Err(reason) = &failed {
                    tracing::debug!(%reason, face, "async readback failed, trying sync capture");
                }
                match host.capture_sync(event.target) {
                    Ok(image) => Some(image),
                    Err(err) => {
                        host.notify(&format!("Panorama face {} lost: {}", face, err));
                        None
                    }
                }
            }
        };

        match image {
            Some(image) => self.faces.store(face, image),
            None => {
                // Re-queue the face within the same cycle.
                self.faces_scheduled_in_cycle = self.faces_scheduled_in_cycle.saturating_sub(1);
                return;
            }
        }

        if self.cycle_in_progress
            && self.faces_scheduled_in_cycle >= FACE_COUNT
            && self.pending_face_captures == 0
            && self.faces.is_complete()
        {
            self.finish_cycle(host);
        }
    }

    fn finish_cycle(&mut self, host: &mut dyn RenderHost) {
        self.cycle_in_progress = false;
        self.completed_cycles += 1;
        // Never reschedule into the past; a cycle that overran its interval
        // starts the next one on the following tick.
        self.next_cycle_tick =
            (self.tick_counter + 1).max(self.cycle_start_tick + self.interval_ticks);

        let faces = match self.faces.detach() {
            Ok(faces) => faces,
            Err(err) => {
                host.notify(&format!("Panorama cycle discarded: {}", err));
                return;
            }
        };
        let export_path = self
            .config
            .export_enabled
            .then(|| host.screenshots_dir().join(EXPORT_FILE_NAME));
        let job = StitchJob {
            faces,
            downscale: self.config.downscale,
            export_path,
        };
        if let Submit::Dropped {
            notice: Some(notice),
        } = self.worker.submit(self.tick_counter, job)
        {
            host.notify(&notice);
        }
    }
}
