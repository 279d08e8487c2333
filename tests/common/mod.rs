//! Shared test host: a fully scripted [`RenderHost`] double.
#![allow(dead_code)]
//!
//! Unlike the procedural synthetic host, this one records every call and
//! lets tests inject failures and hold back readback completions to steer
//! the schedulers deterministically.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::RgbaImage;

use cubemap_capture::error::{CaptureError, CaptureResult};
use cubemap_capture::host::{
    ActorId, CameraPose, MappedFrame, ReadbackCallback, ReadbackTicket, RenderHost,
    RenderOverrides, TargetId, Vec3,
};

/// Solid color encoding the pose a frame was rendered with.
///
/// Red tracks yaw, green tracks pitch, blue is a constant marker.
pub fn pose_color(yaw: f32, pitch: f32) -> [u8; 4] {
    let r = (yaw.rem_euclid(360.0) / 360.0 * 200.0) as u8;
    let g = ((pitch + 90.0) / 180.0 * 200.0) as u8;
    [r, g, 17, 255]
}

struct TargetState {
    width: u32,
    height: u32,
    /// Pose of the last frame rendered into this target.
    last_pose: Option<CameraPose>,
}

struct PendingReadback {
    /// Snapshot taken when the copy was requested; delivery stays valid even
    /// if the target is released in between.
    width: u32,
    height: u32,
    pose: CameraPose,
    callback: ReadbackCallback,
}

/// Scripted host for integration tests.
pub struct ScriptedHost {
    ready: bool,
    overrides: RenderOverrides,
    targets: HashMap<TargetId, TargetState>,
    /// Every override set seen by a render call, in order.
    pub render_calls: Vec<RenderOverrides>,
    pub notifications: Vec<String>,
    actors: Vec<ActorId>,
    open_tickets: Vec<ReadbackTicket>,
    pub finished_tickets: usize,
    /// When true, completions queue up until `deliver_pending` runs.
    pub manual_delivery: bool,
    pending: Vec<PendingReadback>,
    pub fail_next_render: bool,
    pub fail_next_alloc: bool,
    pub fail_apply_overrides: bool,
    pub fail_next_readback_map: bool,
    pub fail_next_unmap: bool,
    pub fail_sync_capture: bool,
    next_target_id: u64,
    next_actor_id: u64,
    next_ticket_id: u64,
    pub screenshots_dir: PathBuf,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            ready: true,
            overrides: RenderOverrides {
                camera: CameraPose {
                    position: Vec3::new(0.0, 70.0, 0.0),
                    yaw: 0.0,
                    pitch: 0.0,
                },
                width: 1920,
                height: 1080,
                fov: 70.0,
                perspective: cubemap_capture::host::Perspective::FirstPerson,
                hud_hidden: false,
                outline_enabled: true,
                panorama_mode: false,
                target: None,
            },
            targets: HashMap::new(),
            render_calls: Vec::new(),
            notifications: Vec::new(),
            actors: Vec::new(),
            open_tickets: Vec::new(),
            finished_tickets: 0,
            manual_delivery: false,
            pending: Vec::new(),
            fail_next_render: false,
            fail_next_alloc: false,
            fail_apply_overrides: false,
            fail_next_readback_map: false,
            fail_next_unmap: false,
            fail_sync_capture: false,
            next_target_id: 1,
            next_actor_id: 1,
            next_ticket_id: 1,
            screenshots_dir: std::env::temp_dir(),
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn set_camera(&mut self, yaw: f32, pitch: f32) {
        self.overrides.camera.yaw = yaw;
        self.overrides.camera.pitch = pitch;
    }

    pub fn open_ticket_count(&self) -> usize {
        self.open_tickets.len()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn has_notification(&self, fragment: &str) -> bool {
        self.notifications.iter().any(|n| n.contains(fragment))
    }

    /// Deliver all held-back readback completions.
    pub fn deliver_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for item in pending {
            let frame = self.mapped_frame(item.width, item.height, item.pose);
            (item.callback)(frame);
        }
    }

    /// Drop all held-back completions without delivering them.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn mapped_frame(
        &mut self,
        w: u32,
        h: u32,
        pose: CameraPose,
    ) -> Result<MappedFrame, String> {
        let [r, g, b, _] = pose_color(pose.yaw, pose.pitch);
        let mut data = vec![0u8; (w * h * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[0] = b;
            px[1] = g;
            px[2] = r;
            px[3] = 0;
        }
        let ticket = ReadbackTicket(self.next_ticket_id);
        self.next_ticket_id += 1;
        self.open_tickets.push(ticket);
        Ok(MappedFrame {
            ticket,
            width: w,
            height: h,
            data,
        })
    }
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for ScriptedHost {
    fn context_ready(&self) -> bool {
        self.ready
    }

    fn render_frame(&mut self) -> CaptureResult<()> {
        if self.fail_next_render {
            self.fail_next_render = false;
            return Err(CaptureError::render("render_frame", "scripted failure"));
        }
        self.render_calls.push(self.overrides.clone());
        if let Some(target) = self.overrides.target {
            let pose = self.overrides.camera;
            if let Some(state) = self.targets.get_mut(&target) {
                state.last_pose = Some(pose);
            }
        }
        Ok(())
    }

    fn alloc_target(&mut self, width: u32, height: u32) -> CaptureResult<TargetId> {
        if self.fail_next_alloc {
            self.fail_next_alloc = false;
            return Err(CaptureError::host("alloc_target", "scripted failure"));
        }
        let id = TargetId(self.next_target_id);
        self.next_target_id += 1;
        self.targets.insert(
            id,
            TargetState {
                width,
                height,
                last_pose: None,
            },
        );
        Ok(id)
    }

    fn release_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
    }

    fn overrides(&self) -> RenderOverrides {
        self.overrides.clone()
    }

    fn apply_overrides(&mut self, overrides: &RenderOverrides) -> CaptureResult<()> {
        if self.fail_apply_overrides {
            // Persistent until cleared, unlike the one-shot render failure.
            return Err(CaptureError::host("apply_overrides", "scripted failure"));
        }
        self.overrides = overrides.clone();
        Ok(())
    }

    fn spawn_companion(&mut self, _pose: CameraPose) -> CaptureResult<ActorId> {
        let id = ActorId(self.next_actor_id);
        self.next_actor_id += 1;
        self.actors.push(id);
        Ok(id)
    }

    fn remove_actor(&mut self, actor: ActorId) {
        self.actors.retain(|a| *a != actor);
    }

    fn begin_readback(
        &mut self,
        target: TargetId,
        on_mapped: ReadbackCallback,
    ) -> CaptureResult<()> {
        let Some(state) = self.targets.get(&target) else {
            return Err(CaptureError::readback("copy", "unknown target"));
        };
        let (w, h) = (state.width, state.height);
        let pose = state.last_pose.unwrap_or_default();
        if self.fail_next_readback_map {
            self.fail_next_readback_map = false;
            on_mapped(Err("scripted map failure".to_string()));
            return Ok(());
        }
        if self.manual_delivery {
            self.pending.push(PendingReadback {
                width: w,
                height: h,
                pose,
                callback: on_mapped,
            });
            return Ok(());
        }
        let frame = self.mapped_frame(w, h, pose);
        on_mapped(frame);
        Ok(())
    }

    fn finish_readback(&mut self, ticket: ReadbackTicket) -> CaptureResult<()> {
        let before = self.open_tickets.len();
        self.open_tickets.retain(|t| *t != ticket);
        if self.open_tickets.len() == before {
            return Err(CaptureError::readback("unmap", "unknown ticket"));
        }
        self.finished_tickets += 1;
        if self.fail_next_unmap {
            self.fail_next_unmap = false;
            return Err(CaptureError::readback("unmap", "scripted unmap failure"));
        }
        Ok(())
    }

    fn capture_sync(&mut self, target: TargetId) -> CaptureResult<RgbaImage> {
        if self.fail_sync_capture {
            return Err(CaptureError::readback("sync", "scripted sync failure"));
        }
        let state = self
            .targets
            .get(&target)
            .ok_or_else(|| CaptureError::readback("sync", "unknown target"))?;
        let pose = state.last_pose.unwrap_or_default();
        let color = pose_color(pose.yaw, pose.pitch);
        Ok(RgbaImage::from_pixel(
            state.width,
            state.height,
            image::Rgba(color),
        ))
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }

    fn screenshots_dir(&self) -> PathBuf {
        self.screenshots_dir.clone()
    }
}

/// Poll until `predicate` returns true or the timeout elapses.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

/// Run the rig for `ticks` ticks with a short real-time pause per tick so
/// the conversion and worker threads can keep up.
pub fn run_ticks(
    rig: &mut cubemap_capture::CaptureRig,
    host: &mut ScriptedHost,
    ticks: u64,
) {
    for _ in 0..ticks {
        rig.tick(host);
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Shared handle alias used by tests that capture values from callbacks.
pub type SharedSlot<T> = Arc<Mutex<Option<T>>>;
