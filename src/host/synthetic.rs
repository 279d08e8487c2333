//! Procedural host implementation for demos and examples.
//!
//! Renders a flat-shaded gradient "scene" whose colors depend on the camera
//! pose, so panorama faces come out visibly distinct. Readback completions
//! are delivered synchronously from `begin_readback`, which is a legal
//! scheduling per the host contract (completion may arrive on any thread at
//! any time after the call).

use std::collections::HashMap;
use std::path::PathBuf;

use image::RgbaImage;

use crate::error::{CaptureError, CaptureResult};
use crate::host::{
    ActorId, CameraPose, MappedFrame, Perspective, ReadbackCallback, ReadbackTicket, RenderHost,
    RenderOverrides, TargetId, Vec3,
};

struct TargetBuffer {
    width: u32,
    height: u32,
    /// Bottom-up BGRA, as a GPU color attachment would be mapped.
    pixels: Vec<u8>,
}

/// In-memory host with a procedural scene.
pub struct SyntheticHost {
    ready: bool,
    overrides: RenderOverrides,
    targets: HashMap<TargetId, TargetBuffer>,
    actors: Vec<ActorId>,
    open_tickets: Vec<ReadbackTicket>,
    next_target_id: u64,
    next_actor_id: u64,
    next_ticket_id: u64,
    screenshots_dir: PathBuf,
}

impl SyntheticHost {
    pub fn new() -> Self {
        Self {
            ready: true,
            overrides: RenderOverrides {
                camera: CameraPose {
                    position: Vec3::new(0.0, 64.0, 0.0),
                    yaw: 0.0,
                    pitch: 0.0,
                },
                width: 1280,
                height: 720,
                fov: 70.0,
                perspective: Perspective::FirstPerson,
                hud_hidden: false,
                outline_enabled: true,
                panorama_mode: false,
                target: None,
            },
            targets: HashMap::new(),
            actors: Vec::new(),
            open_tickets: Vec::new(),
            next_target_id: 1,
            next_actor_id: 1,
            next_ticket_id: 1,
            screenshots_dir: std::env::temp_dir().join("cubemap_capture"),
        }
    }

    /// Override the export directory (defaults to a temp-dir subfolder).
    pub fn with_screenshots_dir(mut self, dir: PathBuf) -> Self {
        self.screenshots_dir = dir;
        self
    }

    /// Simulate loading/unloading the scene.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    fn shade(camera: &CameraPose, x: u32, y: u32, width: u32, height: u32) -> [u8; 3] {
        // Horizon band that moves with pitch, hue that moves with yaw.
        let yaw_unit = (camera.yaw.rem_euclid(360.0) / 360.0) as f64;
        let pitch_unit = ((camera.pitch + 90.0) / 180.0) as f64;
        let vertical = y as f64 / height.max(1) as f64;
        let horizontal = x as f64 / width.max(1) as f64;

        let sky = (1.0 - vertical) * (1.0 - pitch_unit);
        let r = (yaw_unit * 200.0 + horizontal * 40.0) as u8;
        let g = (sky * 180.0 + 40.0) as u8;
        let b = (pitch_unit * 160.0 + vertical * 60.0) as u8;
        [r, g, b]
    }
}

impl Default for SyntheticHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for SyntheticHost {
    fn context_ready(&self) -> bool {
        self.ready
    }

    fn render_frame(&mut self) -> CaptureResult<()> {
        if !self.ready {
            return Err(CaptureError::render("render_frame", "no scene is loaded"));
        }
        let camera = self.overrides.camera;
        let Some(target_id) = self.overrides.target else {
            // Rendering to the visible display is a no-op here.
            return Ok(());
        };
        let target = self.targets.get_mut(&target_id).ok_or_else(|| {
            CaptureError::render("render_frame", format!("unknown target {:?}", target_id))
        })?;

        let (w, h) = (target.width, target.height);
        for y in 0..h {
            // Row 0 of the buffer is the bottom scanline.
            let scene_y = h - 1 - y;
            let row = (y * w * 4) as usize;
            for x in 0..w {
                let [r, g, b] = Self::shade(&camera, x, scene_y, w, h);
                let idx = row + (x * 4) as usize;
                target.pixels[idx] = b;
                target.pixels[idx + 1] = g;
                target.pixels[idx + 2] = r;
                target.pixels[idx + 3] = 255;
            }
        }
        Ok(())
    }

    fn alloc_target(&mut self, width: u32, height: u32) -> CaptureResult<TargetId> {
        if width == 0 || height == 0 {
            return Err(CaptureError::host(
                "alloc_target",
                format!("invalid dimensions {}x{}", width, height),
            ));
        }
        let id = TargetId(self.next_target_id);
        self.next_target_id += 1;
        self.targets.insert(
            id,
            TargetBuffer {
                width,
                height,
                pixels: vec![0u8; (width * height * 4) as usize],
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
        if let Some(target) = overrides.target {
            if !self.targets.contains_key(&target) {
                return Err(CaptureError::host(
                    "apply_overrides",
                    format!("unknown target {:?}", target),
                ));
            }
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
        let Some(buffer) = self.targets.get(&target) else {
            return Err(CaptureError::readback(
                "copy",
                format!("unknown target {:?}", target),
            ));
        };
        let ticket = ReadbackTicket(self.next_ticket_id);
        self.next_ticket_id += 1;
        self.open_tickets.push(ticket);
        on_mapped(Ok(MappedFrame {
            ticket,
            width: buffer.width,
            height: buffer.height,
            data: buffer.pixels.clone(),
        }));
        Ok(())
    }

    fn finish_readback(&mut self, ticket: ReadbackTicket) -> CaptureResult<()> {
        let before = self.open_tickets.len();
        self.open_tickets.retain(|t| *t != ticket);
        if self.open_tickets.len() == before {
            return Err(CaptureError::readback(
                "unmap",
                format!("unknown ticket {:?}", ticket),
            ));
        }
        Ok(())
    }

    fn capture_sync(&mut self, target: TargetId) -> CaptureResult<RgbaImage> {
        let buffer = self.targets.get(&target).ok_or_else(|| {
            CaptureError::readback("sync", format!("unknown target {:?}", target))
        })?;
        let (w, h) = (buffer.width, buffer.height);
        let mut image = RgbaImage::new(w, h);
        for y in 0..h {
            let src_row = ((h - 1 - y) * w * 4) as usize;
            for x in 0..w {
                let idx = src_row + (x * 4) as usize;
                let px = image::Rgba([
                    buffer.pixels[idx + 2],
                    buffer.pixels[idx + 1],
                    buffer.pixels[idx],
                    255,
                ]);
                image.put_pixel(x, y, px);
            }
        }
        Ok(image)
    }

    fn notify(&mut self, message: &str) {
        println!("[pano] {}", message);
    }

    fn screenshots_dir(&self) -> PathBuf {
        self.screenshots_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_sync_capture_round_trip() {
        let mut host = SyntheticHost::new();
        let target = host.alloc_target(8, 8).unwrap();
        let mut overrides = host.overrides();
        overrides.target = Some(target);
        host.apply_overrides(&overrides).unwrap();
        host.render_frame().unwrap();

        let image = host.capture_sync(target).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_tickets_close_once() {
        use std::sync::{Arc, Mutex};

        let mut host = SyntheticHost::new();
        let target = host.alloc_target(4, 4).unwrap();
        let delivered = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&delivered);
        host.begin_readback(
            target,
            Box::new(move |r| {
                *slot.lock().unwrap() = r.ok().map(|m| m.ticket);
            }),
        )
        .unwrap();

        let ticket = delivered.lock().unwrap().expect("completion not delivered");
        assert!(host.finish_readback(ticket).is_ok());
        assert!(host.finish_readback(ticket).is_err());
    }

    #[test]
    fn test_pose_changes_pixels() {
        let mut host = SyntheticHost::new();
        let target = host.alloc_target(4, 4).unwrap();
        let mut overrides = host.overrides();
        overrides.target = Some(target);
        overrides.camera.yaw = 0.0;
        host.apply_overrides(&overrides).unwrap();
        host.render_frame().unwrap();
        let first = host.capture_sync(target).unwrap();

        overrides.camera.yaw = 180.0;
        host.apply_overrides(&overrides).unwrap();
        host.render_frame().unwrap();
        let second = host.capture_sync(target).unwrap();
        assert_ne!(first.as_raw(), second.as_raw());
    }
}
