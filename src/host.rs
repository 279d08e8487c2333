//! # Host Capability Interface
//!
//! The narrow surface through which the capture pipeline borrows the host
//! engine's single rendering path. The pipeline never touches engine
//! internals directly; everything it needs — rendering a frame, allocating
//! offscreen targets, overriding shared render state, asynchronous GPU
//! readback — goes through [`RenderHost`].
//!
//! The host owns one set of shared render overrides ([`RenderOverrides`]).
//! Capture scopes save the current set, apply their own, and restore the
//! saved set on exit (see `capture::context`). A [`SyntheticHost`] backed by
//! a procedural scene is provided for demos; tests script their own double.
//!
//! [`SyntheticHost`]: synthetic::SyntheticHost

use std::path::PathBuf;

use image::RgbaImage;

use crate::error::CaptureResult;

pub mod synthetic;

/// Nudge distances below this are treated as disabled.
pub const NUDGE_EPSILON: f64 = 1.0e-6;

/// A position in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} {:.3} {:.3}", self.x, self.y, self.z)
    }
}

/// Camera placement: eye position plus view angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

/// Handle to a GPU-backed offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u64);

/// Handle to a transient render-only actor placed in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub u64);

/// Handle to a mapped GPU transfer buffer awaiting release on the tick thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadbackTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    FirstPerson,
    ThirdPerson,
}

/// The complete set of shared render state this pipeline overrides.
///
/// `overrides()` returns the host's current values; `apply_overrides()`
/// replaces them wholesale. Capture scopes round-trip this struct to restore
/// the host exactly, so every field a capture touches must live here.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOverrides {
    /// Active camera placement.
    pub camera: CameraPose,
    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,
    /// Field of view in degrees.
    pub fov: f64,
    pub perspective: Perspective,
    pub hud_hidden: bool,
    pub outline_enabled: bool,
    /// Engine-side panorama render flag (skips view bobbing, hand, etc.).
    pub panorama_mode: bool,
    /// Render destination. `None` renders to the visible display.
    pub target: Option<TargetId>,
}

/// Raw pixels mapped from a GPU transfer buffer.
///
/// Rows are bottom-up, pixels are BGRA, as delivered by the engine. The
/// ticket must be handed back through [`RenderHost::finish_readback`] on the
/// tick thread once conversion is done, whatever the conversion outcome.
pub struct MappedFrame {
    pub ticket: ReadbackTicket,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Completion callback for an asynchronous readback.
///
/// Invoked exactly once by the host, on an arbitrary thread, with either the
/// mapped transfer buffer or the reason the copy/map failed.
pub type ReadbackCallback = Box<dyn FnOnce(Result<MappedFrame, String>) + Send + 'static>;

/// Capabilities the capture pipeline consumes from the host engine.
pub trait RenderHost {
    /// A renderable scene exists. Sessions stop when this turns false.
    fn context_ready(&self) -> bool;

    /// Render one frame with the current overrides.
    fn render_frame(&mut self) -> CaptureResult<()>;

    fn alloc_target(&mut self, width: u32, height: u32) -> CaptureResult<TargetId>;

    fn release_target(&mut self, target: TargetId);

    /// Current shared render state.
    fn overrides(&self) -> RenderOverrides;

    /// Replace the shared render state wholesale.
    fn apply_overrides(&mut self, overrides: &RenderOverrides) -> CaptureResult<()>;

    /// Place a render-only stand-in actor at the given pose.
    fn spawn_companion(&mut self, pose: CameraPose) -> CaptureResult<ActorId>;

    fn remove_actor(&mut self, actor: ActorId);

    /// Start an asynchronous copy of the target's color data into a transfer
    /// buffer. The callback fires on an arbitrary thread when the buffer is
    /// mapped (or the copy failed).
    fn begin_readback(&mut self, target: TargetId, on_mapped: ReadbackCallback)
        -> CaptureResult<()>;

    /// Unmap and release a transfer buffer. Must be called on the tick
    /// thread. An error means the unmap failed; the resource is still freed.
    fn finish_readback(&mut self, ticket: ReadbackTicket) -> CaptureResult<()>;

    /// Slow synchronous full-frame capture, the fallback when the async
    /// readback path fails for a frame.
    fn capture_sync(&mut self, target: TargetId) -> CaptureResult<RgbaImage>;

    /// User-facing status line.
    fn notify(&mut self, message: &str);

    /// Directory for on-disk exports.
    fn screenshots_dir(&self) -> PathBuf;
}

/// Clamp a pitch angle to the renderable range.
pub fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-90.0, 90.0)
}

/// Unit view vector for the given angles (degrees).
pub fn direction_from_yaw_pitch(yaw: f32, pitch: f32) -> Vec3 {
    let yaw_radians = (yaw as f64).to_radians();
    let pitch_radians = (pitch as f64).to_radians();
    let pitch_cos = pitch_radians.cos();
    Vec3 {
        x: -yaw_radians.sin() * pitch_cos,
        y: -pitch_radians.sin(),
        z: yaw_radians.cos() * pitch_cos,
    }
}

/// Move a position along the view vector by a signed distance.
///
/// Distances within [`NUDGE_EPSILON`] of zero leave the position untouched.
pub fn nudged(position: Vec3, yaw: f32, pitch: f32, distance: f64) -> Vec3 {
    if distance.abs() <= NUDGE_EPSILON {
        return position;
    }
    position.add(direction_from_yaw_pitch(yaw, pitch).scaled(distance))
}
