//! Cube-face geometry and the per-cycle face accumulator.
//!
//! Faces are indexed 0..6 in capture order: north, east, south, west, up,
//! down. The stitched sheet is a 3x2 grid in the conventional cross-free
//! layout; [`SHEET_LAYOUT`] maps each grid cell (row-major) to the face
//! index rendered into it.

use image::RgbaImage;

use crate::error::{CaptureError, CaptureResult};
use crate::host::{CameraPose, clamp_pitch, nudged};

pub const FACE_COUNT: usize = 6;

/// Face index per sheet cell, row-major over the 3x2 grid.
///
/// Top row: west, east, up. Bottom row: down, north, south.
pub const SHEET_LAYOUT: [usize; FACE_COUNT] = [3, 1, 4, 5, 0, 2];

/// Yaw offset from the capture origin for each face, degrees.
const FACE_YAW_OFFSETS: [f32; FACE_COUNT] = [0.0, 90.0, 180.0, 270.0, 0.0, 0.0];

/// Pitch offset from the capture origin for each face, degrees. The
/// horizontal ring keeps the origin's pitch; up and down swing it by 90.
const FACE_PITCH_OFFSETS: [f32; FACE_COUNT] = [0.0, 0.0, 0.0, 0.0, -90.0, 90.0];

/// Human-readable face names, in capture order.
pub const FACE_NAMES: [&str; FACE_COUNT] = ["north", "east", "south", "west", "up", "down"];

/// Camera pose for one cube face.
///
/// Both angles are relative to the origin: yaw and pitch offsets are added
/// to the origin's, with the result clamped to the renderable pitch range.
/// A non-zero `nudge` moves the eye along the face's own view vector before
/// rendering.
pub fn face_pose(origin: &CameraPose, face: usize, nudge: f64) -> CameraPose {
    let index = face % FACE_COUNT;
    let yaw = (origin.yaw + FACE_YAW_OFFSETS[index]).rem_euclid(360.0);
    let pitch = clamp_pitch(origin.pitch + FACE_PITCH_OFFSETS[index]);
    CameraPose {
        position: nudged(origin.position, yaw, pitch, nudge),
        yaw,
        pitch,
    }
}

/// Accumulates converted face images across one panorama cycle.
pub struct FaceSlots {
    slots: [Option<RgbaImage>; FACE_COUNT],
}

impl FaceSlots {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    pub fn store(&mut self, face: usize, image: RgbaImage) {
        if face < FACE_COUNT {
            self.slots[face] = Some(image);
        }
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// Take all six faces out, leaving the slots empty. Errors if any face
    /// is missing; the cycle must not stitch a partial set.
    pub fn detach(&mut self) -> CaptureResult<Vec<RgbaImage>> {
        let mut faces = Vec::with_capacity(FACE_COUNT);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot.take() {
                Some(image) => faces.push(image),
                None => {
                    self.clear();
                    return Err(CaptureError::stitch(format!(
                        "face {} ({}) missing from completed cycle",
                        index, FACE_NAMES[index]
                    )));
                }
            }
        }
        Ok(faces)
    }
}

impl Default for FaceSlots {
    fn default() -> Self {
        Self::new()
    }
}
