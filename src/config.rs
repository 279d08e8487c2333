//! # Capture Configuration
//!
//! Per-kind capture settings with the same clamping rules the console
//! front-end enforces. Setters clamp rather than reject, so a configuration
//! is always usable; schedulers read these structs at capture or cycle
//! boundaries, never mid-flight.

use pano_scale::{Algorithm, DownscaleConfig, Stage};

/// Shortest accepted capture interval.
pub const MIN_INTERVAL_SECONDS: f64 = 0.1;

/// Single-shot frame dimension bounds.
pub const MIN_SINGLE_DIMENSION: u32 = 64;
pub const MAX_SINGLE_DIMENSION: u32 = 4096;
pub const DEFAULT_SINGLE_WIDTH: u32 = 1024;
pub const DEFAULT_SINGLE_HEIGHT: u32 = 1024;

/// Single-shot field of view, degrees.
pub const MIN_FOV_DEGREES: f64 = 1.0;
pub const MAX_FOV_DEGREES: f64 = 179.0;
pub const DEFAULT_FOV_DEGREES: f64 = 90.0;

/// Panorama face resolution (faces are square).
pub const MIN_PANORAMA_RESOLUTION: u32 = 16;
pub const MAX_PANORAMA_RESOLUTION: u32 = 8192;
pub const DEFAULT_PANORAMA_RESOLUTION: u32 = 1024;

/// Downscale factor ceiling accepted from the console.
pub const MAX_DOWNSCALE_FACTOR: f64 = 64.0;

/// Nudge distance bound, scene units.
pub const MAX_NUDGE_DISTANCE: f64 = 10.0;

/// Settings for the single-shot capture kind.
///
/// Resolution and FOV are applied at render time; single frames have no
/// post-capture resize stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleConfig {
    pub width: u32,
    pub height: u32,
    pub fov: f64,
    /// Spawn a render-only stand-in actor at the capture origin.
    pub companion_enabled: bool,
}

impl Default for SingleConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SINGLE_WIDTH,
            height: DEFAULT_SINGLE_HEIGHT,
            fov: DEFAULT_FOV_DEGREES,
            companion_enabled: false,
        }
    }
}

impl SingleConfig {
    /// Set the frame resolution, clamped to the accepted range.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width.clamp(MIN_SINGLE_DIMENSION, MAX_SINGLE_DIMENSION);
        self.height = height.clamp(MIN_SINGLE_DIMENSION, MAX_SINGLE_DIMENSION);
    }

    /// Set the field of view, clamped to the accepted range.
    pub fn set_fov(&mut self, fov: f64) {
        self.fov = fov.clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES);
    }

    pub fn describe_resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Settings for the panorama capture kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaConfig {
    /// Face resolution; faces are square.
    pub resolution: u32,
    /// Precise mode renders all six faces back-to-back in one burst;
    /// smooth mode spreads them evenly across the interval.
    pub precise_mode: bool,
    pub downscale: DownscaleConfig,
    /// Write the latest stitched sheet to the screenshots directory.
    pub export_enabled: bool,
    pub companion_enabled: bool,
    /// Signed distance the capture origin is moved along each face's view
    /// vector. Magnitudes within epsilon of zero disable the nudge.
    pub nudge_distance: f64,
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_PANORAMA_RESOLUTION,
            precise_mode: false,
            downscale: DownscaleConfig::default(),
            export_enabled: false,
            companion_enabled: false,
            nudge_distance: 0.0,
        }
    }
}

impl PanoramaConfig {
    pub fn set_resolution(&mut self, size: u32) {
        self.resolution = size.clamp(MIN_PANORAMA_RESOLUTION, MAX_PANORAMA_RESOLUTION);
    }

    /// Update the downscale selection. `None` fields keep their current
    /// value, matching the console command's optional arguments.
    pub fn set_downscale(
        &mut self,
        factor: f64,
        stage: Option<Stage>,
        algorithm: Option<Algorithm>,
    ) {
        self.downscale.factor = factor.clamp(1.0, MAX_DOWNSCALE_FACTOR);
        if let Some(stage) = stage {
            self.downscale.stage = stage;
        }
        if let Some(algorithm) = algorithm {
            self.downscale.algorithm = algorithm;
        }
    }

    pub fn set_nudge(&mut self, distance: f64) {
        self.nudge_distance = distance.clamp(-MAX_NUDGE_DISTANCE, MAX_NUDGE_DISTANCE);
    }

    pub fn mode_label(&self) -> &'static str {
        if self.precise_mode { "precise" } else { "smooth" }
    }

    pub fn describe_resolution(&self) -> String {
        format!("{}x{}", self.resolution, self.resolution)
    }

    pub fn describe_downscale(&self) -> String {
        if !self.downscale.enabled() {
            return "off".to_string();
        }
        format!(
            "{:.2}x ({}, {})",
            self.downscale.factor, self.downscale.stage, self.downscale.algorithm
        )
    }

    pub fn describe_nudge(&self) -> String {
        if self.nudge_distance.abs() <= crate::host::NUDGE_EPSILON {
            return "off".to_string();
        }
        format!("{:+.4} units", self.nudge_distance)
    }
}

/// Format an FOV without trailing zeros (90, 62.5, 100.125).
pub fn format_fov(fov: f64) -> String {
    let text = format!("{:.5}", fov);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_resolution_clamps() {
        let mut cfg = SingleConfig::default();
        cfg.set_resolution(10, 100_000);
        assert_eq!(cfg.width, MIN_SINGLE_DIMENSION);
        assert_eq!(cfg.height, MAX_SINGLE_DIMENSION);
        cfg.set_resolution(512, 384);
        assert_eq!(cfg.describe_resolution(), "512x384");
    }

    #[test]
    fn test_fov_clamps() {
        let mut cfg = SingleConfig::default();
        cfg.set_fov(0.1);
        assert_eq!(cfg.fov, MIN_FOV_DEGREES);
        cfg.set_fov(400.0);
        assert_eq!(cfg.fov, MAX_FOV_DEGREES);
    }

    #[test]
    fn test_downscale_partial_update_keeps_fields() {
        let mut cfg = PanoramaConfig::default();
        cfg.set_downscale(2.0, Some(Stage::PerFace), None);
        assert_eq!(cfg.downscale.factor, 2.0);
        assert_eq!(cfg.downscale.stage, Stage::PerFace);
        assert_eq!(cfg.downscale.algorithm, Algorithm::Bicubic);

        cfg.set_downscale(4.0, None, Some(Algorithm::Box));
        assert_eq!(cfg.downscale.stage, Stage::PerFace);
        assert_eq!(cfg.downscale.algorithm, Algorithm::Box);
    }

    #[test]
    fn test_describe_downscale() {
        let mut cfg = PanoramaConfig::default();
        assert_eq!(cfg.describe_downscale(), "off");
        cfg.set_downscale(2.0, None, Some(Algorithm::Box));
        assert_eq!(cfg.describe_downscale(), "2.00x (cubemap, box)");
    }

    #[test]
    fn test_format_fov_trims_zeros() {
        assert_eq!(format_fov(90.0), "90");
        assert_eq!(format_fov(62.5), "62.5");
        assert_eq!(format_fov(100.125), "100.125");
    }

    #[test]
    fn test_nudge_clamps_and_describes() {
        let mut cfg = PanoramaConfig::default();
        assert_eq!(cfg.describe_nudge(), "off");
        cfg.set_nudge(50.0);
        assert_eq!(cfg.nudge_distance, MAX_NUDGE_DISTANCE);
        cfg.set_nudge(-0.25);
        assert_eq!(cfg.describe_nudge(), "-0.2500 units");
    }
}
