// SPDX-License-Identifier: MIT
//! # pano-scale: Resampling kernels for cube-map capture
//!
//! Pure CPU resampling over row-major RGBA8 buffers with straight alpha.
//! Standard filters (nearest, bilinear, bicubic) ride on `fast_image_resize`
//! for SIMD acceleration; the box filter and the supersample chain are
//! implemented directly because their numeric contracts are stricter than a
//! stock kernel provides:
//!
//! - [`box_filter`]: exact area averaging. Every source pixel overlapping a
//!   target pixel's footprint contributes weight equal to the product of its
//!   per-axis overlap lengths. Not a fixed-grid approximation.
//! - [`supersample`]: repeated bilinear halving followed by one bicubic pass,
//!   so no single resize step exceeds a 2x reduction on the way down.
//!
//! All entry points are pure functions: buffer in, new buffer out, identity
//! when the dimensions already match.

use fast_image_resize as fir;

pub mod box_filter;
pub mod cpu;
pub mod supersample;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    /// Byte length of a tightly packed RGBA8 buffer of this size.
    pub fn byte_len(&self) -> usize {
        self.w as usize * self.h as usize * 4
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

#[derive(Debug)]
pub enum ScaleError {
    /// Source buffer length does not match `w * h * 4`.
    BufferSizeMismatch { expected: usize, actual: usize },
    /// A zero width or height was requested.
    ZeroDimension,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError {
    fn from(e: fir::ResizeError) -> Self {
        Self::Fir(e)
    }
}
impl From<fir::ImageBufferError> for ScaleError {
    fn from(e: fir::ImageBufferError) -> Self {
        Self::ImageBuf(e)
    }
}

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferSizeMismatch { expected, actual } => {
                write!(f, "Buffer length {} does not match expected {}", actual, expected)
            }
            ScaleError::ZeroDimension => write!(f, "Zero width or height"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Resampling algorithm selection.
///
/// `Box` and `Supersample` are the downscale-oriented filters; the remaining
/// three are the conventional kernels at their usual definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Box,
    Supersample,
}

impl Algorithm {
    /// Parse a console alias. Case-insensitive; surrounding whitespace ignored.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "nearest" | "nearest_neighbor" | "nearest-neighbor" => Some(Self::Nearest),
            "linear" | "bilinear" => Some(Self::Bilinear),
            "cubic" | "bicubic" => Some(Self::Bicubic),
            "box" | "area" | "boxscale" | "box_scaling" | "box-scaling" => Some(Self::Box),
            "supersample" | "supersampling" | "super" | "ssaa" => Some(Self::Supersample),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::Box => "box",
            Self::Supersample => "supersample",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "Unknown algorithm '{}' (expected nearest, bilinear, bicubic, box, or supersample)",
                s
            )
        })
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pipeline point at which a configured downscale is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Each captured face is resized before assembly.
    PerFace,
    /// The assembled sheet is resized as a whole.
    PostStitch,
}

impl Stage {
    /// Parse a console alias. Case-insensitive; surrounding whitespace ignored.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "faces" | "face" | "pre" | "before" | "before_stitch" | "prestitch" => {
                Some(Self::PerFace)
            }
            "cubemap" | "cube" | "post" | "after" | "after_stitch" | "poststitch" => {
                Some(Self::PostStitch)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PerFace => "faces",
            Self::PostStitch => "cubemap",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown stage '{}' (expected faces or cubemap)", s))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A complete downscale selection: how much, where, and with which filter.
///
/// `factor <= 1.0` disables resizing entirely. The stitch path reads one
/// snapshot of this struct per job, so mid-job changes never apply to work
/// already in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownscaleConfig {
    pub factor: f64,
    pub stage: Stage,
    pub algorithm: Algorithm,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            factor: 1.0,
            stage: Stage::PostStitch,
            algorithm: Algorithm::Bicubic,
        }
    }
}

impl DownscaleConfig {
    pub fn enabled(&self) -> bool {
        self.factor > 1.0
    }

    /// Apply this downscale to an owned buffer, returning it untouched when
    /// disabled or when the computed target equals the source size.
    pub fn apply(&self, src: Vec<u8>, size: Size) -> Result<(Vec<u8>, Size), ScaleError> {
        if !self.enabled() {
            return Ok((src, size));
        }
        let target = Size {
            w: scaled_dimension(size.w, self.factor),
            h: scaled_dimension(size.h, self.factor),
        };
        if target == size {
            return Ok((src, size));
        }
        let out = resize(&src, size, target, self.algorithm)?;
        Ok((out, target))
    }
}

/// Target dimension for a downscale factor: `round(dim / factor)` clamped to
/// `[1, dim]`. A factor at or below 1.0 leaves the dimension unchanged.
pub fn scaled_dimension(dim: u32, factor: f64) -> u32 {
    if factor <= 1.0 {
        return dim;
    }
    let scaled = (dim as f64 / factor).round() as u32;
    scaled.clamp(1, dim.max(1))
}

/// Resize an RGBA8 buffer to `dst_size` with the given algorithm.
///
/// Returns a fresh tightly packed buffer. When source and target dimensions
/// match, the input is returned as-is (copied), untouched by any kernel.
pub fn resize(
    src: &[u8],
    src_size: Size,
    dst_size: Size,
    algorithm: Algorithm,
) -> Result<Vec<u8>, ScaleError> {
    if src_size.w == 0 || src_size.h == 0 || dst_size.w == 0 || dst_size.h == 0 {
        return Err(ScaleError::ZeroDimension);
    }
    if src.len() != src_size.byte_len() {
        return Err(ScaleError::BufferSizeMismatch {
            expected: src_size.byte_len(),
            actual: src.len(),
        });
    }
    if src_size == dst_size {
        return Ok(src.to_vec());
    }
    match algorithm {
        Algorithm::Nearest => {
            let mut resizer = fir::Resizer::new();
            cpu::resample(&mut resizer, src, src_size, dst_size, fir::ResizeAlg::Nearest)
        }
        Algorithm::Bilinear => {
            let mut resizer = fir::Resizer::new();
            cpu::resample(
                &mut resizer,
                src,
                src_size,
                dst_size,
                fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
            )
        }
        Algorithm::Bicubic => {
            let mut resizer = fir::Resizer::new();
            cpu::resample(
                &mut resizer,
                src,
                src_size,
                dst_size,
                fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
            )
        }
        Algorithm::Box => box_filter::resize_box(src, src_size, dst_size),
        Algorithm::Supersample => supersample::resize_supersample(src, src_size, dst_size),
    }
}
