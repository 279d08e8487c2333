// SPDX-License-Identifier: MIT
//! Supersampled downscale: repeated bilinear halving, then one bicubic pass.
//!
//! A single large-ratio resize undersamples the source and aliases. Instead
//! the chain halves both dimensions with bilinear while both remain at least
//! twice the target, then finishes with bicubic to the exact size, so no
//! individual step reduces by more than 2x. Falls back to plain bicubic when
//! the target is not strictly smaller on both axes.

use fast_image_resize as fir;

use crate::{cpu, ScaleError, Size};

/// Kernel used for one step of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFilter {
    Bilinear,
    Bicubic,
}

/// One planned resize step: the size produced and the kernel that produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub size: Size,
    pub filter: StepFilter,
}

/// Plan the resize chain from `src` down to `dst`.
///
/// The returned list always ends at `dst`. Halving steps clamp at the target,
/// so no step shrinks a dimension by more than half (plus one pixel of
/// integer-division slack on odd sizes).
pub fn plan(src: Size, dst: Size) -> Vec<Step> {
    if dst.w >= src.w || dst.h >= src.h {
        return vec![Step {
            size: dst,
            filter: StepFilter::Bicubic,
        }];
    }

    let mut steps = Vec::new();
    let mut cur = src;
    while cur.w / 2 >= dst.w && cur.h / 2 >= dst.h {
        cur = Size {
            w: dst.w.max(cur.w / 2),
            h: dst.h.max(cur.h / 2),
        };
        steps.push(Step {
            size: cur,
            filter: StepFilter::Bilinear,
        });
    }
    if cur != dst {
        steps.push(Step {
            size: dst,
            filter: StepFilter::Bicubic,
        });
    }
    steps
}

/// Execute the supersample chain.
pub fn resize_supersample(
    src: &[u8],
    src_size: Size,
    dst_size: Size,
) -> Result<Vec<u8>, ScaleError> {
    let mut resizer = fir::Resizer::new();
    let mut cur = src.to_vec();
    let mut cur_size = src_size;

    for step in plan(src_size, dst_size) {
        if step.size == cur_size {
            continue;
        }
        let alg = match step.filter {
            StepFilter::Bilinear => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
            StepFilter::Bicubic => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
        };
        cur = cpu::resample(&mut resizer, &cur, cur_size, step.size, alg)?;
        cur_size = step.size;
    }

    Ok(cur)
}
