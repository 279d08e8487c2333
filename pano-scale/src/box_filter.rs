// SPDX-License-Identifier: MIT
//! Exact box (area-averaging) filter.
//!
//! Each target pixel owns a rectangular footprint in source space:
//! `src_x0 = x * scale_x`, `src_x1 = src_x0 + scale_x` with
//! `scale_x = src_w / dst_w` (same along Y). Every source pixel overlapping
//! that footprint contributes with weight equal to the product of its 1-D
//! overlap lengths on each axis, alpha included. The output channel is the
//! weight-averaged sum rounded to nearest. A footprint that accumulates zero
//! weight produces opaque black.
//!
//! This is the exact filter, not a fixed 2x2 or 4x4 tap approximation, so a
//! uniform source stays uniform at any ratio and fractional footprints blend
//! proportionally.

use fast_image_resize as fir;

use crate::{cpu, ScaleError, Size};

/// Box-average `src` down to `dst_size`.
///
/// Only meaningful for a strict shrink on both axes; anything else falls
/// back to bicubic, which handles magnification sensibly.
pub fn resize_box(src: &[u8], src_size: Size, dst_size: Size) -> Result<Vec<u8>, ScaleError> {
    if dst_size.w >= src_size.w || dst_size.h >= src_size.h {
        let mut resizer = fir::Resizer::new();
        return cpu::resample(
            &mut resizer,
            src,
            src_size,
            dst_size,
            fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
        );
    }

    let src_w = src_size.w as usize;
    let src_h = src_size.h as usize;
    let dst_w = dst_size.w as usize;
    let dst_h = dst_size.h as usize;

    let scale_x = src_w as f64 / dst_w as f64;
    let scale_y = src_h as f64 / dst_h as f64;

    let mut out = vec![0u8; dst_size.byte_len()];

    for y in 0..dst_h {
        let src_y0 = y as f64 * scale_y;
        let src_y1 = src_y0 + scale_y;
        let min_y = src_y0.floor() as isize;
        let max_y = src_y1.ceil() as isize;
        let out_row = y * dst_w;

        for x in 0..dst_w {
            let src_x0 = x as f64 * scale_x;
            let src_x1 = src_x0 + scale_x;
            let min_x = src_x0.floor() as isize;
            let max_x = src_x1.ceil() as isize;

            let mut weight_sum = 0.0f64;
            let mut sums = [0.0f64; 4];

            for sy in min_y..max_y {
                if sy < 0 || sy as usize >= src_h {
                    continue;
                }
                let y_coverage = pixel_coverage(sy, src_y0, src_y1);
                if y_coverage <= 0.0 {
                    continue;
                }
                let src_row = sy as usize * src_w;

                for sx in min_x..max_x {
                    if sx < 0 || sx as usize >= src_w {
                        continue;
                    }
                    let weight = pixel_coverage(sx, src_x0, src_x1) * y_coverage;
                    if weight <= 0.0 {
                        continue;
                    }
                    let idx = (src_row + sx as usize) * 4;
                    for c in 0..4 {
                        sums[c] += src[idx + c] as f64 * weight;
                    }
                    weight_sum += weight;
                }
            }

            let out_idx = (out_row + x) * 4;
            if weight_sum <= 0.0 {
                out[out_idx..out_idx + 4].copy_from_slice(&[0, 0, 0, 255]);
                continue;
            }
            for c in 0..4 {
                out[out_idx + c] = (sums[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(out)
}

/// Overlap length between source pixel `[index, index + 1)` and the footprint
/// interval `[min, max)` on one axis.
fn pixel_coverage(index: isize, min: f64, max: f64) -> f64 {
    let pixel_min = index as f64;
    let pixel_max = pixel_min + 1.0;
    (pixel_max.min(max) - pixel_min.max(min)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(size: Size, px: [u8; 4]) -> Vec<u8> {
        std::iter::repeat(px)
            .take((size.w * size.h) as usize)
            .flatten()
            .collect()
    }

    #[test]
    fn test_uniform_source_stays_uniform() {
        let color = [37u8, 141, 219, 255];
        let src_size = Size { w: 30, h: 20 };
        let src = uniform(src_size, color);
        for (w, h) in [(29, 19), (15, 10), (7, 3), (1, 1)] {
            let out = resize_box(&src, src_size, Size { w, h }).unwrap();
            for px in out.chunks_exact(4) {
                assert_eq!(px, &color, "drifted at {}x{}", w, h);
            }
        }
    }

    #[test]
    fn test_exact_half_average() {
        // Two pixels, black and white, averaged into one: (0 + 255) / 2
        // rounds to 128.
        let src = vec![0, 0, 0, 255, 255, 255, 255, 255];
        let out = resize_box(&src, Size { w: 2, h: 1 }, Size { w: 1, h: 1 }).unwrap();
        assert_eq!(&out, &[128, 128, 128, 255]);
    }

    #[test]
    fn test_fractional_coverage_weights() {
        // 3x1 -> 2x1, scale 1.5. Target 0 spans [0, 1.5): pixel 0 full,
        // pixel 1 half. Target 1 spans [1.5, 3): pixel 1 half, pixel 2 full.
        let src = vec![
            0, 0, 0, 255, //
            255, 255, 255, 255, //
            255, 255, 255, 255,
        ];
        let out = resize_box(&src, Size { w: 3, h: 1 }, Size { w: 2, h: 1 }).unwrap();
        // (0*1.0 + 255*0.5) / 1.5 = 85
        assert_eq!(&out[0..4], &[85, 85, 85, 255]);
        // (255*0.5 + 255*1.0) / 1.5 = 255
        assert_eq!(&out[4..8], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_alpha_participates_in_average() {
        let src = vec![
            100, 100, 100, 0, //
            100, 100, 100, 255,
        ];
        let out = resize_box(&src, Size { w: 2, h: 1 }, Size { w: 1, h: 1 }).unwrap();
        assert_eq!(out[3], 128);
    }

    #[test]
    fn test_non_shrinking_target_falls_back() {
        // Upscale request must still produce a full-size valid buffer.
        let src_size = Size { w: 4, h: 4 };
        let src = uniform(src_size, [9, 9, 9, 255]);
        let out = resize_box(&src, src_size, Size { w: 8, h: 8 }).unwrap();
        assert_eq!(out.len(), Size { w: 8, h: 8 }.byte_len());
    }
}
