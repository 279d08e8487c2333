// SPDX-License-Identifier: MIT
// Standard kernels built on fast_image_resize (SIMD-accelerated).
// RGBA8 in -> RGBA8 out, tightly packed, fresh output buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::{ScaleError, Size};

/// Run one resize pass with the given kernel.
///
/// Channels are treated independently (`use_alpha(false)`): capture output is
/// forced opaque upstream, so alpha-weighted filtering would only burn cycles.
pub fn resample(
    resizer: &mut Resizer,
    src: &[u8],
    src_size: Size,
    dst_size: Size,
    alg: fir::ResizeAlg,
) -> Result<Vec<u8>, ScaleError> {
    let src_view = TypedImageRef::<U8x4>::from_buffer(src_size.w, src_size.h, src)?;

    let mut dst = vec![0u8; dst_size.byte_len()];
    let mut dst_image = TypedImage::<U8x4>::from_buffer(dst_size.w, dst_size.h, &mut dst)?;

    let opts = ResizeOptions::new().resize_alg(alg).use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    Ok(dst)
}
