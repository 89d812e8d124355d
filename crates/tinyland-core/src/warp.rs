use crate::{sample_bilinear_rgb, Homography};
use image::RgbImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Failures of the perspective resampler.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("invalid output size {width}x{height}")]
    InvalidOutputSize { width: u32, height: u32 },
    #[error("empty source image")]
    EmptySource,
    #[error("homography is not invertible")]
    NonInvertible,
}

/// Resample `src` into an `out_w × out_h` image through `h_dst_from_src`.
///
/// Each output pixel is mapped back through the inverse and sampled
/// bilinearly. Pixels that land outside the source stay black.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, h_dst_from_src))
)]
pub fn warp_perspective(
    src: &RgbImage,
    h_dst_from_src: &Homography,
    out_w: u32,
    out_h: u32,
) -> Result<RgbImage, WarpError> {
    if out_w == 0 || out_h == 0 {
        return Err(WarpError::InvalidOutputSize {
            width: out_w,
            height: out_h,
        });
    }
    if src.width() == 0 || src.height() == 0 {
        return Err(WarpError::EmptySource);
    }
    let h_src_from_dst = h_dst_from_src
        .inverse()
        .map_err(|_| WarpError::NonInvertible)?;

    let (w, h) = (src.width() as f64, src.height() as f64);
    let mut out = RgbImage::new(out_w, out_h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let Some((sx, sy)) = h_src_from_dst.project(x as f64, y as f64) else {
            continue;
        };
        if sx <= -1.0 || sy <= -1.0 || sx >= w || sy >= h {
            continue;
        }
        *px = sample_bilinear_rgb(src, sx, sy);
    }
    Ok(out)
}
