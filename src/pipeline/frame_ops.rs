//! Pixel work done on the worker thread: scaling, luminance, low-light boost.

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use rayon::prelude::*;

use crate::types::Frame;

/// Size of the copy luminance is measured on.
pub const LUMA_SAMPLE_SIZE: (u32, u32) = (320, 180);

/// CLAHE-style clip: no histogram bin may exceed this multiple of the mean.
const CLIP_LIMIT: f32 = 2.0;

fn check_len(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }
    Ok(())
}

pub fn resize_rgba(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    check_len(frame)?;
    let (width, height) = (width.max(1), height.max(1));
    if (width, height) == (frame.width, frame.height) {
        return Ok(frame.clone());
    }

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(width, height, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;

    Ok(Frame {
        rgba: dst_image.into_vec(),
        width,
        height,
        index: frame.index,
        timestamp: frame.timestamp,
    })
}

pub fn scale(frame: &Frame, factor: f32) -> Result<Frame> {
    let width = (frame.width as f32 * factor).round() as u32;
    let height = (frame.height as f32 * factor).round() as u32;
    resize_rgba(frame, width, height)
}

fn luma(px: &[u8]) -> u8 {
    // BT.601 integer weights.
    ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8
}

/// Mean BT.601 luma of the whole buffer, 0..=255.
pub fn mean_luma(frame: &Frame) -> f32 {
    let pixels = frame.rgba.len() / 4;
    if pixels == 0 {
        return 0.0;
    }
    let sum: u64 = frame
        .rgba
        .par_chunks_exact(4)
        .map(|px| luma(px) as u64)
        .sum();
    sum as f32 / pixels as f32
}

/// Mean luma of a downsampled copy, the figure the low-light monitor watches.
pub fn sampled_luma(frame: &Frame) -> Result<f32> {
    let (w, h) = LUMA_SAMPLE_SIZE;
    let small = resize_rgba(frame, w.min(frame.width), h.min(frame.height))?;
    Ok(mean_luma(&small))
}

fn histogram(frame: &Frame) -> [u32; 256] {
    frame
        .rgba
        .par_chunks_exact(4)
        .fold(
            || [0u32; 256],
            |mut hist, px| {
                hist[luma(px) as usize] += 1;
                hist
            },
        )
        .reduce(
            || [0u32; 256],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Luma mapping from a clip-limited histogram equalization.
fn equalization_lut(hist: &[u32; 256]) -> [u8; 256] {
    let total: u32 = hist.iter().sum();
    let mut lut = [0u8; 256];
    if total == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let limit = ((total as f32 / 256.0) * CLIP_LIMIT).max(1.0) as u32;
    let mut clipped = [0u32; 256];
    let mut excess = 0u32;
    for (c, &h) in clipped.iter_mut().zip(hist) {
        *c = h.min(limit);
        excess += h - *c;
    }
    let share = excess / 256;
    let mut remainder = excess % 256;
    for c in clipped.iter_mut() {
        *c += share;
        if remainder > 0 {
            *c += 1;
            remainder -= 1;
        }
    }

    let mut cumulative = 0u64;
    for (v, &c) in lut.iter_mut().zip(clipped.iter()) {
        cumulative += c as u64;
        *v = ((cumulative * 255) / total as u64).min(255) as u8;
    }
    lut
}

/// Boosts contrast in dark frames. Colour is preserved by scaling RGB with
/// the luma gain. Does nothing when `enabled` is false.
pub fn enhance_low_light(frame: &mut Frame, enabled: bool) {
    if !enabled || frame.rgba.is_empty() {
        return;
    }
    let lut = equalization_lut(&histogram(frame));

    frame.rgba.par_chunks_exact_mut(4).for_each(|px| {
        let y = luma(px);
        let target = lut[y as usize] as f32;
        let gain = target / (y.max(1) as f32);
        for c in &mut px[..3] {
            *c = (*c as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    });
}

pub fn mirror_horizontal(frame: &mut Frame) {
    let row_len = frame.width as usize * 4;
    if row_len == 0 {
        return;
    }
    frame.rgba.par_chunks_exact_mut(row_len).for_each(|row| {
        let pixels = row.len() / 4;
        for i in 0..pixels / 2 {
            let j = pixels - 1 - i;
            for c in 0..4 {
                row.swap(i * 4 + c, j * 4 + c);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn luma_of_flat_frames() {
        let white = Frame::filled(8, 4, [255, 255, 255, 255], 0, Instant::now());
        assert!((mean_luma(&white) - 255.0).abs() < 1.0);
        let black = Frame::filled(8, 4, [0, 0, 0, 255], 0, Instant::now());
        assert_eq!(mean_luma(&black), 0.0);
    }

    #[test]
    fn resize_keeps_metadata() {
        let frame = Frame::filled(64, 48, [10, 20, 30, 255], 7, Instant::now());
        let small = scale(&frame, 0.75).unwrap();
        assert_eq!((small.width, small.height), (48, 36));
        assert_eq!(small.rgba.len(), 48 * 36 * 4);
        assert_eq!(small.index, 7);
        assert_eq!(&small.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut frame = Frame::filled(4, 4, [0; 4], 0, Instant::now());
        frame.rgba.truncate(10);
        assert!(resize_rgba(&frame, 2, 2).is_err());
    }

    #[test]
    fn dark_gradient_is_brightened() {
        let mut frame = Frame::filled(64, 1, [0, 0, 0, 255], 0, Instant::now());
        for (i, px) in frame.rgba.chunks_exact_mut(4).enumerate() {
            let v = (i / 2) as u8 + 10;
            px[..3].copy_from_slice(&[v, v, v]);
        }
        let before = mean_luma(&frame);
        enhance_low_light(&mut frame, true);
        assert!(mean_luma(&frame) > before + 20.0);

        let mut untouched = Frame::filled(4, 4, [20, 20, 20, 255], 0, Instant::now());
        enhance_low_light(&mut untouched, false);
        assert_eq!(&untouched.rgba[..4], &[20, 20, 20, 255]);
    }

    #[test]
    fn mirror_swaps_columns() {
        let mut frame = Frame::filled(3, 1, [0; 4], 0, Instant::now());
        frame.rgba[..4].copy_from_slice(&[1, 2, 3, 4]);
        mirror_horizontal(&mut frame);
        assert_eq!(&frame.rgba[8..12], &[1, 2, 3, 4]);
        assert_eq!(&frame.rgba[..4], &[0; 4]);
    }
}
