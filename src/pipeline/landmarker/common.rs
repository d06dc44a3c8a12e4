use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmark, NUM_LANDMARKS};

pub const INPUT_SIZE: u32 = 224;
/// Hand presence score below which a detection is reported as "no hand".
pub const MIN_CONFIDENCE: f32 = 0.2;

#[derive(Clone, Debug, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Scales the frame to fit a square model input, pads the rest with black and
/// converts to `[1, size, size, 3]` floats in `0..=1`.
pub fn prepare_frame(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = Frame::expected_len(frame.width, frame.height);
    if frame.width == 0 || frame.height == 0 || frame.rgb.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}, expected {}",
            frame.rgb.len(),
            frame.width,
            frame.height,
            expected_len
        ));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let mut canvas = vec![0u8; (target_size as usize) * (target_size as usize) * 3];
    let dst_stride = target_size as usize * 3;
    let src_stride = new_w as usize * 3;
    for (row, src_row) in resized.chunks_exact(src_stride).enumerate() {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 3;
        canvas[dst_offset..dst_offset + src_stride].copy_from_slice(src_row);
    }

    let normalized: Vec<f32> = canvas.par_iter().map(|&v| v as f32 / 255.0).collect();
    let input = Array4::<f32>::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Maps model-input pixel coordinates back onto the source frame, normalized to `0..=1`.
/// Depth is scaled by the frame width, like x.
pub fn normalize_landmarks(landmarks: &[[f32; 3]], letterbox: &LetterboxInfo) -> Vec<Landmark> {
    let w = letterbox.orig_w.max(1) as f32;
    let h = letterbox.orig_h.max(1) as f32;
    landmarks
        .iter()
        .map(|[x, y, z]| {
            let px = (x - letterbox.pad_x) / letterbox.scale;
            let py = (y - letterbox.pad_y) / letterbox.scale;
            Landmark {
                x: (px / w).clamp(0.0, 1.0),
                y: (py / h).clamp(0.0, 1.0),
                z: z / letterbox.scale / w,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            rgb: vec![255; Frame::expected_len(width, height)],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn wide_frame_is_padded_vertically() {
        let (input, letterbox) = prepare_frame(&frame(448, 224), INPUT_SIZE).unwrap();

        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        assert_eq!(letterbox.scale, 0.5);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 56.0));
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert!((input[[0, 112, 112, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut bad = frame(4, 4);
        bad.rgb.pop();
        assert!(prepare_frame(&bad, INPUT_SIZE).is_err());
    }

    #[test]
    fn short_landmark_tensor_is_rejected() {
        assert!(decode_landmarks(&[0.0; NUM_LANDMARKS * 3 - 1]).is_err());
        assert_eq!(
            decode_landmarks(&[1.0; NUM_LANDMARKS * 3 + 5]).unwrap().len(),
            NUM_LANDMARKS
        );
    }

    #[test]
    fn landmarks_are_normalized_to_the_source_frame() {
        let letterbox = LetterboxInfo {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 56.0,
            orig_w: 448,
            orig_h: 224,
        };
        let points = normalize_landmarks(&[[112.0, 112.0, 10.0], [-5.0, 300.0, 0.0]], &letterbox);

        assert!((points[0].x - 0.5).abs() < 1e-6);
        assert!((points[0].y - 0.5).abs() < 1e-6);
        assert!((points[0].z - 20.0 / 448.0).abs() < 1e-6);
        assert_eq!((points[1].x, points[1].y), (0.0, 1.0));
    }
}
