use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgb, yuyv422_to_rgb,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[derive(Debug)]
pub struct RgbFrame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes whatever the camera delivered into packed RGB, the layout the detector reads.
pub fn convert_camera_frame(frame: &Buffer) -> Result<RgbFrame> {
    let resolution = frame.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = frame.buffer();

    let rgb = match frame.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgb(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgb(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgb(data, width, height)?,
        FrameFormat::RAWRGB => packed_rgb(data, width, height)?,
        FrameFormat::RAWBGR => bgr_to_rgb(data, width, height)?,
        FrameFormat::GRAY => gray_to_rgb(data, width, height)?,
    };

    Ok(RgbFrame { rgb, width, height })
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn ensure_len(kind: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(anyhow!(
            "{kind} buffer too small: got {}, expected {expected}",
            data.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = pixel_count(width, height);
    let uv_plane_len = y_plane_len / 2;
    ensure_len("NV12", data, y_plane_len + uv_plane_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgb = vec![0u8; y_plane_len * 3];
    yuv_nv12_to_rgb(
        &image,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGB failed: {err:?}"))?;

    Ok(rgb)
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    ensure_len("YUYV", data, pixel_count(width, height) * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgb = vec![0u8; pixel_count(width, height) * 3];
    yuyv422_to_rgb(
        &packed,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGB failed: {err:?}"))?;

    Ok(rgb)
}

fn mjpeg_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgb = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    // Some drivers report a resolution that differs from the encoded stream.
    if let Some(info) = decoder.info() {
        if (info.width as u32, info.height as u32) != (width, height) {
            return Err(anyhow!(
                "MJPEG frame is {}x{}, camera reported {width}x{height}",
                info.width,
                info.height
            ));
        }
    }
    ensure_len("MJPEG", &rgb, pixel_count(width, height) * 3)?;

    Ok(rgb)
}

fn packed_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = pixel_count(width, height) * 3;
    ensure_len("RGB", data, expected)?;
    Ok(data[..expected].to_vec())
}

fn bgr_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = pixel_count(width, height) * 3;
    ensure_len("BGR", data, expected)?;

    let mut rgb = data[..expected].to_vec();
    rgb.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
    Ok(rgb)
}

fn gray_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = pixel_count(width, height);
    ensure_len("GRAY", data, expected)?;

    let mut rgb = vec![0u8; expected * 3];
    rgb.par_chunks_exact_mut(3)
        .zip(data[..expected].par_iter().copied())
        .for_each(|(dst, value)| dst.fill(value));
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_channels_are_swapped() {
        let bgr = [1, 2, 3, 4, 5, 6];
        assert_eq!(bgr_to_rgb(&bgr, 2, 1).unwrap(), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn gray_is_replicated() {
        assert_eq!(gray_to_rgb(&[7, 9], 2, 1).unwrap(), vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(packed_rgb(&[0; 5], 2, 1).is_err());
        assert!(yuyv_to_rgb(&[0; 3], 2, 1).is_err());
        assert!(nv12_to_rgb(&[0; 4], 2, 2).is_err());
    }
}
