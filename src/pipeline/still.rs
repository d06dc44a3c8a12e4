use std::{path::Path, time::Instant};

use anyhow::{Context, Result};

use crate::{control::FrameSource, types::Frame};

/// Serves the same picture on every poll. Handy for checking the model and the mapping
/// without a camera attached.
pub struct StillImage {
    frame: Frame,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        log::info!("serving {}x{} still image {}", width, height, path.display());

        Ok(Self::from_rgb(image.into_raw(), width, height))
    }

    pub fn from_rgb(rgb: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            frame: Frame {
                rgb,
                width,
                height,
                timestamp: Instant::now(),
            },
        }
    }
}

impl FrameSource for StillImage {
    fn try_frame(&mut self) -> Option<Frame> {
        let mut frame = self.frame.clone();
        frame.timestamp = Instant::now();
        Some(frame)
    }
}
