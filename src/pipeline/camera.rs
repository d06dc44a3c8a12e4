use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::rgb_converter;
use crate::{control::FrameSource, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Capture thread handle. Dropping it stops and joins the thread.
#[derive(Debug)]
struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_capture(index: CameraIndex, frame_tx: Sender<Frame>) -> Result<CaptureThread> {
    // Fail fast before spawning the capture thread.
    build_camera(index.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        log::info!(
            "camera streaming {} at {} fps",
            camera.resolution(),
            camera.frame_rate()
        );

        while !stop_flag.load(Ordering::Relaxed) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let converted = match rgb_converter::convert_camera_frame(&buffer) {
                Ok(rgb) => rgb,
                Err(err) => {
                    log::warn!("failed to decode camera frame {err:?}");
                    continue;
                }
            };

            let frame = Frame {
                rgb: converted.rgb,
                width: converted.width,
                height: converted.height,
                timestamp: Instant::now(),
            };

            // The loop polls at its own pace; a full slot means it hasn't caught up yet.
            if let Err(err) = frame_tx.try_send(frame) {
                if err.is_disconnected() {
                    break;
                }
            }
        }

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    });

    Ok(CaptureThread {
        stop,
        handle: Some(handle),
    })
}

/// Live camera as a polled frame source.
pub struct CameraFrames {
    frame_rx: Receiver<Frame>,
    capture_exited: bool,
    _capture: CaptureThread,
}

impl CameraFrames {
    pub fn open(camera_index: u32) -> Result<Self> {
        let (frame_tx, frame_rx) = bounded(1);
        let capture = spawn_capture(CameraIndex::Index(camera_index), frame_tx)?;
        log::info!("camera {camera_index} opened");
        Ok(Self {
            frame_rx,
            capture_exited: false,
            _capture: capture,
        })
    }
}

impl FrameSource for CameraFrames {
    fn try_frame(&mut self) -> Option<Frame> {
        let mut frame = match self.frame_rx.try_recv() {
            Ok(frame) => frame,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                if !self.capture_exited {
                    log::warn!("camera capture thread has exited");
                    self.capture_exited = true;
                }
                return None;
            }
        };
        while let Ok(newer) = self.frame_rx.try_recv() {
            frame = newer;
        }
        Some(frame)
    }
}
