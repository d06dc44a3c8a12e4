use std::time::Instant;

/// Number of keypoints the hand-pose model produces for one hand.
pub const NUM_LANDMARKS: usize = 21;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

/// Packed 8-bit RGB image, row-major, no padding.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture instant; detection timestamps are derived from it.
    pub timestamp: Instant,
}

impl Frame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(3)
    }
}

/// Position of one hand keypoint, x and y normalized to the frame, z relative depth.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectionEvent {
    /// `None` when the detector found no hand in the frame.
    pub landmarks: Option<Vec<Landmark>>,
    pub source_timestamp_ms: u64,
}

impl DetectionEvent {
    pub fn no_hand(source_timestamp_ms: u64) -> Self {
        Self {
            landmarks: None,
            source_timestamp_ms,
        }
    }

    /// Thumb tip and index fingertip, if the landmark set is complete enough to hold both.
    pub fn pinch_pair(&self) -> Option<(Landmark, Landmark)> {
        let landmarks = self.landmarks.as_ref()?;
        let thumb = landmarks.get(THUMB_TIP)?;
        let index = landmarks.get(INDEX_TIP)?;
        Some((*thumb, *index))
    }
}

/// Output of the tracking side for one detection with a hand present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackingResult {
    pub cursor_x: i32,
    pub cursor_y: i32,
    pub pressed: bool,
    pub source_timestamp_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const FALLBACK: ScreenSize = ScreenSize {
        width: 1920,
        height: 1080,
    };
}
