#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod landmarker;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;
pub mod still;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::CameraFrames;
pub use landmarker::HandLandmarker;
pub use still::StillImage;
