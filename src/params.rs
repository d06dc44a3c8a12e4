use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.3;
pub const DEFAULT_PINCH_THRESHOLD: f32 = 0.10;
pub const DEFAULT_SENSITIVITY: f32 = 1.0;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ParameterError {
    #[error("smoothing factor must be in (0, 1], got {0}")]
    SmoothingFactor(f32),
    #[error("pinch threshold must be a positive number, got {0}")]
    PinchThreshold(f32),
    #[error("sensitivity must be a positive number, got {0}")]
    Sensitivity(f32),
}

/// Tuning knobs read by the mapper and the pinch detector on every detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingParameters {
    pub smoothing_factor: f32,
    pub pinch_threshold: f32,
    pub sensitivity: f32,
}

impl Default for TrackingParameters {
    fn default() -> Self {
        Self {
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            pinch_threshold: DEFAULT_PINCH_THRESHOLD,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl TrackingParameters {
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_smoothing_factor(self.smoothing_factor)?;
        check_pinch_threshold(self.pinch_threshold)?;
        check_sensitivity(self.sensitivity)?;
        Ok(())
    }
}

fn check_smoothing_factor(value: f32) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ParameterError::SmoothingFactor(value))
    }
}

fn check_pinch_threshold(value: f32) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::PinchThreshold(value))
    }
}

fn check_sensitivity(value: f32) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::Sensitivity(value))
    }
}

/// Parameters shared between whoever tunes them and the detector callback.
///
/// Each value is swapped atomically on its own, so a reader sees either the old or the new
/// value of a parameter, never a torn one. Updates apply to the next detection processed.
#[derive(Debug)]
pub struct SharedParameters {
    smoothing_factor: AtomicU32,
    pinch_threshold: AtomicU32,
    sensitivity: AtomicU32,
}

impl SharedParameters {
    pub fn new(initial: TrackingParameters) -> Result<Self, ParameterError> {
        initial.validate()?;
        Ok(Self {
            smoothing_factor: AtomicU32::new(initial.smoothing_factor.to_bits()),
            pinch_threshold: AtomicU32::new(initial.pinch_threshold.to_bits()),
            sensitivity: AtomicU32::new(initial.sensitivity.to_bits()),
        })
    }

    pub fn snapshot(&self) -> TrackingParameters {
        TrackingParameters {
            smoothing_factor: load(&self.smoothing_factor),
            pinch_threshold: load(&self.pinch_threshold),
            sensitivity: load(&self.sensitivity),
        }
    }

    pub fn set_smoothing_factor(&self, value: f32) -> Result<(), ParameterError> {
        check_smoothing_factor(value)?;
        store(&self.smoothing_factor, value);
        log::debug!("smoothing factor set to {value}");
        Ok(())
    }

    pub fn set_pinch_threshold(&self, value: f32) -> Result<(), ParameterError> {
        check_pinch_threshold(value)?;
        store(&self.pinch_threshold, value);
        log::debug!("pinch threshold set to {value}");
        Ok(())
    }

    pub fn set_sensitivity(&self, value: f32) -> Result<(), ParameterError> {
        check_sensitivity(value)?;
        store(&self.sensitivity, value);
        log::debug!("sensitivity set to {value}");
        Ok(())
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        let initial = TrackingParameters::default();
        Self {
            smoothing_factor: AtomicU32::new(initial.smoothing_factor.to_bits()),
            pinch_threshold: AtomicU32::new(initial.pinch_threshold.to_bits()),
            sensitivity: AtomicU32::new(initial.sensitivity.to_bits()),
        }
    }
}

fn load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Acquire))
}

fn store(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrackingParameters::default().validate().is_ok());
        let shared = SharedParameters::default();
        assert_eq!(shared.snapshot(), TrackingParameters::default());
    }

    #[test]
    fn setters_reject_out_of_range_values() {
        let shared = SharedParameters::default();

        assert_eq!(
            shared.set_smoothing_factor(0.0),
            Err(ParameterError::SmoothingFactor(0.0))
        );
        assert!(shared.set_smoothing_factor(1.5).is_err());
        assert!(shared.set_smoothing_factor(f32::NAN).is_err());
        assert!(shared.set_pinch_threshold(-0.1).is_err());
        assert!(shared.set_pinch_threshold(f32::INFINITY).is_err());
        assert!(shared.set_sensitivity(0.0).is_err());

        assert_eq!(shared.snapshot(), TrackingParameters::default());
    }

    #[test]
    fn setters_update_snapshot() {
        let shared = SharedParameters::default();
        shared.set_smoothing_factor(1.0).unwrap();
        shared.set_pinch_threshold(0.02).unwrap();
        shared.set_sensitivity(2.5).unwrap();

        let params = shared.snapshot();
        assert_eq!(params.smoothing_factor, 1.0);
        assert_eq!(params.pinch_threshold, 0.02);
        assert_eq!(params.sensitivity, 2.5);
    }

    #[test]
    fn new_rejects_invalid_initial_values() {
        let params = TrackingParameters {
            smoothing_factor: 0.5,
            pinch_threshold: 0.0,
            sensitivity: 1.0,
        };
        assert_eq!(
            SharedParameters::new(params).err(),
            Some(ParameterError::PinchThreshold(0.0))
        );
    }
}
