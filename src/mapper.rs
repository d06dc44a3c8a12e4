use crate::{
    params::TrackingParameters,
    types::{Landmark, ScreenSize},
};

/// Running state of the exponential moving average, per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothingState {
    pub smoothed_x: Option<f64>,
    pub smoothed_y: Option<f64>,
}

impl SmoothingState {
    /// Folds one raw screen-space sample into the average and returns the new value.
    /// The first sample initializes the filter as-is.
    pub fn update(&mut self, raw_x: f64, raw_y: f64, alpha: f64) -> (f64, f64) {
        let x = ema(self.smoothed_x, raw_x, alpha);
        let y = ema(self.smoothed_y, raw_y, alpha);
        self.smoothed_x = Some(x);
        self.smoothed_y = Some(y);
        (x, y)
    }

    pub fn is_initialized(&self) -> bool {
        self.smoothed_x.is_some() && self.smoothed_y.is_some()
    }
}

fn ema(previous: Option<f64>, raw: f64, alpha: f64) -> f64 {
    match previous {
        Some(prev) => alpha * raw + (1.0 - alpha) * prev,
        None => raw,
    }
}

/// Turns the thumb/index fingertip pair into a smoothed pixel position.
///
/// The cursor follows the midpoint of both fingertips, mirrored horizontally because the
/// camera faces the user. `sensitivity` scales the midpoint's offset from the frame center
/// before mapping, so at 2.0 the central half of the camera view spans the whole screen.
/// 1.0 maps the full frame onto the full screen.
///
/// Frames without a hand must not reach [`CoordinateMapper::map`]: the filter keeps its last
/// value and the caller reports "no current result" instead of replaying a stale position.
#[derive(Clone, Debug)]
pub struct CoordinateMapper {
    screen: ScreenSize,
    state: SmoothingState,
}

impl CoordinateMapper {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen,
            state: SmoothingState::default(),
        }
    }

    pub fn state(&self) -> SmoothingState {
        self.state
    }

    /// Unsmoothed screen position for the fingertip pair.
    pub fn raw_screen_point(
        &self,
        thumb: Landmark,
        index: Landmark,
        sensitivity: f32,
    ) -> (f64, f64) {
        let x_norm = (thumb.x as f64 + index.x as f64) / 2.0;
        let y_norm = (thumb.y as f64 + index.y as f64) / 2.0;

        let x = scale_from_center(x_norm, sensitivity as f64);
        let y = scale_from_center(y_norm, sensitivity as f64);

        (
            (1.0 - x) * self.screen.width as f64,
            y * self.screen.height as f64,
        )
    }

    pub fn map(
        &mut self,
        thumb: Landmark,
        index: Landmark,
        params: &TrackingParameters,
    ) -> (i32, i32) {
        let (raw_x, raw_y) = self.raw_screen_point(thumb, index, params.sensitivity);
        let (x, y) = self
            .state
            .update(raw_x, raw_y, params.smoothing_factor as f64);
        (x.round() as i32, y.round() as i32)
    }
}

fn scale_from_center(value: f64, sensitivity: f64) -> f64 {
    (0.5 + (value - 0.5) * sensitivity).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn params(alpha: f32) -> TrackingParameters {
        TrackingParameters {
            smoothing_factor: alpha,
            ..TrackingParameters::default()
        }
    }

    #[test]
    fn centered_pinch_maps_to_screen_center() {
        let mut mapper = CoordinateMapper::new(ScreenSize {
            width: 1920,
            height: 1080,
        });
        let tip = Landmark::new(0.5, 0.5, 0.0);

        assert_eq!(mapper.map(tip, tip, &params(1.0)), (960, 540));
    }

    #[test]
    fn horizontal_axis_is_mirrored() {
        let mapper = CoordinateMapper::new(ScreenSize {
            width: 1000,
            height: 500,
        });
        let (x, y) = mapper.raw_screen_point(
            Landmark::new(0.1, 0.2, 0.0),
            Landmark::new(0.3, 0.4, 0.0),
            1.0,
        );

        assert!((x - 800.0).abs() < 1e-4, "x = {x}");
        assert!((y - 150.0).abs() < 1e-4, "y = {y}");
    }

    #[test]
    fn smoothing_follows_documented_sequence() {
        let mut state = SmoothingState::default();
        let smoothed: Vec<f64> = [100.0, 200.0, 300.0]
            .into_iter()
            .map(|raw| state.update(raw, 0.0, 0.5).0)
            .collect();

        assert_eq!(smoothed, vec![100.0, 150.0, 225.0]);
    }

    #[test]
    fn smoothing_matches_recurrence() {
        let alpha = 0.3;
        let raws = [12.0, 480.5, 33.3, 1900.0, 0.0, 777.7];
        let mut state = SmoothingState::default();
        let mut expected: Option<f64> = None;

        for raw in raws {
            let (x, y) = state.update(raw, raw * 0.5, alpha);
            let want = match expected {
                None => raw,
                Some(prev) => alpha * raw + (1.0 - alpha) * prev,
            };
            assert!((x - want).abs() < EPS);
            assert!((y - want * 0.5).abs() < EPS);
            expected = Some(want);
        }
    }

    #[test]
    fn mapper_rounds_smoothed_position() {
        let mut mapper = CoordinateMapper::new(ScreenSize {
            width: 1000,
            height: 1000,
        });
        let at = |x: f32| Landmark::new(x, 0.5, 0.0);

        assert_eq!(mapper.map(at(0.9), at(0.9), &params(0.5)).0, 100);
        assert_eq!(mapper.map(at(0.8), at(0.8), &params(0.5)).0, 150);
        assert_eq!(mapper.map(at(0.7), at(0.7), &params(0.5)).0, 225);
        assert!(mapper.state().is_initialized());
    }

    #[test]
    fn sensitivity_scales_offset_from_center_and_clamps() {
        let mapper = CoordinateMapper::new(ScreenSize {
            width: 1000,
            height: 1000,
        });
        let tip = Landmark::new(0.6, 0.25, 0.0);

        let (x, y) = mapper.raw_screen_point(tip, tip, 2.0);
        assert!((x - 300.0).abs() < 1e-4, "x = {x}");
        assert!((y - 0.0).abs() < 1e-4, "y = {y}");

        let (x, _) = mapper.raw_screen_point(Landmark::new(0.95, 0.5, 0.0), tip, 4.0);
        assert!((x - 0.0).abs() < 1e-9);
    }
}
