use crate::types::Landmark;

/// Distance between thumb tip and index fingertip in normalized image space.
/// Depth is ignored; the detector's z is too noisy to separate a pinch from a near miss.
pub fn pinch_distance(thumb: Landmark, index: Landmark) -> f32 {
    let dx = thumb.x - index.x;
    let dy = thumb.y - index.y;
    (dx * dx + dy * dy).sqrt()
}

pub fn is_pinched(thumb: Landmark, index: Landmark, threshold: f32) -> bool {
    pinch_distance(thumb, index) < threshold
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

impl ButtonState {
    pub fn is_pressed(&self) -> bool {
        matches!(self, ButtonState::Pressed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureAction {
    Press,
    Release,
}

/// Edge detector over the instantaneous pinch signal.
///
/// `None` means the frame carried no hand. It is treated as "no new information" and never
/// moves the machine, so a hand briefly lost mid-pinch does not re-trigger a press.
#[derive(Clone, Debug, Default)]
pub struct GestureStateMachine {
    state: ButtonState,
}

impl GestureStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn update(&mut self, pinched: Option<bool>) -> Option<GestureAction> {
        let pinched = pinched?;
        match (self.state, pinched) {
            (ButtonState::Released, true) => {
                self.state = ButtonState::Pressed;
                Some(GestureAction::Press)
            }
            (ButtonState::Pressed, false) => {
                self.state = ButtonState::Released;
                Some(GestureAction::Release)
            }
            _ => None,
        }
    }

    /// Drops back to `Released`, returning `Release` if the button was held.
    pub fn reset(&mut self) -> Option<GestureAction> {
        let was_pressed = self.state.is_pressed();
        self.state = ButtonState::Released;
        was_pressed.then_some(GestureAction::Release)
    }
}
