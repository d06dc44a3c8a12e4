use std::{sync::Arc, time::Instant};

use thiserror::Error;

use crate::{
    gesture::{GestureAction, GestureStateMachine},
    mailbox::ResultMailbox,
    types::Frame,
};

pub trait FrameSource {
    /// Next frame if one is ready; never blocks.
    fn try_frame(&mut self) -> Option<Frame>;
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("landmark detector supports exactly one hand, {0} requested")]
    UnsupportedHandCount(usize),
    #[error("landmark worker has stopped")]
    WorkerStopped,
}

/// Asynchronous hand-landmark detection.
///
/// `submit` hands a frame over and returns immediately. The result, if any, arrives later
/// through the callback the implementation was built with, possibly on another thread and
/// possibly out of order. Frames may be dropped under load.
pub trait LandmarkStream {
    fn submit(&mut self, frame: Frame, timestamp_ms: u64) -> Result<(), DetectorError>;
}

/// OS pointer. Failures are the sink's business; callers never hear about them.
pub trait PointerSink {
    fn move_cursor(&mut self, x: i32, y: i32);
    fn grab(&mut self);
    fn release(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Loop is stopped.
    Idle,
    NoFrame,
    /// Frame submitted, but no hand is currently tracked.
    Submitted,
    /// Detector refused the frame; handled like a frame without a hand.
    Faulted,
    /// Pointer commands were sent.
    Dispatched,
}

pub struct ControlLoop {
    frames: Box<dyn FrameSource>,
    detector: Box<dyn LandmarkStream>,
    pointer: Box<dyn PointerSink>,
    mailbox: Arc<ResultMailbox>,
    gesture: GestureStateMachine,
    state: LoopState,
    epoch: Instant,
    detector_failing: bool,
}

impl ControlLoop {
    pub fn new(
        frames: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkStream>,
        pointer: Box<dyn PointerSink>,
        mailbox: Arc<ResultMailbox>,
    ) -> Self {
        Self {
            frames,
            detector,
            pointer,
            mailbox,
            gesture: GestureStateMachine::new(),
            state: LoopState::Stopped,
            epoch: Instant::now(),
            detector_failing: false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_pressed(&self) -> bool {
        self.gesture.state().is_pressed()
    }

    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            return;
        }
        // Whatever landed while stopped belongs to the previous session.
        self.mailbox.clear();
        self.state = LoopState::Running;
        log::info!("tracking started");
    }

    /// Stops dispatching. A held button is released first so the pointer is never left
    /// dragging; after this returns no further pointer calls are made until `start`.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        if let Some(GestureAction::Release) = self.gesture.reset() {
            log::debug!("releasing held button on stop");
            self.pointer.release();
        }
        self.state = LoopState::Stopped;
        log::info!("tracking stopped");
    }

    pub fn tick(&mut self) -> CycleOutcome {
        if self.state == LoopState::Stopped {
            return CycleOutcome::Idle;
        }

        let Some(frame) = self.frames.try_frame() else {
            return CycleOutcome::NoFrame;
        };

        let timestamp_ms = frame
            .timestamp
            .saturating_duration_since(self.epoch)
            .as_millis() as u64;
        match self.detector.submit(frame, timestamp_ms) {
            Ok(()) if self.detector_failing => {
                log::info!("landmark detector accepting frames again");
                self.detector_failing = false;
            }
            Ok(()) => {}
            Err(err) => {
                if self.detector_failing {
                    log::debug!("frame {timestamp_ms}ms not submitted: {err}");
                } else {
                    log::warn!("frame {timestamp_ms}ms not submitted: {err}");
                    self.detector_failing = true;
                }
                // Handled like a frame without a hand.
                self.mailbox.clear();
                return CycleOutcome::Faulted;
            }
        }

        let Some(result) = self.mailbox.latest() else {
            return CycleOutcome::Submitted;
        };

        self.pointer.move_cursor(result.cursor_x, result.cursor_y);
        match self.gesture.update(Some(result.pressed)) {
            Some(GestureAction::Press) => {
                log::debug!("pinch at ({}, {})", result.cursor_x, result.cursor_y);
                self.pointer.grab();
            }
            Some(GestureAction::Release) => {
                log::debug!("pinch released at ({}, {})", result.cursor_x, result.cursor_y);
                self.pointer.release();
            }
            None => {}
        }

        CycleOutcome::Dispatched
    }
}
