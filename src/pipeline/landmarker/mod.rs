mod common;
mod ort;

use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    control::{DetectorError, LandmarkStream},
    types::{DetectionEvent, Frame, Landmark},
};

pub type ResultCallback = Box<dyn FnMut(DetectionEvent) + Send>;

pub(crate) trait HandposeEngine: Send + 'static {
    /// Landmarks normalized to the frame, or `None` when no hand is visible.
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Option<Vec<Landmark>>>;
}

struct Submission {
    frame: Frame,
    timestamp_ms: u64,
}

/// Live-stream hand landmarker: frames go in through [`LandmarkStream::submit`], results
/// come out through the callback on the worker thread.
///
/// The worker holds at most one pending frame. Frames submitted while it is busy are
/// dropped and never produce a callback.
pub struct HandLandmarker {
    frame_tx: Option<Sender<Submission>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HandLandmarker {
    /// Starts the ORT hand-pose worker. The model is fetched on first use.
    pub fn new(
        model_path: PathBuf,
        max_hands: usize,
        on_result: ResultCallback,
    ) -> Result<Self, DetectorError> {
        if max_hands != 1 {
            return Err(DetectorError::UnsupportedHandCount(max_hands));
        }
        Ok(Self::spawn(
            move || ort::OrtEngine::load(&model_path),
            on_result,
        ))
    }

    fn spawn<E, F>(load_engine: F, on_result: ResultCallback) -> Self
    where
        E: HandposeEngine,
        F: FnOnce() -> anyhow::Result<E> + Send + 'static,
    {
        let (frame_tx, frame_rx) = bounded(1);
        let handle = thread::spawn(move || {
            let engine = match load_engine() {
                Ok(engine) => engine,
                Err(err) => {
                    log::error!("failed to start hand landmarker: {err:?}");
                    return;
                }
            };
            run_worker_loop(engine, frame_rx, on_result);
        });

        Self {
            frame_tx: Some(frame_tx),
            handle: Some(handle),
        }
    }
}

impl LandmarkStream for HandLandmarker {
    fn submit(&mut self, frame: Frame, timestamp_ms: u64) -> Result<(), DetectorError> {
        let Some(frame_tx) = self.frame_tx.as_ref() else {
            return Err(DetectorError::WorkerStopped);
        };
        match frame_tx.try_send(Submission {
            frame,
            timestamp_ms,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::trace!("landmarker busy, dropping frame {timestamp_ms}ms");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(DetectorError::WorkerStopped),
        }
    }
}

impl Drop for HandLandmarker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.frame_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    frame_rx: Receiver<Submission>,
    mut on_result: ResultCallback,
) {
    while let Some(submission) = recv_latest(&frame_rx) {
        let landmarks = match engine.infer(&submission.frame) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                log::warn!(
                    "handpose inference failed for frame {}ms: {err:?}",
                    submission.timestamp_ms
                );
                None
            }
        };

        on_result(DetectionEvent {
            landmarks,
            source_timestamp_ms: submission.timestamp_ms,
        });
    }
}

fn recv_latest(frame_rx: &Receiver<Submission>) -> Option<Submission> {
    let mut submission = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        submission = newer;
    }
    Some(submission)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use anyhow::anyhow;
    use crossbeam_channel::unbounded;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    /// Answers "hand" for bright frames, "no hand" for dark ones, and fails on empty ones.
    struct BrightnessEngine;

    impl HandposeEngine for BrightnessEngine {
        fn infer(&mut self, frame: &Frame) -> anyhow::Result<Option<Vec<Landmark>>> {
            match frame.rgb.first() {
                None => Err(anyhow!("empty frame")),
                Some(&v) if v > 127 => Ok(Some(vec![Landmark::new(0.5, 0.5, 0.0); 21])),
                Some(_) => Ok(None),
            }
        }
    }

    fn frame(value: Option<u8>) -> Frame {
        Frame {
            rgb: value.map(|v| vec![v; 3]).unwrap_or_default(),
            width: 1,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    fn landmarker() -> (HandLandmarker, Receiver<DetectionEvent>) {
        let (event_tx, event_rx) = unbounded();
        let landmarker = HandLandmarker::spawn(
            || Ok(BrightnessEngine),
            Box::new(move |event| {
                let _ = event_tx.send(event);
            }),
        );
        (landmarker, event_rx)
    }

    #[test]
    fn results_arrive_through_callback() {
        let (mut landmarker, events) = landmarker();

        landmarker.submit(frame(Some(255)), 7).unwrap();
        let event = events.recv_timeout(WAIT).unwrap();
        assert_eq!(event.source_timestamp_ms, 7);
        assert_eq!(event.landmarks.map(|l| l.len()), Some(21));

        landmarker.submit(frame(Some(0)), 8).unwrap();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), DetectionEvent::no_hand(8));
    }

    #[test]
    fn inference_failure_reports_no_hand() {
        let (mut landmarker, events) = landmarker();
        landmarker.submit(frame(None), 3).unwrap();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), DetectionEvent::no_hand(3));
    }

    #[test]
    fn failed_engine_load_surfaces_as_stopped_worker() {
        let mut landmarker = HandLandmarker::spawn::<BrightnessEngine, _>(
            || Err(anyhow!("model missing")),
            Box::new(|_| {}),
        );
        if let Some(handle) = landmarker.handle.take() {
            handle.join().unwrap();
        }
        assert!(matches!(
            landmarker.submit(frame(Some(255)), 1),
            Err(DetectorError::WorkerStopped)
        ));
    }

    #[test]
    fn only_one_hand_is_supported() {
        let result = HandLandmarker::new(PathBuf::from("unused.onnx"), 2, Box::new(|_| {}));
        assert!(matches!(
            result,
            Err(DetectorError::UnsupportedHandCount(2))
        ));
    }
}
