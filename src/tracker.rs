use std::sync::Arc;

use crate::{
    gesture,
    mailbox::ResultMailbox,
    mapper::CoordinateMapper,
    params::SharedParameters,
    types::{DetectionEvent, ScreenSize, TrackingResult},
};

/// Detector-side half of the pipeline, run from the landmark callback.
///
/// Each hand detection is mapped to a cursor position, checked for a pinch and published to
/// the mailbox. A detection without a hand clears the mailbox and leaves the smoothing filter
/// untouched, so the control loop goes quiet instead of replaying the last position.
/// Events older than one already processed are dropped.
pub struct HandTracker {
    mapper: CoordinateMapper,
    params: Arc<SharedParameters>,
    mailbox: Arc<ResultMailbox>,
    last_timestamp_ms: Option<u64>,
}

impl HandTracker {
    pub fn new(
        screen: ScreenSize,
        params: Arc<SharedParameters>,
        mailbox: Arc<ResultMailbox>,
    ) -> Self {
        Self {
            mapper: CoordinateMapper::new(screen),
            params,
            mailbox,
            last_timestamp_ms: None,
        }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn on_result(&mut self, event: DetectionEvent) {
        if let Some(last) = self.last_timestamp_ms {
            if event.source_timestamp_ms < last {
                log::debug!(
                    "dropping detection for frame {}ms, already at {}ms",
                    event.source_timestamp_ms,
                    last
                );
                return;
            }
        }
        self.last_timestamp_ms = Some(event.source_timestamp_ms);

        let Some((thumb, index)) = event.pinch_pair() else {
            log::trace!("no hand at {}ms", event.source_timestamp_ms);
            self.mailbox.clear();
            return;
        };

        let params = self.params.snapshot();
        let (cursor_x, cursor_y) = self.mapper.map(thumb, index, &params);
        let pressed = gesture::is_pinched(thumb, index, params.pinch_threshold);

        log::trace!(
            "hand at {}ms -> ({cursor_x}, {cursor_y}) pinched={pressed}",
            event.source_timestamp_ms
        );

        self.mailbox.publish(TrackingResult {
            cursor_x,
            cursor_y,
            pressed,
            source_timestamp_ms: event.source_timestamp_ms,
        });
    }

    /// Wraps the tracker as the boxed callback a landmark stream expects.
    pub fn into_callback(mut self) -> Box<dyn FnMut(DetectionEvent) + Send> {
        Box::new(move |event| self.on_result(event))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Landmark, NUM_LANDMARKS};

    pub(crate) fn hand(thumb: (f32, f32), index: (f32, f32), ts: u64) -> DetectionEvent {
        let mut landmarks = vec![Landmark::default(); NUM_LANDMARKS];
        landmarks[crate::types::THUMB_TIP] = Landmark::new(thumb.0, thumb.1, 0.0);
        landmarks[crate::types::INDEX_TIP] = Landmark::new(index.0, index.1, 0.0);
        DetectionEvent {
            landmarks: Some(landmarks),
            source_timestamp_ms: ts,
        }
    }

    fn tracker(alpha: f32) -> (HandTracker, Arc<SharedParameters>, Arc<ResultMailbox>) {
        let params = Arc::new(SharedParameters::default());
        params.set_smoothing_factor(alpha).unwrap();
        let mailbox = Arc::new(ResultMailbox::new());
        let tracker = HandTracker::new(
            ScreenSize {
                width: 1920,
                height: 1080,
            },
            params.clone(),
            mailbox.clone(),
        );
        (tracker, params, mailbox)
    }

    #[test]
    fn hand_publishes_result() {
        let (mut tracker, _, mailbox) = tracker(1.0);
        tracker.on_result(hand((0.5, 0.5), (0.5, 0.5), 5));

        assert_eq!(
            mailbox.latest(),
            Some(TrackingResult {
                cursor_x: 960,
                cursor_y: 540,
                pressed: true,
                source_timestamp_ms: 5,
            })
        );
    }

    #[test]
    fn no_hand_clears_result_and_keeps_filter() {
        let (mut tracker, _, mailbox) = tracker(0.5);
        tracker.on_result(hand((0.25, 0.5), (0.25, 0.5), 1));
        let before = tracker.mapper().state();

        tracker.on_result(DetectionEvent::no_hand(2));
        assert_eq!(mailbox.latest(), None);
        assert_eq!(tracker.mapper().state(), before);
    }

    #[test]
    fn truncated_landmark_set_counts_as_no_hand() {
        let (mut tracker, _, mailbox) = tracker(1.0);
        tracker.on_result(hand((0.5, 0.5), (0.5, 0.5), 1));
        tracker.on_result(DetectionEvent {
            landmarks: Some(vec![Landmark::default(); 5]),
            source_timestamp_ms: 2,
        });
        assert_eq!(mailbox.latest(), None);
        assert!(tracker.mapper().state().is_initialized());
    }

    #[test]
    fn stale_event_is_dropped() {
        let (mut tracker, _, mailbox) = tracker(1.0);
        tracker.on_result(hand((0.5, 0.5), (0.5, 0.5), 20));
        tracker.on_result(hand((0.0, 0.0), (0.0, 0.0), 10));

        assert_eq!(mailbox.latest().map(|r| r.source_timestamp_ms), Some(20));
        assert_eq!(mailbox.latest().map(|r| r.cursor_x), Some(960));

        tracker.on_result(hand((0.0, 0.0), (0.0, 0.0), 20));
        assert_eq!(mailbox.latest().map(|r| r.cursor_x), Some(1920));
    }

    #[test]
    fn threshold_update_applies_to_next_event() {
        let (mut tracker, params, mailbox) = tracker(1.0);
        let (thumb, index) = ((0.50, 0.50), (0.55, 0.50));

        tracker.on_result(hand(thumb, index, 1));
        assert_eq!(mailbox.latest().map(|r| r.pressed), Some(true));

        params.set_pinch_threshold(0.01).unwrap();
        tracker.on_result(hand(thumb, index, 2));
        assert_eq!(mailbox.latest().map(|r| r.pressed), Some(false));
    }
}
