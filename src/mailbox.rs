use std::sync::{Mutex, MutexGuard};

use crate::types::TrackingResult;

/// Single-slot, last-write-wins handoff from the detector callback to the control loop.
///
/// Nothing queues: a result not read before the next one lands is simply lost. Both sides
/// hold the lock only long enough to copy one `TrackingResult`.
#[derive(Debug, Default)]
pub struct ResultMailbox {
    slot: Mutex<Option<TrackingResult>>,
}

impl ResultMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: TrackingResult) {
        *self.lock() = Some(result);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Most recent result without consuming it.
    pub fn latest(&self) -> Option<TrackingResult> {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TrackingResult>> {
        // A panicking writer cannot leave a half-written Copy value behind.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn result(x: i32, ts: u64) -> TrackingResult {
        TrackingResult {
            cursor_x: x,
            cursor_y: x * 2,
            pressed: x % 2 == 0,
            source_timestamp_ms: ts,
        }
    }

    #[test]
    fn empty_until_published() {
        let mailbox = ResultMailbox::new();
        assert_eq!(mailbox.latest(), None);

        mailbox.publish(result(1, 10));
        assert_eq!(mailbox.latest(), Some(result(1, 10)));
        assert_eq!(mailbox.latest(), Some(result(1, 10)));
    }

    #[test]
    fn last_write_wins_and_clear_empties() {
        let mailbox = ResultMailbox::new();
        mailbox.publish(result(1, 10));
        mailbox.publish(result(2, 20));
        assert_eq!(mailbox.latest(), Some(result(2, 20)));

        mailbox.clear();
        assert_eq!(mailbox.latest(), None);
    }

    #[test]
    fn concurrent_writer_never_tears_the_triple() {
        let mailbox = Arc::new(ResultMailbox::new());
        let writer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    mailbox.publish(result(i, i as u64));
                }
            })
        };

        for _ in 0..10_000 {
            if let Some(r) = mailbox.latest() {
                assert_eq!(r.cursor_y, r.cursor_x * 2);
                assert_eq!(r.pressed, r.cursor_x % 2 == 0);
                assert_eq!(r.source_timestamp_ms, r.cursor_x as u64);
            }
        }

        writer.join().unwrap();
        assert_eq!(mailbox.latest(), Some(result(9_999, 9_999)));
    }
}
