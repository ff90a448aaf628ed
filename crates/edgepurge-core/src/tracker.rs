//! Per-invalidation aggregation of purge outcomes.
//!
//! Each invalidation owns a counter slot behind its own lock. A slot turns
//! terminal exactly when `succeeded + failed == expected`; one failure is
//! enough for FAILED, regardless of the order outcomes arrive in.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::invalidation::{Invalidation, InvalidationState};

/// Outcome counters of one invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub expected: Option<usize>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct Slot {
    counters: Counters,
    state: InvalidationState,
    skipped: bool,
}

impl Slot {
    fn settle(&mut self) -> Option<InvalidationState> {
        if self.state.is_terminal() {
            return None;
        }
        let expected = self.counters.expected?;
        if self.counters.succeeded + self.counters.failed < expected {
            return None;
        }
        self.state = if self.counters.failed > 0 {
            InvalidationState::Failed
        } else {
            InvalidationState::Succeeded
        };
        Some(self.state)
    }
}

/// Tracks outcomes for every invalidation of one batch.
#[derive(Debug)]
pub struct OutcomeTracker {
    slots: Vec<Mutex<Slot>>,
}

impl OutcomeTracker {
    /// Start tracking `len` invalidations, all in PROCESSING.
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len)
                .map(|_| {
                    Mutex::new(Slot {
                        counters: Counters {
                            expected: None,
                            succeeded: 0,
                            failed: 0,
                        },
                        state: InvalidationState::Processing,
                        skipped: false,
                    })
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record how many derived purges `owner` expects.
    ///
    /// Returns the terminal state if this settles the invalidation (zero
    /// expected, or every outcome already arrived).
    pub fn expect(&self, owner: usize, expected: usize) -> Option<InvalidationState> {
        let mut slot = self.slot(owner)?;
        if slot.counters.expected.is_some() {
            warn!(owner, "expected purge count already set; ignoring");
            return None;
        }
        slot.counters.expected = Some(expected);
        slot.settle()
    }

    /// Record one purge outcome for `owner`.
    pub fn record(&self, owner: usize, success: bool) -> Option<InvalidationState> {
        let mut slot = self.slot(owner)?;
        if slot.state.is_terminal() {
            warn!(owner, state = %slot.state, "outcome for settled invalidation ignored");
            return None;
        }
        if success {
            slot.counters.succeeded += 1;
        } else {
            slot.counters.failed += 1;
        }
        slot.settle()
    }

    pub fn state(&self, owner: usize) -> Option<InvalidationState> {
        self.slot(owner).map(|slot| slot.state)
    }

    pub fn counters(&self, owner: usize) -> Option<Counters> {
        self.slot(owner).map(|slot| slot.counters)
    }

    /// Whether `owner` was already settled when the batch began.
    pub fn is_skipped(&self, owner: usize) -> bool {
        self.slot(owner).is_some_and(|slot| slot.skipped)
    }

    /// Mark every invalidation as PROCESSING and return how many were skipped.
    ///
    /// An invalidation that is already SUCCEEDED or FAILED keeps its state;
    /// its slot is closed with nothing expected and it is not purged again.
    pub fn begin(&self, invalidations: &mut [Invalidation]) -> usize {
        let mut skipped = 0;
        for (owner, invalidation) in invalidations.iter_mut().enumerate() {
            let state = invalidation.state();
            if state.is_terminal() {
                if let Some(mut slot) = self.slot(owner) {
                    slot.state = state;
                    slot.skipped = true;
                    slot.counters.expected = Some(0);
                }
                skipped += 1;
            } else {
                invalidation.set_state(InvalidationState::Processing);
            }
        }
        skipped
    }

    /// Write tracked states back to the batch.
    ///
    /// An invalidation that never settled (outcomes lost) is FAILED.
    pub fn finish(&self, invalidations: &mut [Invalidation]) {
        for (owner, invalidation) in invalidations.iter_mut().enumerate() {
            let state = match self.state(owner) {
                Some(state) if state.is_terminal() => state,
                _ => {
                    warn!(
                        id = %invalidation.id(),
                        counters = ?self.counters(owner),
                        "invalidation did not settle; marking failed"
                    );
                    InvalidationState::Failed
                }
            };
            if !invalidation.set_state(state) {
                warn!(
                    id = %invalidation.id(),
                    from = %invalidation.state(),
                    to = %state,
                    "refusing backward state transition"
                );
            }
        }
    }

    fn slot(&self, owner: usize) -> Option<MutexGuard<'_, Slot>> {
        match self.slots.get(owner) {
            Some(slot) => Some(slot.lock().unwrap_or_else(|e| e.into_inner())),
            None => {
                warn!(owner, len = self.slots.len(), "outcome for unknown invalidation");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_expected_succeeds_immediately() {
        let tracker = OutcomeTracker::new(1);
        assert_eq!(tracker.state(0), Some(InvalidationState::Processing));
        assert_eq!(tracker.expect(0, 0), Some(InvalidationState::Succeeded));
    }

    #[test]
    fn test_all_success() {
        let tracker = OutcomeTracker::new(1);
        assert_eq!(tracker.expect(0, 2), None);
        assert_eq!(tracker.record(0, true), None);
        assert_eq!(tracker.record(0, true), Some(InvalidationState::Succeeded));
    }

    #[test]
    fn test_early_failure_is_not_overwritten_by_late_success() {
        let tracker = OutcomeTracker::new(1);
        tracker.expect(0, 3);
        tracker.record(0, false);
        tracker.record(0, true);
        assert_eq!(tracker.record(0, true), Some(InvalidationState::Failed));
    }

    #[test]
    fn test_outcomes_before_expected_count() {
        let tracker = OutcomeTracker::new(1);
        assert_eq!(tracker.record(0, true), None);
        assert_eq!(tracker.record(0, true), None);
        assert_eq!(tracker.expect(0, 2), Some(InvalidationState::Succeeded));
    }

    #[test]
    fn test_terminal_state_is_final() {
        let tracker = OutcomeTracker::new(1);
        tracker.expect(0, 1);
        tracker.record(0, true);
        assert_eq!(tracker.record(0, false), None);
        assert_eq!(tracker.state(0), Some(InvalidationState::Succeeded));
        assert_eq!(tracker.counters(0).unwrap().failed, 0);
    }

    #[test]
    fn test_unknown_owner_is_ignored() {
        let tracker = OutcomeTracker::new(1);
        assert_eq!(tracker.record(5, true), None);
        assert_eq!(tracker.state(5), None);
    }

    #[test]
    fn test_finish_writes_states_and_fails_unsettled() {
        let mut batch = vec![
            Invalidation::new(1, "public://a.png").unwrap(),
            Invalidation::new(2, "public://b.png").unwrap(),
        ];
        let tracker = OutcomeTracker::new(batch.len());
        tracker.begin(&mut batch);
        assert_eq!(batch[0].state(), InvalidationState::Processing);

        tracker.expect(0, 0);
        tracker.expect(1, 2);
        tracker.record(1, true);
        tracker.finish(&mut batch);

        assert_eq!(batch[0].state(), InvalidationState::Succeeded);
        assert_eq!(batch[1].state(), InvalidationState::Failed);
    }

    #[test]
    fn test_begin_skips_settled_invalidations() {
        let mut batch = vec![
            Invalidation::new(1, "public://a.png").unwrap(),
            Invalidation::new(2, "public://b.png").unwrap(),
        ];
        batch[0].set_state(InvalidationState::Processing);
        batch[0].set_state(InvalidationState::Succeeded);

        let tracker = OutcomeTracker::new(batch.len());
        assert_eq!(tracker.begin(&mut batch), 1);
        assert!(tracker.is_skipped(0));
        assert!(!tracker.is_skipped(1));
        assert_eq!(tracker.state(0), Some(InvalidationState::Succeeded));
        assert_eq!(batch[1].state(), InvalidationState::Processing);

        // A late outcome can not reopen the skipped slot.
        assert_eq!(tracker.record(0, false), None);
        tracker.expect(1, 0);
        tracker.finish(&mut batch);
        assert_eq!(batch[0].state(), InvalidationState::Succeeded);
        assert_eq!(batch[1].state(), InvalidationState::Succeeded);
    }

    #[test]
    fn test_concurrent_records_from_threads() {
        let tracker = OutcomeTracker::new(1);
        tracker.expect(0, 64);
        std::thread::scope(|s| {
            for i in 0..64 {
                let tracker = &tracker;
                s.spawn(move || {
                    tracker.record(0, i != 17);
                });
            }
        });
        let counters = tracker.counters(0).unwrap();
        assert_eq!(counters.succeeded, 63);
        assert_eq!(counters.failed, 1);
        assert_eq!(tracker.state(0), Some(InvalidationState::Failed));
    }

    proptest! {
        #[test]
        fn test_terminal_state_independent_of_order(
            (outcomes, order) in prop::collection::vec(any::<bool>(), 1..24)
                .prop_flat_map(|v| {
                    let n = v.len();
                    (Just(v), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
                }),
            expect_at in 0usize..24,
        ) {
            let tracker = OutcomeTracker::new(1);
            let expect_at = expect_at % (outcomes.len() + 1);
            let mut settled = Vec::new();

            for (step, &i) in order.iter().enumerate() {
                if step == expect_at {
                    settled.extend(tracker.expect(0, outcomes.len()));
                }
                settled.extend(tracker.record(0, outcomes[i]));
            }
            if expect_at == outcomes.len() {
                settled.extend(tracker.expect(0, outcomes.len()));
            }

            let expected = if outcomes.iter().all(|&ok| ok) {
                InvalidationState::Succeeded
            } else {
                InvalidationState::Failed
            };
            prop_assert_eq!(settled, vec![expected]);
            prop_assert_eq!(tracker.state(0), Some(expected));
        }
    }
}
