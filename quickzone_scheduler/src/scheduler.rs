// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-tick budget loop: flush, compute quotas, round-robin until the
//! budget runs out or every group's quota is spent.

use std::time::{Duration, Instant};

use crate::rotor::GroupRotor;

/// Default per-tick wall-clock budget.
pub const DEFAULT_BUDGET: Duration = Duration::from_micros(1_000);

/// The caller's group table, as seen by [`Scheduler::tick`]. Implemented by the
/// facade over its `Vec<quickzone_entities::Group<H>>`.
pub trait TickGroups {
    /// Number of groups.
    fn group_count(&self) -> usize;
    /// Recomputes every group's per-tick quota for elapsed time `dt`.
    fn begin_tick(&mut self, dt: Duration);
    /// Whether `group` still has quota remaining this tick.
    fn has_quota(&self, group: usize) -> bool;
    /// Processes exactly one entity from `group`, consuming one unit of its quota.
    fn process_one(&mut self, group: usize);
}

/// What happened during one [`Scheduler::tick`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Entities processed this tick, summed across all groups.
    pub entities_processed: usize,
    /// Whether the round-robin loop was cut short by the budget (as opposed to
    /// every group simply running out of quota on its own).
    pub truncated_by_budget: bool,
    /// Time the `flush` step took.
    pub flush_elapsed: Duration,
    /// Whether the flush alone consumed the whole budget, so no entities were
    /// queried this tick at all (rebuilds still ran to completion regardless).
    pub skipped_queries: bool,
}

/// Frame-budgeted scheduler: runs a flush, then round-robins entity updates
/// across groups until either every group's quota is spent or the wall-clock
/// budget elapses, whichever comes first.
#[derive(Debug)]
pub struct Scheduler {
    budget: Duration,
    rotor: GroupRotor,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

impl Scheduler {
    /// Creates a scheduler with the given per-tick budget.
    pub fn new(budget: Duration) -> Self {
        Self { budget, rotor: GroupRotor::new() }
    }

    /// The current per-tick budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Updates the per-tick budget (`setFrameBudget`).
    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }

    /// Runs one tick. `start` is a fresh wall-clock reading taken by the caller
    /// immediately before this call; `clock` is polled after the flush and after
    /// every processed entity to check elapsed time against the budget — tests
    /// can substitute a deterministic fake instead of real time.
    ///
    /// `flush` always runs to completion and is never interrupted by the budget
    /// (pending tree rebuilds must land before any query can be trusted); if it
    /// alone consumes the whole budget, the round-robin step is skipped entirely
    /// for this tick.
    pub fn tick<G: TickGroups>(
        &mut self,
        start: Instant,
        dt: Duration,
        groups: &mut G,
        flush: impl FnOnce(),
        mut clock: impl FnMut() -> Instant,
    ) -> TickReport {
        flush();
        let flush_elapsed = clock().saturating_duration_since(start);
        if flush_elapsed >= self.budget {
            return TickReport {
                entities_processed: 0,
                truncated_by_budget: true,
                flush_elapsed,
                skipped_queries: true,
            };
        }

        groups.begin_tick(dt);
        let (entities_processed, truncated_by_budget) =
            self.round_robin(start, flush_elapsed, groups, clock);
        TickReport { entities_processed, truncated_by_budget, flush_elapsed, skipped_queries: false }
    }

    /// Runs just the round-robin loop, without a flush step: useful to callers
    /// that need to run their own flush/dirty-state step between a mutable
    /// borrow boundary and the per-entity polling loop (the facade's `Engine`
    /// does this, since its flush needs `&mut` access to state the loop only
    /// needs `&` access to). `already_elapsed` is folded in as time already
    /// spent this tick before this call, same as `tick`'s own flush step would
    /// contribute. Returns `(entities_processed, truncated_by_budget)`.
    pub fn round_robin<G: TickGroups>(
        &mut self,
        start: Instant,
        already_elapsed: Duration,
        groups: &mut G,
        mut clock: impl FnMut() -> Instant,
    ) -> (usize, bool) {
        if already_elapsed >= self.budget {
            return (0, true);
        }

        let mut entities_processed = 0;
        let mut truncated_by_budget = false;
        loop {
            let count = groups.group_count();
            let Some(group) = self.rotor.next_group(count, |i| groups.has_quota(i)) else {
                break;
            };
            groups.process_one(group);
            entities_processed += 1;
            if clock().saturating_duration_since(start) >= self.budget {
                truncated_by_budget = true;
                break;
            }
        }
        (entities_processed, truncated_by_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeGroups {
        quotas: Vec<usize>,
        processed: Vec<usize>,
    }

    impl TickGroups for FakeGroups {
        fn group_count(&self) -> usize {
            self.quotas.len()
        }
        fn begin_tick(&mut self, _dt: Duration) {
            // quotas preset by the test, not recomputed here
        }
        fn has_quota(&self, group: usize) -> bool {
            self.quotas[group] > 0
        }
        fn process_one(&mut self, group: usize) {
            self.quotas[group] -= 1;
            self.processed.push(group);
        }
    }

    fn fixed_clock(now: Instant) -> impl FnMut() -> Instant {
        move || now
    }

    #[test]
    fn round_robins_fairly_until_quotas_exhausted() {
        let mut sched = Scheduler::new(Duration::from_secs(1));
        let mut groups = FakeGroups { quotas: vec![2, 1, 2], processed: Vec::new() };
        let t0 = Instant::now();
        let report = sched.tick(t0, Duration::from_millis(16), &mut groups, || {}, fixed_clock(t0));
        assert_eq!(report.entities_processed, 5);
        assert!(!report.truncated_by_budget);
        // Rotor starts after group 0: 1, 2, 0, then 2 again once 1 is spent, then 0.
        assert_eq!(groups.processed, vec![1, 2, 0, 2, 0]);
    }

    #[test]
    fn flush_alone_exceeding_budget_skips_queries() {
        let mut sched = Scheduler::new(Duration::from_micros(1));
        let mut groups = FakeGroups { quotas: vec![5], processed: Vec::new() };
        let t0 = Instant::now();
        let after_flush = t0 + Duration::from_millis(5);
        let report = sched.tick(t0, Duration::from_millis(16), &mut groups, || {}, fixed_clock(after_flush));
        assert!(report.skipped_queries);
        assert_eq!(report.entities_processed, 0);
        assert!(groups.processed.is_empty());
    }

    #[test]
    fn budget_truncates_mid_round_robin() {
        let mut sched = Scheduler::new(Duration::from_millis(10));
        let mut groups = FakeGroups { quotas: vec![100, 100], processed: Vec::new() };
        let t0 = Instant::now();
        let calls = Cell::new(0u32);
        let report = sched.tick(t0, Duration::from_millis(16), &mut groups, || {}, || {
            let n = calls.get();
            calls.set(n + 1);
            // Call 0 is the post-flush check; calls 1-3 are after entities 1-3
            // (all within budget); call 4, after entity 4, trips it.
            if n <= 3 { t0 } else { t0 + Duration::from_millis(20) }
        });
        assert!(report.truncated_by_budget);
        assert_eq!(report.entities_processed, 4);
    }

    #[test]
    fn empty_group_table_is_a_no_op() {
        let mut sched = Scheduler::new(Duration::from_secs(1));
        let mut groups = FakeGroups { quotas: vec![], processed: Vec::new() };
        let t0 = Instant::now();
        let report = sched.tick(t0, Duration::from_millis(16), &mut groups, || {}, fixed_clock(t0));
        assert_eq!(report.entities_processed, 0);
        assert!(!report.truncated_by_budget);
    }

    #[test]
    fn round_robin_without_flush_runs_the_same_loop() {
        let mut sched = Scheduler::new(Duration::from_secs(1));
        let mut groups = FakeGroups { quotas: vec![1, 1], processed: Vec::new() };
        groups.begin_tick(Duration::from_millis(16));
        let t0 = Instant::now();
        let (processed, truncated) = sched.round_robin(t0, Duration::ZERO, &mut groups, fixed_clock(t0));
        assert_eq!(processed, 2);
        assert!(!truncated);
        assert_eq!(groups.processed, vec![1, 0]);
    }

    #[test]
    fn round_robin_skips_entirely_when_already_over_budget() {
        let mut sched = Scheduler::new(Duration::from_micros(1));
        let mut groups = FakeGroups { quotas: vec![5], processed: Vec::new() };
        let t0 = Instant::now();
        let (processed, truncated) =
            sched.round_robin(t0, Duration::from_millis(5), &mut groups, fixed_clock(t0));
        assert_eq!(processed, 0);
        assert!(truncated);
        assert!(groups.processed.is_empty());
    }
}
