//! Per-listener quiet periods
//!
//! Raw changes are parked per listener until no new change for that listener
//! arrived for the quiet period. Listeners do not share deadlines, so a burst
//! under one root never holds back delivery under another.

use crate::classify::RawChange;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Changes accumulated for one listener
#[derive(Debug)]
pub(crate) struct PendingCycle {
    pub(crate) changes: Vec<RawChange>,
    pub(crate) events_lost: bool,
    deadline: Instant,
}

pub(crate) struct QuietPeriods<K> {
    quiet_period: Duration,
    pending: HashMap<K, PendingCycle>,
}

impl<K: Hash + Eq + Copy> QuietPeriods<K> {
    pub(crate) fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: HashMap::new(),
        }
    }

    /// Add a change and restart the listener's quiet period
    pub(crate) fn push(&mut self, key: K, change: RawChange, now: Instant) {
        let cycle = self.cycle(key, now);
        // Bursts of identical notifications (repeated writes) carry nothing new
        if cycle.changes.last() != Some(&change) {
            cycle.changes.push(change);
        }
    }

    /// Note that events for the listener were dropped
    pub(crate) fn mark_lost(&mut self, key: K, now: Instant) {
        self.cycle(key, now).events_lost = true;
    }

    fn cycle(&mut self, key: K, now: Instant) -> &mut PendingCycle {
        let deadline = now + self.quiet_period;
        let cycle = self.pending.entry(key).or_insert_with(|| PendingCycle {
            changes: Vec::new(),
            events_lost: false,
            deadline,
        });
        cycle.deadline = deadline;
        cycle
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|cycle| cycle.deadline).min()
    }

    /// Remove and return every cycle whose quiet period is over, oldest first
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<(K, PendingCycle)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, cycle)| cycle.deadline <= now)
            .map(|(key, _)| *key)
            .collect();

        let mut cycles: Vec<(K, PendingCycle)> = due
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|cycle| (key, cycle)))
            .collect();
        cycles.sort_by_key(|(_, cycle)| cycle.deadline);
        cycles
    }
}
