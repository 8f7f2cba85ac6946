//! Schedule Engine (§4.5): for each (subvolume, period), computes
//! last-run / next-run and whether a new snapshot is due.
use crate::objects::Snapshot;
use crate::period::Period;
use chrono::NaiveDateTime;

#[cfg(test)]
mod tests;

/// The schedule state of a single period class against a snapshot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSchedule {
    pub period: Period,
    pub last_run: Option<NaiveDateTime>,
    pub next_run: Option<NaiveDateTime>,
}

impl PeriodSchedule {
    /// `next_run ≤ now` or `next_run` is absent (never run before).
    pub fn should_run(&self, now: NaiveDateTime) -> bool {
        match self.next_run {
            Some(next) => next <= now,
            None => true,
        }
    }
}

/// `last_run` = timestamp of the most recent snapshot tagged with `period`.
pub fn last_run(snapshots: &[Snapshot], period: Period) -> Option<NaiveDateTime> {
    snapshots.iter().filter(|s| s.has_period(period)).map(|s| s.timestamp).max()
}

pub fn period_schedule(snapshots: &[Snapshot], period: Period) -> PeriodSchedule {
    let last = last_run(snapshots, period);
    let next = last.map(|t| period.next_boundary(t));
    PeriodSchedule {
        period,
        last_run: last,
        next_run: next,
    }
}

/// Collects every configured period that is due at `now` (§4.5). If
/// non-empty, the orchestrator creates one snapshot carrying all of
/// them. Only periods the retention policy actually names are ever
/// considered — an unconfigured period is never due.
pub fn due_periods(snapshots: &[Snapshot], configured: &[Period], now: NaiveDateTime) -> Vec<Period> {
    configured
        .iter()
        .copied()
        .filter(|&p| period_schedule(snapshots, p).should_run(now))
        .collect()
}
