//! Retention Selector (§4.4): given a snapshot set and a per-period
//! retention map, computes the "keep" and "discard" partitions.
use crate::objects::Snapshot;
use crate::period::Period;
use std::collections::{BTreeMap, HashSet};


/// Per-period upper bound on the number of snapshots of that class to
/// keep. An absent period means "keep zero" (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy(BTreeMap<Period, u32>);

impl RetentionPolicy {
    pub fn new(limits: impl IntoIterator<Item = (Period, u32)>) -> Self {
        RetentionPolicy(limits.into_iter().collect())
    }

    pub fn limit(&self, period: Period) -> u32 {
        self.0.get(&period).copied().unwrap_or(0)
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.0.keys().copied()
    }
}

/// The keep set is the union over periods `p` of "the last `policy[p]`
/// snapshots tagged with `p`, ordered by timestamp" (§4.4). Untagged
/// snapshots are never part of this computation and so are never
/// automatically deleted.
pub fn keep_set<'a>(snapshots: &'a [Snapshot], policy: &RetentionPolicy) -> Vec<&'a Snapshot> {
    let mut kept_names: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&Snapshot> = Vec::new();

    for period in crate::period::ALL_PERIODS {
        let limit = policy.limit(period) as usize;
        if limit == 0 {
            continue;
        }

        let mut tagged: Vec<&Snapshot> = snapshots.iter().filter(|s| s.has_period(period)).collect();
        tagged.sort();

        let start = tagged.len().saturating_sub(limit);
        for snapshot in &tagged[start..] {
            if kept_names.insert(snapshot.name.as_str()) {
                kept.push(snapshot);
            }
        }
    }

    kept.sort();
    kept
}

/// The complement of `keep_set` restricted to period-tagged snapshots:
/// untagged snapshots are never part of the discard set either.
pub fn discard_set<'a>(snapshots: &'a [Snapshot], policy: &RetentionPolicy) -> Vec<&'a Snapshot> {
    let kept: HashSet<&str> = keep_set(snapshots, policy).into_iter().map(|s| s.name.as_str()).collect();
    let mut discarded: Vec<&Snapshot> = snapshots
        .iter()
        .filter(|s| !s.is_untagged() && !kept.contains(s.name.as_str()))
        .collect();
    discarded.sort();
    discarded
}
