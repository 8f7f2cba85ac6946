use crate::period::Period;
use crate::snapshot_name::{format_name, parse_name, PeriodTags};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// A single snapshot directory: the pairing of a `SnapshotId` (timestamp +
/// period tags) with the filesystem path it lives at (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub periods: PeriodTags,
}

impl Snapshot {
    /// Builds a `Snapshot` from a directory entry's basename, returning
    /// `None` if the name doesn't parse as a snapshot (§4.2: alien names
    /// are tolerated, not an error).
    pub fn from_dir_entry(parent: &std::path::Path, name: &str) -> Option<Snapshot> {
        let (timestamp, periods) = parse_name(name)?;
        Some(Snapshot {
            path: parent.join(name),
            name: name.to_string(),
            timestamp,
            periods,
        })
    }

    pub fn new_at(parent: &std::path::Path, timestamp: NaiveDateTime, periods: PeriodTags) -> Snapshot {
        let name = format_name(timestamp, &periods);
        Snapshot {
            path: parent.join(&name),
            name,
            timestamp,
            periods,
        }
    }

    pub fn has_period(&self, period: Period) -> bool {
        self.periods.contains(period)
    }

    pub fn is_untagged(&self) -> bool {
        self.periods.is_empty()
    }
}

impl PartialOrd for Snapshot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Snapshot {
    /// Basename sort equals timestamp sort (§8 property 2): names share a
    /// fixed-width, zero-padded prefix, so string/struct order agree.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp.cmp(&other.timestamp).then_with(|| self.name.cmp(&other.name))
    }
}
