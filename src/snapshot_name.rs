//! Snapshot name codec (§4.2): the bidirectional mapping between a
//! (timestamp, period-tag set) pair and a directory basename.
use crate::period::{Period, ALL_PERIODS};
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::BTreeSet;

#[cfg(test)]
mod tests;

/// An ordered set of period tags, always formatted H, D, W, M regardless
/// of insertion order (§3 invariant (a)).
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PeriodTags(BTreeSet<Period>);

impl PeriodTags {
    pub fn new(periods: impl IntoIterator<Item = Period>) -> Self {
        PeriodTags(periods.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, period: Period) -> bool {
        self.0.contains(&period)
    }

    pub fn iter(&self) -> impl Iterator<Item = Period> + '_ {
        ALL_PERIODS.iter().copied().filter(move |p| self.0.contains(p))
    }
}

fn name_regex() -> Regex {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})(?:_([HDWM]*))?$")
        .expect("snapshot name regex is a compile-time constant")
}

/// Formats `(timestamp, periods)` into the canonical basename.
///
/// `YYYY-MM-DD_HH-MM-SS` optionally followed by `_` and the period tags
/// in ascending period order.
pub fn format_name(timestamp: NaiveDateTime, periods: &PeriodTags) -> String {
    let base = timestamp.format("%Y-%m-%d_%H-%M-%S").to_string();
    if periods.is_empty() {
        base
    } else {
        let tags: String = periods.iter().map(|p| p.tag()).collect();
        format!("{}_{}", base, tags)
    }
}

/// Parses a basename back into `(timestamp, periods)`. Returns `None` on
/// any non-match rather than an error: scanning directories must tolerate
/// alien names (§4.2).
pub fn parse_name(name: &str) -> Option<(NaiveDateTime, PeriodTags)> {
    let re = name_regex();
    let caps = re.captures(name)?;

    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let second: u32 = caps[6].parse().ok()?;

    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    let timestamp = date.and_hms_opt(hour, minute, second)?;

    let tags = caps
        .get(7)
        .map(|m| m.as_str())
        .unwrap_or("")
        .chars()
        .filter_map(Period::from_tag)
        .collect::<BTreeSet<_>>();

    Some((timestamp, PeriodTags(tags)))
}

#[cfg(test)]
pub(crate) fn tags(periods: &[Period]) -> PeriodTags {
    PeriodTags::new(periods.iter().copied())
}
