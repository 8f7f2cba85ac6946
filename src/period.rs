//! Period calculus (§4.1): the four schedule classes and their boundary
//! arithmetic.
use chrono::{Datelike, Duration, NaiveDateTime};


#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

/// All four periods, ascending by nominal length (H, D, W, M) — the order
/// the snapshot name codec concatenates tags in.
pub const ALL_PERIODS: [Period; 4] = [Period::Hourly, Period::Daily, Period::Weekly, Period::Monthly];

impl Period {
    pub fn name(self) -> &'static str {
        match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }

    pub fn tag(self) -> char {
        match self {
            Period::Hourly => 'H',
            Period::Daily => 'D',
            Period::Weekly => 'W',
            Period::Monthly => 'M',
        }
    }

    /// Nominal length in seconds, used only to order periods relative to
    /// each other (months are treated as 30 days, an acceptable estimate
    /// since it is never used for date arithmetic).
    pub fn seconds(self) -> i64 {
        match self {
            Period::Hourly => 3600,
            Period::Daily => 86_400,
            Period::Weekly => 86_400 * 7,
            Period::Monthly => 86_400 * 30,
        }
    }

    pub fn from_tag(tag: char) -> Option<Period> {
        ALL_PERIODS.iter().copied().find(|p| p.tag() == tag)
    }

    pub fn from_name(name: &str) -> Option<Period> {
        ALL_PERIODS.iter().copied().find(|p| p.name() == name)
    }

    /// The strictly-later instant at which a snapshot of this class
    /// becomes due, given the last successful run `last`. Monotonic in
    /// `last` within a single period class.
    pub fn next_boundary(self, last: NaiveDateTime) -> NaiveDateTime {
        match self {
            Period::Hourly => last + Duration::hours(1),
            Period::Daily => last + Duration::days(1),
            Period::Weekly => last + Duration::days(7),
            Period::Monthly => {
                let (year, month) = if last.month() == 12 {
                    (last.year() + 1, 1)
                } else {
                    (last.year(), last.month() + 1)
                };
                // The target month may be shorter than `last.day()` (e.g. Jan
                // 31 -> Feb); clamp down to that month's last valid day rather
                // than falling back to `last` unchanged, which would make
                // `next_boundary` stick and re-trigger "due" forever.
                let date = (1..=last.day())
                    .rev()
                    .find_map(|day| chrono::NaiveDate::from_ymd_opt(year, month, day))
                    .expect("every month has at least one valid day");
                date.and_time(last.time())
            }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
