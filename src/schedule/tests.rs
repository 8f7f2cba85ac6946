use super::*;
use crate::snapshot_name::tags;
use std::path::Path;

fn dt(h: u32, mi: u32, s: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, mi, s).unwrap()
}

fn snap(h: u32, periods: &[Period]) -> Snapshot {
    Snapshot::new_at(Path::new("/srv/data/.snapshots"), dt(h, 0, 0), tags(periods))
}

#[test]
fn never_run_before_is_always_due() {
    let schedule = period_schedule(&[], Period::Hourly);
    assert_eq!(schedule.last_run, None);
    assert_eq!(schedule.next_run, None);
    assert!(schedule.should_run(dt(12, 0, 0)));
}

#[test]
fn due_only_after_the_boundary_passes() {
    let snapshots = vec![snap(10, &[Period::Hourly])];
    let schedule = period_schedule(&snapshots, Period::Hourly);
    assert_eq!(schedule.next_run, Some(dt(11, 0, 0)));
    assert!(!schedule.should_run(dt(10, 30, 0)));
    assert!(schedule.should_run(dt(11, 0, 0)));
    assert!(schedule.should_run(dt(11, 30, 0)));
}

#[test]
fn due_periods_only_considers_configured_periods() {
    let snapshots = vec![snap(10, &[Period::Hourly])];
    let due = due_periods(&snapshots, &[Period::Hourly, Period::Daily], dt(11, 0, 0));
    assert_eq!(due, vec![Period::Hourly, Period::Daily]);

    let due = due_periods(&snapshots, &[Period::Hourly], dt(10, 30, 0));
    assert!(due.is_empty());
}
