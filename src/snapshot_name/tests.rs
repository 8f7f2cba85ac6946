use super::*;
use chrono::NaiveDate;

fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
}

#[test]
fn formats_untagged() {
    let t = dt(2024, 6, 1, 10, 0, 0);
    assert_eq!(format_name(t, &PeriodTags::default()), "2024-06-01_10-00-00");
}

#[test]
fn formats_tags_in_ascending_period_order_regardless_of_input_order() {
    let t = dt(2024, 6, 1, 10, 0, 0);
    let periods = tags(&[Period::Monthly, Period::Hourly, Period::Daily]);
    assert_eq!(format_name(t, &periods), "2024-06-01_10-00-00_HDM");
}

#[test]
fn round_trips_for_all_tag_combinations() {
    let t = dt(2024, 1, 2, 3, 4, 5);
    let combos: Vec<Vec<Period>> = vec![
        vec![],
        vec![Period::Hourly],
        vec![Period::Weekly, Period::Daily],
        vec![Period::Hourly, Period::Daily, Period::Weekly, Period::Monthly],
    ];

    for combo in combos {
        let periods = tags(&combo);
        let name = format_name(t, &periods);
        let (parsed_t, parsed_p) = parse_name(&name).expect("well-formed name parses");
        assert_eq!(parsed_t, t);
        assert_eq!(parsed_p, periods);
    }
}

#[test]
fn rejects_alien_names_without_erroring() {
    assert_eq!(parse_name("not-a-snapshot"), None);
    assert_eq!(parse_name("2024-13-40_99-99-99"), None);
    assert_eq!(parse_name(".tmp"), None);
}

#[test]
fn rejects_unknown_tag_characters() {
    // Whole name must match; a stray character after the tags doesn't parse.
    assert_eq!(parse_name("2024-06-01_10-00-00_HX"), None);
}
