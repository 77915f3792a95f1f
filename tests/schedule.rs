//! Business-hours evaluation in the schedule's own timezone.
mod common;
use annai::error::ScheduleError;
use annai::schedule::{BusinessHours, Interval, Schedule, is_open, next_transition, parse_weekday};
use chrono::{TimeZone, Utc, Weekday};
use common::*;

#[test]
fn test_new_york_monday_boundaries() {
    let hours = new_york_office_hours();
    // 2024-01-08 is a Monday; New York is on EST (UTC-5).
    let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 8, h, m, 0).unwrap();

    assert!(!is_open(Some(&hours), at(13, 59)), "08:59 local is closed");
    assert!(is_open(Some(&hours), at(14, 0)), "09:00 local is open");
    assert!(is_open(Some(&hours), at(21, 59)), "16:59 local is open");
    assert!(!is_open(Some(&hours), at(22, 0)), "17:00 local is closed");
}

#[test]
fn test_weekend_and_missing_schedule() {
    let hours = new_york_office_hours();
    let saturday_noon = Utc.with_ymd_and_hms(2024, 1, 13, 17, 0, 0).unwrap();
    assert!(!is_open(Some(&hours), saturday_noon));
    assert!(is_open(None, saturday_noon));
}

#[test]
fn test_daylight_saving_shifts_utc_window() {
    let hours = new_york_office_hours();
    // Monday 2024-07-08, EDT (UTC-4): 09:00 local is 13:00 UTC.
    let july = |h| Utc.with_ymd_and_hms(2024, 7, 8, h, 0, 0).unwrap();
    assert!(is_open(Some(&hours), july(13)));
    assert!(!is_open(Some(&hours), july(21)));
}

#[test]
fn test_malformed_schedule_is_open() {
    let hours = BusinessHours::new("broken", "Mars/Olympus_Mons").with_interval("monday", "09:00-17:00");
    assert!(Schedule::parse(&hours).is_err());
    assert!(is_open(Some(&hours), monday_evening()));
}

#[test]
fn test_next_transition_finds_opening_and_closing() {
    let schedule = Schedule::parse(&new_york_office_hours()).unwrap();

    // Monday 10:00 local: closes at 17:00 local.
    assert_eq!(
        next_transition(&schedule, monday_morning()),
        Some(Utc.with_ymd_and_hms(2024, 1, 8, 22, 0, 0).unwrap())
    );
    // Friday 18:00 local: reopens Monday 09:00 local.
    let friday_evening = Utc.with_ymd_and_hms(2024, 1, 12, 23, 0, 0).unwrap();
    assert_eq!(
        next_transition(&schedule, friday_evening),
        Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap())
    );
}

#[test]
fn test_midnight_spanning_days_are_one_open_stretch() {
    let hours = BusinessHours::new("night", "UTC")
        .with_interval("mon", "20:00-24:00")
        .with_interval("tue", "00:00-04:00");
    let schedule = Schedule::parse(&hours).unwrap();

    let monday_nine_pm = Utc.with_ymd_and_hms(2024, 1, 8, 21, 0, 0).unwrap();
    assert!(schedule.is_open_at(monday_nine_pm));
    assert_eq!(
        schedule.next_transition(monday_nine_pm),
        Some(Utc.with_ymd_and_hms(2024, 1, 9, 4, 0, 0).unwrap())
    );
}

#[test]
fn test_always_closed_schedule_never_transitions() {
    let schedule = Schedule::parse(&BusinessHours::new("closed", "UTC")).unwrap();
    assert!(!schedule.is_open_at(monday_morning()));
    assert_eq!(schedule.next_transition(monday_morning()), None);
}

#[test]
fn test_weekday_names_and_abbreviations() {
    assert_eq!(parse_weekday("Monday"), Some(Weekday::Mon));
    assert_eq!(parse_weekday("tue"), Some(Weekday::Tue));
    assert_eq!(parse_weekday("SUN"), Some(Weekday::Sun));
    assert_eq!(parse_weekday("funday"), None);
}

#[test]
fn test_interval_parsing() {
    let parsed = |raw: &str| {
        Schedule::parse(&BusinessHours::new("office", "UTC").with_interval("mon", raw))
            .map(|schedule| schedule.intervals(Weekday::Mon).to_vec())
    };
    assert_eq!(
        parsed("09:00-17:30").unwrap(),
        vec![Interval {
            start: 540,
            end: 1050
        }]
    );
    assert_eq!(
        parsed("22:00-24:00").unwrap(),
        vec![Interval {
            start: 1320,
            end: 1440
        }]
    );
    for malformed in ["24:00-24:00", "17:00-09:00", "09:60-10:00", "nine-five"] {
        assert!(
            matches!(parsed(malformed), Err(ScheduleError::MalformedInterval { .. })),
            "{} should be rejected",
            malformed
        );
    }
}

#[test]
fn test_adjacent_intervals_are_not_overlapping() {
    let hours = BusinessHours::new("office", "UTC")
        .with_interval("mon", "12:00-17:00")
        .with_interval("mon", "09:00-12:00");
    let schedule = Schedule::parse(&hours).unwrap();
    assert_eq!(schedule.intervals(Weekday::Mon).len(), 2);
    assert_eq!(schedule.intervals(Weekday::Mon)[0].start, 540);
}

#[test]
fn test_overlapping_intervals_and_unknown_zones_are_rejected() {
    let overlapping = BusinessHours::new("office", "UTC")
        .with_interval("mon", "09:00-12:00")
        .with_interval("mon", "11:00-13:00");
    assert!(matches!(
        Schedule::parse(&overlapping),
        Err(ScheduleError::OverlappingIntervals { .. })
    ));
    assert!(matches!(
        Schedule::parse(&BusinessHours::new("office", "Mars/Olympus")),
        Err(ScheduleError::InvalidTimezone { .. })
    ));
}

#[test]
fn test_opening_inside_spring_forward_gap_moves_to_gap_end() {
    // New York skips 02:00-03:00 local on Sunday 2024-03-10.
    let hours = BusinessHours::new("early", "America/New_York").with_interval("sun", "02:30-05:00");
    let schedule = Schedule::parse(&hours).unwrap();
    let local_midnight = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap();
    let three_am_edt = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();

    assert!(!schedule.is_open_at(local_midnight));
    assert_eq!(schedule.next_transition(local_midnight), Some(three_am_edt));
    assert!(schedule.is_open_at(three_am_edt));
}
