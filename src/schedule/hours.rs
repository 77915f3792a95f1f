use crate::error::ScheduleError;
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Business hours as written in a flow document.
///
/// ```yaml
/// name: office
/// timezone: America/New_York
/// timeframes:
///   monday: ["09:00-12:00", "13:00-17:00"]
///   Fri: ["09:00-15:00"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timeframes: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl BusinessHours {
    pub fn new(name: &str, timezone: &str) -> Self {
        Self {
            name: name.to_string(),
            timeframes: BTreeMap::new(),
            timezone: timezone.to_string(),
        }
    }

    pub fn with_interval(mut self, day: &str, interval: &str) -> Self {
        self.timeframes
            .entry(day.to_string())
            .or_default()
            .push(interval.to_string());
        self
    }
}

/// An open interval within one local day, in minutes from midnight. End-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn contains(&self, seconds_of_day: u32) -> bool {
        self.start * 60 <= seconds_of_day && seconds_of_day < self.end * 60
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// Parsed, checked business hours.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub(crate) name: String,
    pub(crate) timezone: Tz,
    /// Indexed by `Weekday::num_days_from_monday`, sorted by start.
    pub(crate) days: [Vec<Interval>; 7],
}

impl Schedule {
    pub fn parse(hours: &BusinessHours) -> Result<Self, ScheduleError> {
        let timezone: Tz =
            hours
                .timezone
                .parse()
                .map_err(|_| ScheduleError::InvalidTimezone {
                    schedule: hours.name.clone(),
                    timezone: hours.timezone.clone(),
                })?;

        let mut days: [Vec<Interval>; 7] = Default::default();
        for (day, intervals) in &hours.timeframes {
            let weekday = parse_weekday(day).ok_or_else(|| ScheduleError::UnknownWeekday {
                schedule: hours.name.clone(),
                day: day.clone(),
            })?;
            let slot = &mut days[weekday.num_days_from_monday() as usize];
            for raw in intervals {
                let interval =
                    parse_interval(raw).ok_or_else(|| ScheduleError::MalformedInterval {
                        schedule: hours.name.clone(),
                        day: day.clone(),
                        interval: raw.clone(),
                    })?;
                slot.push(interval);
            }
        }

        for (idx, intervals) in days.iter_mut().enumerate() {
            intervals.sort();
            if let Some(pair) = intervals.windows(2).find(|w| w[0].end > w[1].start) {
                return Err(ScheduleError::OverlappingIntervals {
                    schedule: hours.name.clone(),
                    day: weekday_from_index(idx).to_string(),
                    first: pair[0].to_string(),
                    second: pair[1].to_string(),
                });
            }
        }

        Ok(Self {
            name: hours.name.clone(),
            timezone,
            days,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn intervals(&self, day: Weekday) -> &[Interval] {
        &self.days[day.num_days_from_monday() as usize]
    }
}

pub(crate) fn weekday_from_index(idx: usize) -> Weekday {
    match idx {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// Accepts full English names and three-letter abbreviations in any case.
pub fn parse_weekday(day: &str) -> Option<Weekday> {
    match day.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_interval(raw: &str) -> Option<Interval> {
    let (start, end) = raw.trim().split_once('-')?;
    let start = parse_clock(start, false)?;
    let end = parse_clock(end, true)?;
    (start < end).then_some(Interval { start, end })
}

fn parse_clock(raw: &str, allow_midnight_end: bool) -> Option<u32> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    match (hours, minutes) {
        (24, 0) if allow_midnight_end => Some(MINUTES_PER_DAY),
        (h, m) if h < 24 && m < 60 => Some(h * 60 + m),
        _ => None,
    }
}
