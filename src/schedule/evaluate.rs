use super::hours::{BusinessHours, MINUTES_PER_DAY, Schedule};
use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

/// How far ahead `next_transition` looks for a state change.
const LOOKAHEAD_DAYS: u64 = 8;

/// Longest daylight-saving gap searched past, in minutes.
const MAX_GAP_MINUTES: i64 = 180;

/// Whether the business is open at `at`.
///
/// No schedule means always open. A schedule that fails to parse is also
/// treated as always open, so a bad config never locks callers out.
pub fn is_open(hours: Option<&BusinessHours>, at: DateTime<Utc>) -> bool {
    let Some(hours) = hours else {
        return true;
    };
    match Schedule::parse(hours) {
        Ok(schedule) => schedule.is_open_at(at),
        Err(e) => {
            tracing::warn!(
                schedule = %hours.name,
                error = %e,
                "Malformed business hours, treating schedule as always open"
            );
            true
        }
    }
}

/// The next instant after `at` where the open/closed state flips.
pub fn next_transition(schedule: &Schedule, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.next_transition(at)
}

impl Schedule {
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone);
        let seconds = local.num_seconds_from_midnight();
        self.intervals(local.weekday())
            .iter()
            .any(|interval| interval.contains(seconds))
    }

    /// Scans interval boundaries up to eight days ahead. `None` when the state never changes.
    pub fn next_transition(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let current = self.is_open_at(at);
        let today = at.with_timezone(&self.timezone).date_naive();

        let mut boundaries: Vec<DateTime<Utc>> = (0..=LOOKAHEAD_DAYS)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .flat_map(|date| {
                self.intervals(date.weekday())
                    .iter()
                    .flat_map(move |interval| [(date, interval.start), (date, interval.end)])
            })
            .filter_map(|(date, minute)| local_boundary(date, minute))
            .filter_map(|naive| resolve_local(&self.timezone, naive))
            .map(|local| local.with_timezone(&Utc))
            .filter(|instant| *instant > at)
            .collect();
        boundaries.sort();
        boundaries.dedup();

        boundaries
            .into_iter()
            .find(|instant| self.is_open_at(*instant) != current)
    }
}

fn local_boundary(date: NaiveDate, minute: u32) -> Option<NaiveDateTime> {
    if minute >= MINUTES_PER_DAY {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
        return date.succ_opt().map(|next| next.and_time(midnight));
    }
    NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0).map(|time| date.and_time(time))
}

/// Maps a local boundary to an instant. A boundary skipped by a spring-forward
/// gap takes effect at the first local minute after the gap.
fn resolve_local(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            timezone
                .from_local_datetime(&(naive + Duration::minutes(minutes)))
                .earliest()
        }),
    }
}
