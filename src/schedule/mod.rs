//! Business-hours evaluation.
//!
//! A schedule is evaluated in its own IANA timezone: the instant is converted
//! to local time, the weekday's intervals are looked up, and the business is
//! open iff the local time of day falls inside one of them (end-exclusive).

pub mod evaluate;
pub mod hours;

pub use evaluate::{is_open, next_transition};
pub use hours::{BusinessHours, Interval, MINUTES_PER_DAY, Schedule, parse_weekday};
