//! Decision functions shared by the live navigation engine and the dialplan VM.
//!
//! Both backends route every menu decision through these functions, so a
//! compiled dialplan cannot drift from the live state machine.

use crate::flow::{Action, Menu};
use crate::schedule::{BusinessHours, is_open};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// When false, a non-matching key re-presents the menu without using up a retry.
    pub invalid_input_consumes_retry: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            invalid_input_consumes_retry: true,
        }
    }
}

/// What the caller did while a menu was listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput<'a> {
    Digits(&'a str),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A configured option matched.
    Dispatch(Action),
    /// Present the same menu again with this many retries left.
    Reprompt { retries_left: u32 },
    /// Retries are exhausted; the menu's fallback action applies.
    Fallback(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Reprompt { retries_left: u32 },
    Exhausted,
}

pub fn decide(
    menu: &Menu,
    input: MenuInput<'_>,
    retries_left: u32,
    policy: RetryPolicy,
) -> Decision {
    let kind = match input {
        MenuInput::Digits(digits) => match menu.options.get(digits) {
            Some(action) => return Decision::Dispatch(action.clone()),
            None => FailureKind::Invalid,
        },
        MenuInput::Timeout => FailureKind::Timeout,
    };
    match on_failure(retries_left, kind, policy) {
        FailureOutcome::Reprompt { retries_left } => Decision::Reprompt { retries_left },
        FailureOutcome::Exhausted => Decision::Fallback(menu.fallback_action.clone()),
    }
}

/// Applies a timeout or invalid entry to the retry counter.
///
/// The counter saturates at zero; reaching zero exhausts the menu.
pub fn on_failure(retries_left: u32, kind: FailureKind, policy: RetryPolicy) -> FailureOutcome {
    if kind == FailureKind::Invalid && !policy.invalid_input_consumes_retry {
        return FailureOutcome::Reprompt { retries_left };
    }
    match retries_left.saturating_sub(1) {
        0 => FailureOutcome::Exhausted,
        remaining => FailureOutcome::Reprompt {
            retries_left: remaining,
        },
    }
}

/// Whether a call entering a menu at `now` may proceed. Closed means the
/// after-hours action takes over.
pub fn check_entry(hours: Option<&BusinessHours>, now: DateTime<Utc>) -> bool {
    is_open(hours, now)
}

/// A ceiling of zero disables the limit.
pub fn duration_exceeded(started_at: DateTime<Utc>, now: DateTime<Utc>, max_call_duration: u32) -> bool {
    max_call_duration > 0 && (now - started_at).num_seconds() >= i64::from(max_call_duration)
}
