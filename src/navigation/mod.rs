//! The DTMF-driven menu state machine.
//!
//! [`NavigationEngine`] computes transitions for one call at a time from the
//! shared functions in [`decision`]; [`SessionArena`] keeps many calls apart;
//! [`CallRunner`] drives a single call against a live telephony channel.

pub mod arena;
pub mod decision;
pub mod machine;
pub mod runner;
pub mod session;

pub use arena::SessionArena;
pub use decision::{
    Decision, FailureKind, FailureOutcome, MenuInput, RetryPolicy, check_entry, decide,
    duration_exceeded, on_failure,
};
pub use machine::NavigationEngine;
pub use runner::{CallRunner, TelephonyChannel};
pub use session::{CallEvent, CallSession, CallState, Effect, TerminationReason, TraceEntry};
