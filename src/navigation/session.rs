use crate::error::NavigationError;
use crate::flow::{Action, ActionKind, MenuId, PromptId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An input the telephony engine reports for a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEvent {
    Digits(String),
    Timeout,
    Hangup,
}

impl CallEvent {
    /// Parses the scripted form: `timeout`, `hangup`, or a DTMF string.
    pub fn parse(raw: &str) -> Option<CallEvent> {
        match raw.trim() {
            "timeout" | "t" => Some(CallEvent::Timeout),
            "hangup" | "h" => Some(CallEvent::Hangup),
            digits if crate::validator::is_dtmf_key(digits) => {
                Some(CallEvent::Digits(digits.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallEvent::Digits(digits) => write!(f, "dtmf '{}'", digits),
            CallEvent::Timeout => write!(f, "timeout"),
            CallEvent::Hangup => write!(f, "hangup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The telephony engine took over the call for a terminal action.
    Dispatched(ActionKind),
    CallerHangup,
    DurationExceeded,
    InternalFault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    AwaitingInput { menu: MenuId, retries_left: u32 },
    /// A terminal action waiting for the telephony engine to take the call.
    Dispatching(Action),
    Terminated(TerminationReason),
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::AwaitingInput { menu, retries_left } => {
                write!(f, "awaiting input at '{}' ({} retries left)", menu, retries_left)
            }
            CallState::Dispatching(action) => write!(f, "dispatching {}", action),
            CallState::Terminated(reason) => write!(f, "terminated ({:?})", reason),
        }
    }
}

/// An instruction for the telephony engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Play { prompt: PromptId, language: String },
    Listen { menu: MenuId, timeout_sec: u32 },
    LanguageChanged(String),
    Dispatch(Action),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub at: DateTime<Utc>,
    /// `None` for the call's start.
    pub event: Option<CallEvent>,
    pub state: CallState,
}

/// Runtime state of one call. Owned by whoever drives the call; transitions take `&mut`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    pub call_id: String,
    pub flow_id: String,
    pub state: CallState,
    pub language: String,
    /// The menu the caller is in, or was entering when a dispatch took over.
    pub current_menu: Option<MenuId>,
    pub history: Vec<MenuId>,
    pub started_at: DateTime<Utc>,
    pub trace: Vec<TraceEntry>,
}

/// Outcome of the checks every event goes through before menu logic runs.
pub(crate) enum Preflight<'a> {
    Proceed {
        menu: MenuId,
        retries_left: u32,
        input: crate::navigation::MenuInput<'a>,
    },
    Finished(Vec<Effect>),
}

impl CallSession {
    pub fn new(call_id: &str, flow_id: &str, language: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            call_id: call_id.to_string(),
            flow_id: flow_id.to_string(),
            state: CallState::Terminated(TerminationReason::InternalFault),
            language: language.to_string(),
            current_menu: None,
            history: Vec::new(),
            started_at,
            trace: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Terminated(_))
    }

    pub fn retries_left(&self) -> Option<u32> {
        match self.state {
            CallState::AwaitingInput { retries_left, .. } => Some(retries_left),
            _ => None,
        }
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self.state {
            CallState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Marks a dispatched terminal action as taken over by the telephony engine.
    pub fn hand_off(&mut self, at: DateTime<Utc>) -> Result<Action, NavigationError> {
        match &self.state {
            CallState::Dispatching(action) => {
                let action = action.clone();
                self.state = CallState::Terminated(TerminationReason::Dispatched(action.kind()));
                self.record(at, None);
                Ok(action)
            }
            _ => Err(NavigationError::CallFinished(self.call_id.clone())),
        }
    }

    pub(crate) fn record(&mut self, at: DateTime<Utc>, event: Option<CallEvent>) {
        self.trace.push(TraceEntry {
            at,
            event,
            state: self.state.clone(),
        });
    }

    pub(crate) fn preflight<'e>(
        &mut self,
        event: &'e CallEvent,
        now: DateTime<Utc>,
        max_call_duration: u32,
        voicemail: impl FnOnce() -> Action,
    ) -> Result<Preflight<'e>, NavigationError> {
        let (menu, retries_left) = match &self.state {
            CallState::AwaitingInput { menu, retries_left } => (menu.clone(), *retries_left),
            CallState::Dispatching(_) if *event == CallEvent::Hangup => {
                self.state = CallState::Terminated(TerminationReason::CallerHangup);
                return Ok(Preflight::Finished(Vec::new()));
            }
            _ => return Err(NavigationError::CallFinished(self.call_id.clone())),
        };

        let input = match event {
            CallEvent::Hangup => {
                self.state = CallState::Terminated(TerminationReason::CallerHangup);
                return Ok(Preflight::Finished(Vec::new()));
            }
            CallEvent::Digits(digits) => crate::navigation::MenuInput::Digits(digits),
            CallEvent::Timeout => crate::navigation::MenuInput::Timeout,
        };

        if crate::navigation::duration_exceeded(self.started_at, now, max_call_duration) {
            tracing::info!(
                call_id = %self.call_id,
                max_call_duration,
                "Call exceeded its maximum duration"
            );
            self.state = CallState::Terminated(TerminationReason::DurationExceeded);
            return Ok(Preflight::Finished(vec![Effect::Dispatch(voicemail())]));
        }

        Ok(Preflight::Proceed {
            menu,
            retries_left,
            input,
        })
    }

    pub(crate) fn await_input(&mut self, menu: &str, retries_left: u32) {
        self.state = CallState::AwaitingInput {
            menu: menu.to_string(),
            retries_left,
        };
    }

    pub(crate) fn enter(&mut self, menu: &str) {
        self.current_menu = Some(menu.to_string());
    }

    pub(crate) fn push_history(&mut self) {
        if let Some(current) = &self.current_menu {
            self.history.push(current.clone());
        }
    }

    pub(crate) fn set_language(&mut self, language: &str) -> Effect {
        self.language = language.to_string();
        Effect::LanguageChanged(language.to_string())
    }

    pub(crate) fn play(&self, prompt: &str) -> Effect {
        Effect::Play {
            prompt: prompt.to_string(),
            language: self.language.clone(),
        }
    }

    pub(crate) fn dispatch_terminal(&mut self, action: Action) -> Effect {
        self.state = CallState::Dispatching(action.clone());
        Effect::Dispatch(action)
    }

    /// Ends the call after a lookup that validation should have prevented.
    pub(crate) fn fault(&mut self, error: &dyn std::error::Error, voicemail: Action) -> Vec<Effect> {
        tracing::error!(
            call_id = %self.call_id,
            flow_id = %self.flow_id,
            error = %error,
            "Runtime inconsistency, routing call to voicemail"
        );
        self.state = CallState::Terminated(TerminationReason::InternalFault);
        vec![Effect::Dispatch(voicemail)]
    }
}
