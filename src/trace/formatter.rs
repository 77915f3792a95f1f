use crate::navigation::{CallSession, CallState, Effect, TraceEntry};

/// Formats call traces and effects into human-readable strings
pub struct TraceFormatter;

impl TraceFormatter {
    /// One line per recorded transition, timestamped relative to the call's start.
    pub fn format_trace(session: &CallSession) -> String {
        let mut result = format!("call {} on flow {}\n", session.call_id, session.flow_id);
        for (idx, entry) in session.trace.iter().enumerate() {
            result.push_str(&Self::format_entry(session, idx, entry));
            result.push('\n');
        }
        result
    }

    fn format_entry(session: &CallSession, idx: usize, entry: &TraceEntry) -> String {
        let offset = (entry.at - session.started_at).num_seconds();
        let event = match &entry.event {
            Some(event) => event.to_string(),
            None if idx == 0 => "start".to_string(),
            // Hand-off to the telephony engine.
            None => "handoff".to_string(),
        };
        format!("{:>+6}s  {:<12} -> {}", offset, event, entry.state)
    }

    /// The menus the caller waited in, in order, with consecutive repeats collapsed.
    pub fn format_path(session: &CallSession) -> String {
        let mut path: Vec<&str> = Vec::new();
        for entry in &session.trace {
            if let CallState::AwaitingInput { menu, .. } = &entry.state {
                if path.last() != Some(&menu.as_str()) {
                    path.push(menu);
                }
            }
        }
        path.join(" > ")
    }

    pub fn format_effect(effect: &Effect) -> String {
        match effect {
            Effect::Play { prompt, language } => format!("play {} [{}]", prompt, language),
            Effect::Listen { menu, timeout_sec } => {
                format!("listen at {} for {}s", menu, timeout_sec)
            }
            Effect::LanguageChanged(language) => format!("language -> {}", language),
            Effect::Dispatch(action) => format!("dispatch {}", action),
        }
    }

    pub fn format_effects(effects: &[Effect]) -> String {
        effects
            .iter()
            .map(Self::format_effect)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
