use super::decision::{Decision, RetryPolicy, check_entry, decide};
use super::session::{CallEvent, CallSession, Effect, Preflight};
use crate::error::{NavigationError, RuntimeInconsistencyError};
use crate::flow::Action;
use crate::validator::ValidatedFlow;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The live menu state machine, bound to one deployed flow snapshot.
///
/// The engine holds no per-call state: every call lives in its own
/// [`CallSession`], and calls started on an older snapshot keep running on it
/// after a redeploy.
#[derive(Debug, Clone)]
pub struct NavigationEngine {
    flow: Arc<ValidatedFlow>,
    policy: RetryPolicy,
}

type Step = Result<Vec<Effect>, RuntimeInconsistencyError>;

impl NavigationEngine {
    pub fn new(flow: Arc<ValidatedFlow>, policy: RetryPolicy) -> Self {
        Self { flow, policy }
    }

    pub fn flow(&self) -> &Arc<ValidatedFlow> {
        &self.flow
    }

    fn voicemail(&self) -> Action {
        Action::voicemail_fallback(self.flow.flow())
    }

    /// Starts a call at the root menu.
    pub fn start(&self, call_id: &str, now: DateTime<Utc>) -> (CallSession, Vec<Effect>) {
        let mut session = CallSession::new(
            call_id,
            self.flow.id(),
            &self.flow.default_language().code,
            now,
        );
        let root = self.flow.root_menu().to_string();
        let effects = match self.enter_menu(&mut session, &root, true, now) {
            Ok(effects) => effects,
            Err(e) => session.fault(&e, self.voicemail()),
        };
        session.record(now, None);
        tracing::debug!(call_id, flow_id = %self.flow.id(), state = %session.state, "Call started");
        (session, effects)
    }

    /// Applies one caller event.
    pub fn handle(
        &self,
        session: &mut CallSession,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        let max = self.flow.flow().max_call_duration;
        let effects = match session.preflight(&event, now, max, || self.voicemail())? {
            Preflight::Finished(effects) => effects,
            Preflight::Proceed {
                menu,
                retries_left,
                input,
            } => {
                let step = self.flow.menu(&menu).map(|menu_def| {
                    decide(menu_def, input, retries_left, self.policy)
                });
                let outcome = step.and_then(|decision| match decision {
                    Decision::Dispatch(action) | Decision::Fallback(action) => {
                        self.dispatch(session, &action, false, now)
                    }
                    Decision::Reprompt { retries_left } => {
                        self.reprompt(session, &menu, retries_left)
                    }
                });
                match outcome {
                    Ok(effects) => effects,
                    Err(e) => session.fault(&e, self.voicemail()),
                }
            }
        };
        tracing::debug!(
            call_id = %session.call_id,
            event = %event,
            state = %session.state,
            "Call transition"
        );
        session.record(now, Some(event));
        Ok(effects)
    }

    /// Marks the dispatched terminal action as taken over by the telephony engine.
    pub fn hand_off(
        &self,
        session: &mut CallSession,
        now: DateTime<Utc>,
    ) -> Result<Action, NavigationError> {
        session.hand_off(now)
    }

    fn enter_menu(
        &self,
        session: &mut CallSession,
        menu_id: &str,
        check_hours: bool,
        now: DateTime<Utc>,
    ) -> Step {
        session.enter(menu_id);
        if check_hours && !check_entry(self.flow.flow().business_hours.as_ref(), now) {
            tracing::debug!(
                call_id = %session.call_id,
                menu = menu_id,
                "Business closed, applying after-hours action"
            );
            let action = self.flow.flow().after_hours_action();
            return self.dispatch(session, &action, true, now);
        }
        self.present(session, menu_id)
    }

    fn present(&self, session: &mut CallSession, menu_id: &str) -> Step {
        let menu = self.flow.menu(menu_id)?;
        session.await_input(menu_id, menu.max_retries);
        Ok(vec![
            session.play(&menu.prompt),
            Effect::Listen {
                menu: menu_id.to_string(),
                timeout_sec: menu.timeout_sec,
            },
        ])
    }

    fn listen(&self, session: &mut CallSession, menu_id: &str) -> Step {
        let menu = self.flow.menu(menu_id)?;
        session.await_input(menu_id, menu.max_retries);
        Ok(vec![Effect::Listen {
            menu: menu_id.to_string(),
            timeout_sec: menu.timeout_sec,
        }])
    }

    fn reprompt(&self, session: &mut CallSession, menu_id: &str, retries_left: u32) -> Step {
        let menu = self.flow.menu(menu_id)?;
        session.await_input(menu_id, retries_left);
        Ok(vec![
            session.play(&menu.prompt),
            Effect::Listen {
                menu: menu_id.to_string(),
                timeout_sec: menu.timeout_sec,
            },
        ])
    }

    fn current_menu(session: &CallSession) -> Result<String, RuntimeInconsistencyError> {
        session
            .current_menu
            .clone()
            .ok_or_else(|| RuntimeInconsistencyError::UnknownMenu("<none>".to_string()))
    }

    /// Carries out an action. Actions taken on behalf of closed business hours
    /// enter menus without checking the hours again.
    fn dispatch(
        &self,
        session: &mut CallSession,
        action: &Action,
        after_hours: bool,
        now: DateTime<Utc>,
    ) -> Step {
        match action {
            Action::Menu { menu_ref } => {
                session.push_history();
                self.enter_menu(session, menu_ref, !after_hours, now)
            }
            Action::Language {
                language,
                prompt,
                menu_ref,
                reprompt,
            } => {
                let mut effects = vec![session.set_language(language)];
                if let Some(prompt) = prompt {
                    effects.push(session.play(prompt));
                }
                let next = match menu_ref {
                    Some(target) => {
                        session.push_history();
                        self.enter_menu(session, target, !after_hours, now)?
                    }
                    None => {
                        let current = Self::current_menu(session)?;
                        if *reprompt {
                            self.present(session, &current)?
                        } else {
                            self.listen(session, &current)?
                        }
                    }
                };
                effects.extend(next);
                Ok(effects)
            }
            Action::Back => {
                let current = Self::current_menu(session)?;
                let target = match session.history.pop() {
                    Some(previous) => Some(previous),
                    None => self.flow.menu(&current)?.parent_menu.clone(),
                };
                match target {
                    Some(target) => self.enter_menu(session, &target, !after_hours, now),
                    None => self.present(session, &current),
                }
            }
            terminal => {
                let resolved = terminal.resolved(self.flow.flow());
                let mut effects = Vec::new();
                if let Action::Hangup {
                    prompt: Some(prompt),
                } = &resolved
                {
                    effects.push(session.play(prompt));
                }
                effects.push(session.dispatch_terminal(resolved));
                Ok(effects)
            }
        }
    }
}
