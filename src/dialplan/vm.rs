use super::artifact::DialplanArtifact;
use super::instruction::{Block, Instruction, Target};
use crate::backend::CallBackend;
use crate::error::{NavigationError, RuntimeInconsistencyError};
use crate::navigation::{
    CallEvent, CallSession, CallState, Effect, FailureOutcome, MenuInput, check_entry, on_failure,
};
use crate::navigation::session::Preflight;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Upper bound on instructions executed for one event. Well-formed artifacts
/// settle in a few dozen.
const MAX_STEPS: usize = 4096;

/// Executes a compiled dialplan artifact.
///
/// Menu decisions go through the same functions the live engine uses, so for
/// identical inputs the VM yields identical effects and states.
#[derive(Debug, Clone)]
pub struct DialplanVm {
    artifact: Arc<DialplanArtifact>,
}

type Step = Result<Vec<Effect>, RuntimeInconsistencyError>;

impl DialplanVm {
    pub fn new(artifact: Arc<DialplanArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &Arc<DialplanArtifact> {
        &self.artifact
    }

    pub fn start(&self, call_id: &str, now: DateTime<Utc>) -> (CallSession, Vec<Effect>) {
        let artifact = &self.artifact;
        let mut session =
            CallSession::new(call_id, &artifact.flow_id, &artifact.default_language, now);
        let effects = match self.run(&mut session, &artifact.entry, now) {
            Ok(effects) => effects,
            Err(e) => session.fault(&e, artifact.voicemail_fallback.to_action()),
        };
        session.record(now, None);
        (session, effects)
    }

    pub fn handle(
        &self,
        session: &mut CallSession,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        let artifact = &self.artifact;
        let voicemail = || artifact.voicemail_fallback.to_action();
        let effects = match session.preflight(&event, now, artifact.max_call_duration, voicemail)? {
            Preflight::Finished(effects) => effects,
            Preflight::Proceed { menu, input, .. } => {
                let outcome = artifact.menu(&menu).and_then(|block| {
                    let start = match input {
                        MenuInput::Digits(digits) => block.options.get(digits).unwrap_or(&block.invalid),
                        MenuInput::Timeout => &block.timeout,
                    };
                    self.run(session, start, now)
                });
                match outcome {
                    Ok(effects) => effects,
                    Err(e) => session.fault(&e, voicemail()),
                }
            }
        };
        session.record(now, Some(event));
        Ok(effects)
    }

    /// Executes from the top of `block` until the call waits for input or is dispatched.
    fn run(&self, session: &mut CallSession, block: &Block, now: DateTime<Utc>) -> Step {
        let artifact = &self.artifact;
        let mut effects = Vec::new();
        let mut block = block;
        let mut pc = 0;

        for _ in 0..MAX_STEPS {
            let Some(instruction) = block.instructions.get(pc) else {
                return Ok(effects);
            };
            pc += 1;

            let jump = match instruction {
                Instruction::Enter { menu } => {
                    session.enter(menu);
                    None
                }
                Instruction::CheckHours => {
                    (!check_entry(artifact.schedule.as_ref(), now)).then_some(Target::AfterHours)
                }
                Instruction::Arm { menu, retries } => {
                    session.await_input(menu, *retries);
                    None
                }
                Instruction::Play { prompt } => {
                    effects.push(session.play(prompt));
                    None
                }
                Instruction::Listen { menu, timeout_sec } => {
                    effects.push(Effect::Listen {
                        menu: menu.clone(),
                        timeout_sec: *timeout_sec,
                    });
                    return Ok(effects);
                }
                Instruction::SetLanguage { language } => {
                    effects.push(session.set_language(language));
                    None
                }
                Instruction::PushHistory => {
                    session.push_history();
                    None
                }
                Instruction::Goto(target) => Some(target.clone()),
                Instruction::PresentCurrent => Some(Target::Present(current_menu(session)?)),
                Instruction::ListenCurrent => Some(Target::Listen(current_menu(session)?)),
                Instruction::Back { check_hours } => {
                    let current = current_menu(session)?;
                    let target = match session.history.pop() {
                        Some(previous) => Some(previous),
                        None => artifact.menu(&current)?.parent_menu.clone(),
                    };
                    match target {
                        Some(target) if *check_hours => Some(Target::Entry(target)),
                        Some(target) => {
                            session.enter(&target);
                            Some(Target::Present(target))
                        }
                        None => Some(Target::Present(current)),
                    }
                }
                Instruction::Fail(kind) => {
                    let CallState::AwaitingInput { menu, retries_left } = &session.state else {
                        return Err(RuntimeInconsistencyError::UnknownBlock(block.label.clone()));
                    };
                    let menu = menu.clone();
                    match on_failure(*retries_left, *kind, artifact.retry_policy) {
                        FailureOutcome::Reprompt { retries_left } => {
                            session.await_input(&menu, retries_left);
                            Some(Target::Reprompt(menu))
                        }
                        FailureOutcome::Exhausted => Some(Target::Fallback(menu)),
                    }
                }
                Instruction::Dispatch(terminal) => {
                    effects.push(session.dispatch_terminal(terminal.to_action()));
                    return Ok(effects);
                }
            };

            if let Some(target) = jump {
                block = artifact.block(&target)?;
                pc = 0;
            }
        }

        Err(RuntimeInconsistencyError::RunawayDialplan(block.label.clone()))
    }
}

fn current_menu(session: &CallSession) -> Result<String, RuntimeInconsistencyError> {
    session
        .current_menu
        .clone()
        .ok_or_else(|| RuntimeInconsistencyError::UnknownMenu("<none>".to_string()))
}

impl CallBackend for DialplanVm {
    fn flow_id(&self) -> &str {
        &self.artifact.flow_id
    }

    fn start(&self, call_id: &str, now: DateTime<Utc>) -> (CallSession, Vec<Effect>) {
        DialplanVm::start(self, call_id, now)
    }

    fn handle(
        &self,
        session: &mut CallSession,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        DialplanVm::handle(self, session, event, now)
    }
}
