use super::session::{CallEvent, CallSession, CallState, Effect};
use crate::backend::CallBackend;
use crate::error::{NavigationError, SynthesisError};
use crate::flow::Action;
use crate::prompt::{AudioArtifact, PromptResolver};
use crate::validator::ValidatedFlow;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// The telephony side of one live call.
#[async_trait]
pub trait TelephonyChannel: Send {
    async fn play(&mut self, audio: &AudioArtifact);

    /// Waits up to `timeout` for DTMF. Returns `Timeout` or `Hangup` as appropriate.
    async fn collect(&mut self, menu: &str, timeout: Duration) -> CallEvent;

    /// Hands the call to the telephony engine for a terminal action.
    async fn execute(&mut self, action: &Action);

    /// Resolves once the caller has hung up. Must be cancel-safe.
    async fn hangup(&mut self);
}

/// Drives one call from start to hand-off against a [`TelephonyChannel`].
pub struct CallRunner {
    backend: Arc<dyn CallBackend>,
    flow: Arc<ValidatedFlow>,
    resolver: PromptResolver,
}

impl CallRunner {
    pub fn new(
        backend: Arc<dyn CallBackend>,
        flow: Arc<ValidatedFlow>,
        resolver: PromptResolver,
    ) -> Self {
        Self {
            backend,
            flow,
            resolver,
        }
    }

    pub async fn run(
        &self,
        call_id: &str,
        channel: &mut dyn TelephonyChannel,
    ) -> Result<CallSession, NavigationError> {
        let (mut session, mut effects) = self.backend.start(call_id, Utc::now());

        loop {
            let next = self.apply(&mut session, effects, channel).await?;
            if session.is_finished() {
                break;
            }
            match next {
                Some(event) => {
                    effects = self.backend.handle(&mut session, event, Utc::now())?;
                }
                None => break,
            }
        }

        tracing::info!(
            call_id,
            reason = ?session.termination_reason(),
            transitions = session.trace.len(),
            "Call finished"
        );
        Ok(session)
    }

    /// Carries out effects in order. Returns the event that ends the wait, if any.
    async fn apply(
        &self,
        session: &mut CallSession,
        effects: Vec<Effect>,
        channel: &mut dyn TelephonyChannel,
    ) -> Result<Option<CallEvent>, NavigationError> {
        for effect in effects {
            match effect {
                Effect::Play { prompt, language } => {
                    let audio = tokio::select! {
                        audio = self.resolver.resolve_or_fallback(&self.flow, &prompt, &language) => audio,
                        _ = channel.hangup() => return Ok(Some(CallEvent::Hangup)),
                    };
                    match audio {
                        Ok(audio) => channel.play(&audio).await,
                        Err(SynthesisError::Inconsistent(e)) => {
                            let voicemail = Action::voicemail_fallback(self.flow.flow());
                            for effect in session.fault(&e, voicemail) {
                                if let Effect::Dispatch(action) = effect {
                                    channel.execute(&action).await;
                                }
                            }
                            return Ok(None);
                        }
                        // A terminal action is already chosen; it still has to run.
                        Err(e) if !matches!(session.state, CallState::AwaitingInput { .. }) => {
                            tracing::warn!(
                                call_id = %session.call_id,
                                prompt = %prompt,
                                error = %e,
                                "Prompt unavailable, skipping it"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                call_id = %session.call_id,
                                prompt = %prompt,
                                error = %e,
                                "Prompt unavailable, treating as timeout"
                            );
                            return Ok(Some(CallEvent::Timeout));
                        }
                    }
                }
                Effect::Listen { menu, timeout_sec } => {
                    let event = channel
                        .collect(&menu, Duration::from_secs(u64::from(timeout_sec)))
                        .await;
                    return Ok(Some(event));
                }
                Effect::LanguageChanged(_) => {}
                Effect::Dispatch(action) => {
                    channel.execute(&action).await;
                    if matches!(session.state, CallState::Dispatching(_)) {
                        self.backend.hand_off(session, Utc::now())?;
                    }
                }
            }
        }
        Ok(None)
    }
}
