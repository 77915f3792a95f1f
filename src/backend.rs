use crate::config::EngineConfig;
use crate::dialplan::{CompileOptions, DialplanVm, compile};
use crate::error::NavigationError;
use crate::flow::Action;
use crate::navigation::{CallEvent, CallSession, Effect, NavigationEngine};
use crate::validator::ValidatedFlow;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Something that can carry a call through a deployed flow.
/// Both the live state machine and the compiled dialplan VM implement it and
/// must produce the same effects for the same inputs.
pub trait CallBackend: Send + Sync {
    fn flow_id(&self) -> &str;

    fn start(&self, call_id: &str, now: DateTime<Utc>) -> (CallSession, Vec<Effect>);

    fn handle(
        &self,
        session: &mut CallSession,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError>;

    fn hand_off(
        &self,
        session: &mut CallSession,
        now: DateTime<Utc>,
    ) -> Result<Action, NavigationError> {
        session.hand_off(now)
    }
}

/// The available backends for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    /// Walks the validated flow directly. Easiest to debug.
    Live,
    /// Compiles the flow to a dialplan artifact and runs it on the VM.
    Compiled,
}

impl CallBackend for NavigationEngine {
    fn flow_id(&self) -> &str {
        self.flow().id()
    }

    fn start(&self, call_id: &str, now: DateTime<Utc>) -> (CallSession, Vec<Effect>) {
        NavigationEngine::start(self, call_id, now)
    }

    fn handle(
        &self,
        session: &mut CallSession,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        NavigationEngine::handle(self, session, event, now)
    }
}

/// Builds the chosen backend for a deployed flow.
pub fn load_backend(
    choice: BackendChoice,
    flow: Arc<ValidatedFlow>,
    config: &EngineConfig,
) -> Arc<dyn CallBackend> {
    match choice {
        BackendChoice::Live => Arc::new(NavigationEngine::new(flow, config.retry_policy)),
        BackendChoice::Compiled => {
            let artifact = compile(&flow, &CompileOptions::from_config(config));
            Arc::new(DialplanVm::new(Arc::new(artifact)))
        }
    }
}
