use super::session::{CallEvent, CallSession, Effect};
use crate::backend::CallBackend;
use crate::error::NavigationError;
use crate::flow::Action;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::sync::Arc;

struct ActiveCall {
    backend: Arc<dyn CallBackend>,
    session: CallSession,
}

/// Sessions of many calls, keyed by call id.
///
/// Each call stays bound to the backend it started on, so a redeploy only
/// affects calls started afterwards.
#[derive(Default)]
pub struct SessionArena {
    calls: AHashMap<String, ActiveCall>,
}

impl SessionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        backend: Arc<dyn CallBackend>,
        call_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        if self.calls.contains_key(call_id) {
            return Err(NavigationError::DuplicateCall(call_id.to_string()));
        }
        let (session, effects) = backend.start(call_id, now);
        self.calls
            .insert(call_id.to_string(), ActiveCall { backend, session });
        Ok(effects)
    }

    pub fn handle(
        &mut self,
        call_id: &str,
        event: CallEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, NavigationError> {
        let call = self.active(call_id)?;
        call.backend.handle(&mut call.session, event, now)
    }

    pub fn hand_off(&mut self, call_id: &str, now: DateTime<Utc>) -> Result<Action, NavigationError> {
        let call = self.active(call_id)?;
        call.backend.hand_off(&mut call.session, now)
    }

    pub fn session(&self, call_id: &str) -> Option<&CallSession> {
        self.calls.get(call_id).map(|call| &call.session)
    }

    /// Removes a call and returns its final session.
    pub fn end(&mut self, call_id: &str) -> Option<CallSession> {
        self.calls.remove(call_id).map(|call| call.session)
    }

    /// Removes every terminated call, ordered by call id.
    pub fn reap_finished(&mut self) -> Vec<CallSession> {
        let mut finished: Vec<String> = self
            .calls
            .iter()
            .filter(|(_, call)| call.session.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        finished.sort();
        finished
            .into_iter()
            .filter_map(|id| self.end(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn active(&mut self, call_id: &str) -> Result<&mut ActiveCall, NavigationError> {
        self.calls
            .get_mut(call_id)
            .ok_or_else(|| NavigationError::CallNotFound(call_id.to_string()))
    }
}
