//! Live navigation engine tests against the "sales" flow.
mod common;
use annai::backend::CallBackend;
use annai::error::NavigationError;
use annai::flow::{Action, ActionKind, Menu};
use annai::navigation::{
    CallEvent, CallRunner, CallSession, CallState, Decision, Effect, FailureKind, FailureOutcome,
    MenuInput, NavigationEngine, RetryPolicy, SessionArena, TelephonyChannel, TerminationReason,
    TraceEntry, decide, duration_exceeded, on_failure,
};
use annai::prompt::{AudioArtifact, PromptCache, PromptResolver, SpeechSynthesizer, SynthesisRequest};
use annai::trace::TraceFormatter;
use annai::validator::ValidatedFlow;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::*;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

fn engine() -> NavigationEngine {
    NavigationEngine::new(validated(create_sales_flow()), RetryPolicy::default())
}

fn voicemail() -> Action {
    Action::Voicemail {
        voicemail_box: Some("100".to_string()),
        context: Some("acme".to_string()),
    }
}

fn play(prompt: &str, language: &str) -> Effect {
    Effect::Play {
        prompt: prompt.to_string(),
        language: language.to_string(),
    }
}

fn listen(menu: &str) -> Effect {
    Effect::Listen {
        menu: menu.to_string(),
        timeout_sec: 5,
    }
}

fn awaiting(menu: &str, retries_left: u32) -> CallState {
    CallState::AwaitingInput {
        menu: menu.to_string(),
        retries_left,
    }
}

#[test]
fn test_start_presents_root_menu() {
    let (session, effects) = engine().start("call-1", monday_morning());
    assert_eq!(effects, vec![play("welcome", "en-US"), listen("main")]);
    assert_eq!(session.state, awaiting("main", 3));
    assert_eq!(session.trace.len(), 1);
}

#[test]
fn test_option_dispatches_queue() {
    let (session, batches) = run_call(&engine(), monday_morning(), &[digits("1")]);
    let queue = Action::Queue {
        queue_ref: "sales_q".to_string(),
    };
    assert_eq!(batches[1], vec![Effect::Dispatch(queue.clone())]);
    assert_eq!(session.state, CallState::Dispatching(queue));
}

#[test]
fn test_timeouts_exhaust_retries_then_fallback_once() {
    let events = vec![CallEvent::Timeout; 3];
    let (session, batches) = run_call(&engine(), monday_morning(), &events);

    assert_eq!(batches[1], vec![play("welcome", "en-US"), listen("main")]);
    assert_eq!(batches[3], vec![Effect::Dispatch(voicemail())]);
    let retries: Vec<Option<u32>> = session
        .trace
        .iter()
        .map(|entry| match &entry.state {
            CallState::AwaitingInput { retries_left, .. } => Some(*retries_left),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![Some(3), Some(2), Some(1), None]);
    let fallbacks = batches
        .iter()
        .flatten()
        .filter(|effect| matches!(effect, Effect::Dispatch(_)))
        .count();
    assert_eq!(fallbacks, 1);
}

#[test]
fn test_invalid_keys_exhaust_retries_like_timeouts() {
    let events = vec![digits("9"); 3];
    let (session, _) = run_call(&engine(), monday_morning(), &events);
    assert_eq!(session.state, CallState::Dispatching(voicemail()));
}

#[test]
fn test_invalid_keys_can_be_free() {
    let policy = RetryPolicy {
        invalid_input_consumes_retry: false,
    };
    let engine = NavigationEngine::new(validated(create_sales_flow()), policy);
    let events = vec![digits("9"); 5];
    let (session, _) = run_call(&engine, monday_morning(), &events);
    assert_eq!(session.state, awaiting("main", 3));
}

#[test]
fn test_submenu_and_back() {
    let engine = engine();
    let (session, batches) = run_call(&engine, monday_morning(), &[digits("2"), digits("9")]);
    assert_eq!(batches[1], vec![play("support_menu", "en-US"), listen("support")]);
    assert_eq!(batches[2], vec![play("welcome", "en-US"), listen("main")]);
    assert_eq!(session.state, awaiting("main", 3));
    assert!(session.history.is_empty());
}

#[test]
fn test_back_without_history_uses_parent() {
    let engine = engine();
    let now = monday_morning();
    let (mut session, _) = engine.start("call-1", now);
    engine.handle(&mut session, digits("2"), now).unwrap();
    session.history.clear();

    let effects = engine.handle(&mut session, digits("9"), now).unwrap();
    assert_eq!(effects, vec![play("welcome", "en-US"), listen("main")]);
}

#[test]
fn test_language_switch_replays_menu_in_new_language() {
    let engine = engine();
    let now = monday_morning();
    let (mut session, _) = engine.start("call-1", now);
    engine.handle(&mut session, CallEvent::Timeout, now).unwrap();

    let effects = engine.handle(&mut session, digits("3"), now).unwrap();
    assert_eq!(
        effects,
        vec![
            Effect::LanguageChanged("es-US".to_string()),
            play("welcome", "es-US"),
            listen("main"),
        ]
    );
    assert_eq!(session.language, "es-US");
    assert_eq!(session.retries_left(), Some(3));
}

#[test]
fn test_hangup_option_plays_prompt_first() {
    let (session, batches) = run_call(&engine(), monday_morning(), &[digits("0")]);
    let hangup = Action::Hangup {
        prompt: Some("goodbye".to_string()),
    };
    assert_eq!(batches[1], vec![play("goodbye", "en-US"), Effect::Dispatch(hangup.clone())]);
    assert_eq!(session.state, CallState::Dispatching(hangup));
}

#[test]
fn test_caller_hangup_ends_call_and_rejects_more_events() {
    let engine = engine();
    let now = monday_morning();
    let (mut session, _) = engine.start("call-1", now);

    let effects = engine.handle(&mut session, CallEvent::Hangup, now).unwrap();
    assert!(effects.is_empty());
    assert_eq!(
        session.termination_reason(),
        Some(TerminationReason::CallerHangup)
    );
    assert_eq!(
        engine.handle(&mut session, digits("1"), now),
        Err(NavigationError::CallFinished("call-1".to_string()))
    );
}

#[test]
fn test_hand_off_terminates_dispatched_call() {
    let engine = engine();
    let now = monday_morning();
    let (mut session, _) = engine.start("call-1", now);
    engine.handle(&mut session, digits("1"), now).unwrap();

    let action = engine.hand_off(&mut session, now).unwrap();
    assert_eq!(action.kind(), ActionKind::Queue);
    assert_eq!(
        session.termination_reason(),
        Some(TerminationReason::Dispatched(ActionKind::Queue))
    );
    assert!(engine.hand_off(&mut session, now).is_err());
}

#[test]
fn test_max_call_duration_routes_to_voicemail() {
    let mut flow = create_sales_flow();
    flow.max_call_duration = 10;
    let engine = NavigationEngine::new(validated(flow), RetryPolicy::default());
    let start = monday_morning();
    let (mut session, _) = engine.start("call-1", start);

    engine
        .handle(&mut session, CallEvent::Timeout, start + Duration::seconds(9))
        .unwrap();
    let effects = engine
        .handle(&mut session, digits("1"), start + Duration::seconds(10))
        .unwrap();
    assert_eq!(effects, vec![Effect::Dispatch(voicemail())]);
    assert_eq!(
        session.termination_reason(),
        Some(TerminationReason::DurationExceeded)
    );
}

#[test]
fn test_zero_max_duration_is_unlimited() {
    let mut flow = create_sales_flow();
    flow.max_call_duration = 0;
    let engine = NavigationEngine::new(validated(flow), RetryPolicy::default());
    let start = monday_morning();
    let (mut session, _) = engine.start("call-1", start);
    engine
        .handle(&mut session, digits("2"), start + Duration::hours(5))
        .unwrap();
    assert_eq!(session.state, awaiting("support", 3));
}

#[test]
fn test_closed_business_applies_after_hours_action() {
    let mut flow = create_sales_flow();
    flow.business_hours = Some(new_york_office_hours());
    let closed = NavigationEngine::new(validated(flow.clone()), RetryPolicy::default());
    let (session, effects) = closed.start("call-1", monday_evening());
    assert_eq!(effects, vec![Effect::Dispatch(voicemail())]);
    assert_eq!(session.state, CallState::Dispatching(voicemail()));

    let (session, _) = closed.start("call-2", monday_morning());
    assert_eq!(session.state, awaiting("main", 3));

    flow.after_hours = Some(Action::Menu {
        menu_ref: "support".to_string(),
    });
    let redirected = NavigationEngine::new(validated(flow), RetryPolicy::default());
    let (session, effects) = redirected.start("call-3", monday_evening());
    assert_eq!(effects, vec![play("support_menu", "en-US"), listen("support")]);
    assert_eq!(session.state, awaiting("support", 3));
}

#[test]
fn test_arena_keeps_calls_apart() {
    let backend: Arc<dyn CallBackend> = Arc::new(engine());
    let mut arena = SessionArena::new();
    let now = monday_morning();

    arena.start(Arc::clone(&backend), "a", now).unwrap();
    arena.start(Arc::clone(&backend), "b", now).unwrap();
    assert_eq!(
        arena.start(Arc::clone(&backend), "a", now),
        Err(NavigationError::DuplicateCall("a".to_string()))
    );

    arena.handle("a", digits("2"), now).unwrap();
    arena.handle("b", CallEvent::Hangup, now).unwrap();
    assert_eq!(arena.session("a").unwrap().state, awaiting("support", 3));
    assert_eq!(
        arena.handle("c", CallEvent::Timeout, now),
        Err(NavigationError::CallNotFound("c".to_string()))
    );

    let finished = arena.reap_finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].call_id, "b");
    assert_eq!(arena.len(), 1);
}

fn sales_queue_menu() -> Menu {
    Menu::new("main", "welcome").with_option(
        "1",
        Action::Queue {
            queue_ref: "sales_q".to_string(),
        },
    )
}

#[test]
fn test_decide_dispatches_matching_digits() {
    let decision = decide(&sales_queue_menu(), MenuInput::Digits("1"), 3, RetryPolicy::default());
    assert_eq!(
        decision,
        Decision::Dispatch(Action::Queue {
            queue_ref: "sales_q".to_string()
        })
    );
}

#[test]
fn test_failures_count_down_then_exhaust() {
    let policy = RetryPolicy::default();
    assert_eq!(
        on_failure(3, FailureKind::Timeout, policy),
        FailureOutcome::Reprompt { retries_left: 2 }
    );
    assert_eq!(on_failure(1, FailureKind::Timeout, policy), FailureOutcome::Exhausted);
    assert_eq!(on_failure(0, FailureKind::Invalid, policy), FailureOutcome::Exhausted);
}

#[test]
fn test_free_invalid_input_still_times_out() {
    let policy = RetryPolicy {
        invalid_input_consumes_retry: false,
    };
    assert_eq!(
        decide(&sales_queue_menu(), MenuInput::Digits("7"), 1, policy),
        Decision::Reprompt { retries_left: 1 }
    );
    assert!(matches!(
        decide(&sales_queue_menu(), MenuInput::Timeout, 1, policy),
        Decision::Fallback(_)
    ));
}

#[test]
fn test_duration_ceiling() {
    let start = monday_morning();
    let limit = start + Duration::seconds(300);
    assert!(!duration_exceeded(start, limit - Duration::seconds(1), 300));
    assert!(duration_exceeded(start, limit, 300));
    assert!(!duration_exceeded(start, limit, 0));
}

fn traced_session() -> CallSession {
    let start = monday_morning();
    let mut session = CallSession::new("c1", "sales", "en-US", start);
    session.trace = vec![
        TraceEntry {
            at: start,
            event: None,
            state: awaiting("main", 3),
        },
        TraceEntry {
            at: start + Duration::seconds(4),
            event: Some(CallEvent::Timeout),
            state: awaiting("main", 2),
        },
        TraceEntry {
            at: start + Duration::seconds(9),
            event: Some(digits("2")),
            state: awaiting("support", 3),
        },
        TraceEntry {
            at: start + Duration::seconds(12),
            event: Some(CallEvent::Hangup),
            state: CallState::Terminated(TerminationReason::CallerHangup),
        },
    ];
    session
}

#[test]
fn test_trace_path_collapses_repeats() {
    assert_eq!(TraceFormatter::format_path(&traced_session()), "main > support");
}

#[test]
fn test_trace_lines_are_relative_to_call_start() {
    let text = TraceFormatter::format_trace(&traced_session());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[1].contains("start"));
    assert!(lines[3].contains("+9s"));
    assert!(lines[4].contains("CallerHangup"));
}

/// Answers at once, or after `delay`, failing for one prompt text if asked to.
struct StubSynthesizer {
    delay: std::time::Duration,
    fail_text: Option<&'static str>,
}

impl StubSynthesizer {
    fn instant() -> Self {
        Self {
            delay: std::time::Duration::ZERO,
            fail_text: None,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioArtifact, annai::error::SynthesisError> {
        tokio::time::sleep(self.delay).await;
        if self.fail_text == Some(request.text.as_str()) {
            return Err(annai::error::SynthesisError::Provider {
                key: request.key.to_string(),
                message: "voice engine down".to_string(),
            });
        }
        Ok(AudioArtifact {
            location: PathBuf::from(request.key.file_name("wav")),
            created_at: Utc::now(),
        })
    }
}

/// Replays scripted caller input and records what the engine asked for.
struct ScriptedChannel {
    inputs: VecDeque<CallEvent>,
    played: Vec<PathBuf>,
    executed: Vec<Action>,
    /// The caller hangs up this long into any prompt wait.
    hangs_up_after: Option<std::time::Duration>,
}

impl ScriptedChannel {
    fn new(inputs: Vec<CallEvent>) -> Self {
        Self {
            inputs: VecDeque::from(inputs),
            played: Vec::new(),
            executed: Vec::new(),
            hangs_up_after: None,
        }
    }
}

#[async_trait]
impl TelephonyChannel for ScriptedChannel {
    async fn play(&mut self, audio: &AudioArtifact) {
        self.played.push(audio.location.clone());
    }

    async fn collect(&mut self, _menu: &str, _timeout: std::time::Duration) -> CallEvent {
        self.inputs.pop_front().unwrap_or(CallEvent::Hangup)
    }

    async fn execute(&mut self, action: &Action) {
        self.executed.push(action.clone());
    }

    async fn hangup(&mut self) {
        match self.hangs_up_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending::<()>().await,
        }
    }
}

fn live_runner(flow: Arc<ValidatedFlow>, synthesizer: StubSynthesizer) -> CallRunner {
    let backend: Arc<dyn CallBackend> = Arc::new(NavigationEngine::new(
        Arc::clone(&flow),
        RetryPolicy::default(),
    ));
    let resolver = PromptResolver::new(Arc::new(PromptCache::new()), Arc::new(synthesizer));
    CallRunner::new(backend, flow, resolver)
}

#[tokio::test]
async fn test_runner_drives_call_to_hand_off() {
    let runner = live_runner(validated(create_sales_flow()), StubSynthesizer::instant());

    let mut channel = ScriptedChannel::new(vec![digits("2"), digits("1")]);
    let session = runner.run("call-1", &mut channel).await.unwrap();

    assert_eq!(channel.played.len(), 2);
    assert_eq!(
        channel.executed,
        vec![Action::Extension {
            context: "billing".to_string(),
            extension: "200".to_string()
        }]
    );
    assert_eq!(
        session.termination_reason(),
        Some(TerminationReason::Dispatched(ActionKind::Extension))
    );
}

#[tokio::test]
async fn test_runner_hangs_up_even_when_goodbye_cannot_be_synthesized() {
    let synthesizer = StubSynthesizer {
        fail_text: Some("Goodbye."),
        ..StubSynthesizer::instant()
    };
    let runner = live_runner(validated(create_sales_flow()), synthesizer);

    let mut channel = ScriptedChannel::new(vec![digits("0")]);
    let session = runner.run("call-1", &mut channel).await.unwrap();

    assert_eq!(channel.played.len(), 1);
    assert_eq!(
        channel.executed,
        vec![Action::Hangup {
            prompt: Some("goodbye".to_string())
        }]
    );
    assert_eq!(
        session.termination_reason(),
        Some(TerminationReason::Dispatched(ActionKind::Hangup))
    );
}

#[tokio::test]
async fn test_runner_routes_unknown_prompt_to_voicemail() {
    // The runner resolves prompts against a flow that lacks "welcome".
    let mut stale = create_sales_flow();
    stale.prompts.remove("welcome");
    if let Some(main) = stale.menus.get_mut("main") {
        main.prompt = "goodbye".to_string();
    }
    let backend: Arc<dyn CallBackend> = Arc::new(engine());
    let resolver = PromptResolver::new(
        Arc::new(PromptCache::new()),
        Arc::new(StubSynthesizer::instant()),
    );
    let runner = CallRunner::new(backend, validated(stale), resolver);

    let mut channel = ScriptedChannel::new(vec![digits("1")]);
    let session = runner.run("call-1", &mut channel).await.unwrap();

    assert!(channel.played.is_empty());
    assert_eq!(channel.executed, vec![voicemail()]);
    assert_eq!(session.termination_reason(), Some(TerminationReason::InternalFault));
}

#[tokio::test(start_paused = true)]
async fn test_hangup_during_synthesis_ends_call() {
    let synthesizer = StubSynthesizer {
        delay: std::time::Duration::from_secs(60),
        fail_text: None,
    };
    let runner = live_runner(validated(create_sales_flow()), synthesizer);

    let mut channel = ScriptedChannel::new(vec![digits("1")]);
    channel.hangs_up_after = Some(std::time::Duration::from_secs(2));
    let session = runner.run("call-1", &mut channel).await.unwrap();

    assert!(channel.played.is_empty());
    assert!(channel.executed.is_empty());
    assert_eq!(session.termination_reason(), Some(TerminationReason::CallerHangup));
}
