//! Integration tests for Annai
//!
//! End-to-end tests that run the same calls through the live engine and the
//! compiled dialplan VM, and exercise deployment across redeploys.
mod common;
use annai::backend::{BackendChoice, CallBackend, load_backend};
use annai::config::EngineConfig;
use annai::data::CallScript;
use annai::dialplan::{CompileOptions, DialplanArtifact, DialplanVm, compile};
use annai::flow::{Action, Flow, FlowDocument, FlowRegistry, FlowStore, IntoFlow, MemoryFlowStore};
use annai::navigation::{CallEvent, CallState, RetryPolicy, SessionArena};
use annai::trace::TraceFormatter;
use chrono::{DateTime, Utc};
use common::*;
use std::sync::Arc;

/// Runs `events` through both backends and checks every effect batch and state matches.
fn assert_parity(flow: Flow, config: &EngineConfig, start: DateTime<Utc>, events: &[CallEvent]) {
    let flow = validated(flow);
    let live = load_backend(BackendChoice::Live, Arc::clone(&flow), config);
    let compiled = load_backend(BackendChoice::Compiled, flow, config);

    let (live_session, live_batches) = run_call(live.as_ref(), start, events);
    let (vm_session, vm_batches) = run_call(compiled.as_ref(), start, events);

    assert_eq!(live_batches, vm_batches, "effects diverged for {:?}", events);
    assert_eq!(live_session.state, vm_session.state);
    assert_eq!(live_session.language, vm_session.language);
    assert_eq!(live_session.history, vm_session.history);
    let states = |s: &annai::navigation::CallSession| {
        s.trace.iter().map(|e| e.state.clone()).collect::<Vec<_>>()
    };
    assert_eq!(states(&live_session), states(&vm_session));
}

#[test]
fn test_live_and_compiled_backends_agree() {
    let config = EngineConfig::default();
    let scripts: Vec<Vec<CallEvent>> = vec![
        vec![digits("1")],
        vec![CallEvent::Timeout; 3],
        vec![digits("9"); 3],
        vec![digits("2"), digits("9"), digits("2"), digits("1")],
        vec![digits("2"), CallEvent::Timeout, CallEvent::Timeout, CallEvent::Timeout],
        vec![CallEvent::Timeout, digits("3"), digits("7"), digits("0")],
        vec![digits("3"), digits("2"), digits("9"), CallEvent::Hangup],
        vec![digits("2"), digits("77"), CallEvent::Hangup],
    ];
    for events in &scripts {
        assert_parity(create_sales_flow(), &config, monday_morning(), events);
    }
}

#[test]
fn test_parity_with_free_invalid_input() {
    let config = EngineConfig::default().with_retry_policy(RetryPolicy {
        invalid_input_consumes_retry: false,
    });
    let events = vec![digits("8"), CallEvent::Timeout, digits("8"), CallEvent::Timeout, CallEvent::Timeout];
    assert_parity(create_sales_flow(), &config, monday_morning(), &events);
}

#[test]
fn test_parity_after_hours() {
    let config = EngineConfig::default();
    let mut flow = create_sales_flow();
    flow.business_hours = Some(new_york_office_hours());
    assert_parity(flow.clone(), &config, monday_evening(), &[]);

    flow.after_hours = Some(Action::Menu {
        menu_ref: "support".to_string(),
    });
    let events = vec![digits("9"), digits("9"), CallEvent::Timeout];
    assert_parity(flow.clone(), &config, monday_evening(), &events);
    assert_parity(flow, &config, monday_morning(), &[digits("2"), digits("1")]);
}

#[test]
fn test_parity_language_option_into_submenu() {
    let mut flow = create_sales_flow();
    flow.menus.get_mut("main").unwrap().options.insert(
        "4".to_string(),
        Action::Language {
            language: "es-US".to_string(),
            prompt: Some("goodbye".to_string()),
            menu_ref: Some("support".to_string()),
            reprompt: false,
        },
    );
    flow.menus.get_mut("support").unwrap().options.insert(
        "5".to_string(),
        Action::Language {
            language: "en-US".to_string(),
            prompt: None,
            menu_ref: None,
            reprompt: false,
        },
    );
    let events = vec![digits("4"), digits("5"), CallEvent::Timeout, digits("9")];
    assert_parity(flow, &EngineConfig::default(), monday_morning(), &events);
}

#[test]
fn test_parity_duration_limit() {
    let mut flow = create_sales_flow();
    flow.max_call_duration = 12;
    let events = vec![CallEvent::Timeout, digits("2"), digits("1")];
    assert_parity(flow, &EngineConfig::default(), monday_morning(), &events);
}

#[test]
fn test_loaded_artifact_runs_like_compiled_flow() {
    let flow = validated(create_sales_flow());
    let artifact = compile(&flow, &CompileOptions::default());
    let loaded = DialplanArtifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();

    let original = DialplanVm::new(Arc::new(artifact));
    let reloaded = DialplanVm::new(Arc::new(loaded));
    let events = vec![digits("2"), CallEvent::Timeout, digits("1")];
    let (a, a_effects) = run_call(&original, monday_morning(), &events);
    let (b, b_effects) = run_call(&reloaded, monday_morning(), &events);
    assert_eq!(a_effects, b_effects);
    assert_eq!(a.state, b.state);
}

#[test]
fn test_scripted_call_from_yaml_document() {
    let flow = FlowDocument::from_yaml(SALES_FLOW_YAML).unwrap().into_flow().unwrap();
    let config = EngineConfig::default();
    let backend = load_backend(BackendChoice::Compiled, validated(flow), &config);

    let script = CallScript::from_inputs(monday_morning(), ["timeout", "2", "1"], 4);
    let (mut session, _) = backend.start(&script.call_id, script.started_at);
    for (at, event) in script.events() {
        backend.handle(&mut session, event, at).unwrap();
    }
    let action = backend.hand_off(&mut session, monday_morning()).unwrap();

    assert_eq!(
        action,
        Action::Extension {
            context: "billing".to_string(),
            extension: "200".to_string()
        }
    );
    assert_eq!(TraceFormatter::format_path(&session), "main > support");
    assert!(TraceFormatter::format_trace(&session).contains("handoff"));
}

#[test]
fn test_redeploy_keeps_running_calls_on_their_snapshot() {
    let registry = FlowRegistry::new();
    let config = EngineConfig::default();
    let mut arena = SessionArena::new();
    let now = monday_morning();

    let v1 = registry.deploy(create_sales_flow(), &config).unwrap();
    assert_eq!(v1.version, 1);
    let backend_v1 = load_backend(BackendChoice::Live, registry.current("sales").unwrap(), &config);
    arena.start(backend_v1, "early", now).unwrap();

    let mut changed = create_sales_flow();
    changed.menus.get_mut("main").unwrap().options.insert(
        "1".to_string(),
        Action::Queue {
            queue_ref: "sales_priority".to_string(),
        },
    );
    let v2 = registry.deploy(changed, &config).unwrap();
    assert_eq!(v2.version, 2);
    let backend_v2 = load_backend(BackendChoice::Compiled, registry.current("sales").unwrap(), &config);
    arena.start(backend_v2, "late", now).unwrap();

    arena.handle("early", digits("1"), now).unwrap();
    arena.handle("late", digits("1"), now).unwrap();
    let queue = |name: &str| {
        CallState::Dispatching(Action::Queue {
            queue_ref: name.to_string(),
        })
    };
    assert_eq!(arena.session("early").unwrap().state, queue("sales_q"));
    assert_eq!(arena.session("late").unwrap().state, queue("sales_priority"));

    assert_eq!(
        registry.version("sales", 1).unwrap().flow().menus["main"].options["1"],
        Action::Queue {
            queue_ref: "sales_q".to_string()
        }
    );
    assert!(registry.version("sales", 3).is_err());
}

#[test]
fn test_deploy_from_store_uses_latest_version() {
    let store = MemoryFlowStore::new();
    store.save(create_sales_flow());
    let mut newer = create_sales_flow();
    newer.max_call_duration = 60;
    assert_eq!(store.save(newer), 2);

    let registry = FlowRegistry::new();
    let deployment = tokio_test::block_on(registry.deploy_from_store(
        &store,
        "sales",
        &EngineConfig::default(),
    ))
    .unwrap();
    assert_eq!(deployment.flow.flow().max_call_duration, 60);

    let first = tokio_test::block_on(store.load_version("sales", 1)).unwrap();
    assert_eq!(first.max_call_duration, 300);
    assert!(tokio_test::block_on(store.load("billing")).is_err());
}

#[test]
fn test_invalid_flow_is_never_deployed() {
    let registry = FlowRegistry::new();
    let mut broken = create_sales_flow();
    broken.menus.get_mut("main").unwrap().prompt = "missing".to_string();

    assert!(registry.deploy(broken, &EngineConfig::default()).is_err());
    assert!(registry.current("sales").is_err());
}
