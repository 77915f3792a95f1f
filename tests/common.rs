//! Common test utilities for building flows, clocks and scripted calls.
use annai::backend::CallBackend;
use annai::flow::{Action, Flow, Language, Menu, Prompt};
use annai::navigation::{CallEvent, CallSession, Effect};
use annai::schedule::BusinessHours;
use annai::validator::{ValidatedFlow, ValidationOptions, validate};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

/// The "sales" flow as a YAML document.
#[allow(dead_code)]
pub const SALES_FLOW_YAML: &str = r#"
id: sales
tenant: acme
languages:
  - { code: en-US, voice: Joanna }
  - { code: es-US, voice: Lupe }
voicemail_fallback: "100"
prompts:
  welcome:
    en-US: "Welcome to Acme. Press 1 for sales, 2 for support."
    es-US: "Bienvenido a Acme. Marque 1 para ventas, 2 para soporte."
  support_menu:
    en-US: "Press 1 for billing, 9 to go back."
    es-US: "Marque 1 para facturación, 9 para regresar."
  goodbye:
    en-US: "Goodbye."
    es-US: "Adiós."
menus:
  main:
    prompt: welcome
    options:
      "1": { action: queue, queue_ref: sales_q }
      "2": { action: menu, menu_ref: support }
      "3": { action: language, language: es-US }
      "0": { action: hangup, prompt: goodbye }
    fallback_action: voicemail
  support:
    prompt: support_menu
    parent_menu: main
    options:
      "1": { action: extension, context: billing, extension: "200" }
      "9": { action: back }
    fallback_action: queue
"#;

/// Builds the "sales" flow in code.
///
/// `main`: 1 -> queue `sales_q`, 2 -> `support`, 3 -> Spanish, 0 -> hang up;
/// falls back to voicemail after 3 failures. `support`: 1 -> billing extension,
/// 9 -> back; falls back to the `support` queue.
#[allow(dead_code)]
pub fn create_sales_flow() -> Flow {
    let mut flow = Flow::new("sales");
    flow.tenant = "acme".to_string();
    flow.languages = vec![Language::new("en-US", "Joanna"), Language::new("es-US", "Lupe")];
    flow.voicemail_fallback = Some("100".to_string());

    for (id, en, es) in [
        ("welcome", "Welcome to Acme. Press 1 for sales, 2 for support.", "Bienvenido a Acme. Marque 1 para ventas, 2 para soporte."),
        ("support_menu", "Press 1 for billing, 9 to go back.", "Marque 1 para facturación, 9 para regresar."),
        ("goodbye", "Goodbye.", "Adiós."),
    ] {
        flow.prompts.insert(
            id.to_string(),
            Prompt::new(id).with_text("en-US", en).with_text("es-US", es),
        );
    }

    let main = Menu::new("main", "welcome")
        .with_option("1", Action::Queue { queue_ref: "sales_q".to_string() })
        .with_option("2", Action::Menu { menu_ref: "support".to_string() })
        .with_option(
            "3",
            Action::Language {
                language: "es-US".to_string(),
                prompt: None,
                menu_ref: None,
                reprompt: true,
            },
        )
        .with_option("0", Action::Hangup { prompt: Some("goodbye".to_string()) });

    let mut support = Menu::new("support", "support_menu")
        .with_option(
            "1",
            Action::Extension {
                context: "billing".to_string(),
                extension: "200".to_string(),
            },
        )
        .with_option("9", Action::Back);
    support.parent_menu = Some("main".to_string());
    support.fallback_action = Action::Queue { queue_ref: "support".to_string() };

    flow.menus.insert("main".to_string(), main);
    flow.menus.insert("support".to_string(), support);
    flow
}

/// Validates with default options, panicking on violations.
#[allow(dead_code)]
pub fn validated(flow: Flow) -> Arc<ValidatedFlow> {
    Arc::new(validate(flow, &ValidationOptions::default()).expect("flow should be valid"))
}

/// Monday to Friday, 09:00-17:00 in New York.
#[allow(dead_code)]
pub fn new_york_office_hours() -> BusinessHours {
    ["monday", "tuesday", "wednesday", "thursday", "friday"]
        .into_iter()
        .fold(BusinessHours::new("office", "America/New_York"), |hours, day| {
            hours.with_interval(day, "09:00-17:00")
        })
}

/// Monday 2024-01-08, 10:00 in New York (EST, UTC-5).
#[allow(dead_code)]
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap()
}

/// Monday 2024-01-08, 18:00 in New York.
#[allow(dead_code)]
pub fn monday_evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 23, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn digits(d: &str) -> CallEvent {
    CallEvent::Digits(d.to_string())
}

/// Starts a call at `start` and applies `events` five seconds apart.
/// Returns the session and every batch of effects, the start's first.
#[allow(dead_code)]
pub fn run_call(
    backend: &dyn CallBackend,
    start: DateTime<Utc>,
    events: &[CallEvent],
) -> (CallSession, Vec<Vec<Effect>>) {
    let (mut session, effects) = backend.start("call-1", start);
    let mut batches = vec![effects];
    for (i, event) in events.iter().enumerate() {
        let at = start + Duration::seconds(5 * (i as i64 + 1));
        let effects = backend
            .handle(&mut session, event.clone(), at)
            .expect("event should be accepted");
        batches.push(effects);
    }
    (session, batches)
}
