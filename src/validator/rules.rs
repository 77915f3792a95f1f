use super::{ExternalRef, ValidationOptions};
use crate::error::Violation;
use crate::flow::{Action, Flow};
use ahash::AHashSet;

/// Owner label used for actions that do not belong to a menu.
const FLOW_LEVEL: &str = "(flow)";

pub(super) fn check_flow_header(flow: &Flow, violations: &mut Vec<Violation>) {
    if flow.id.trim().is_empty() {
        violations.push(Violation::MissingFlowId);
    }
    if flow.languages.is_empty() {
        violations.push(Violation::NoLanguages);
    }
    let mut seen = AHashSet::new();
    for language in &flow.languages {
        if !seen.insert(language.code.as_str()) {
            violations.push(Violation::DuplicateLanguage(language.code.clone()));
        }
    }
}

pub(super) fn resolve_root(flow: &Flow, violations: &mut Vec<Violation>) -> Option<String> {
    if flow.menus.is_empty() {
        violations.push(Violation::NoMenus);
        return None;
    }
    if let Some(root) = &flow.root_menu {
        if flow.menus.contains_key(root) {
            return Some(root.clone());
        }
        violations.push(Violation::RootMenuNotFound(root.clone()));
        return None;
    }
    let parentless: Vec<String> = flow
        .menus
        .iter()
        .filter(|(_, menu)| menu.parent_menu.is_none())
        .map(|(id, _)| id.clone())
        .collect();
    match parentless.as_slice() {
        [] => {
            violations.push(Violation::NoRootMenu);
            None
        }
        [root] => Some(root.clone()),
        _ => {
            violations.push(Violation::AmbiguousRootMenu(parentless));
            None
        }
    }
}

pub(super) fn check_menus(flow: &Flow, violations: &mut Vec<Violation>) {
    for (key, menu) in &flow.menus {
        if menu.id != *key {
            violations.push(Violation::MenuIdMismatch {
                key: key.clone(),
                declared: menu.id.clone(),
            });
        }
        if menu.timeout_sec == 0 {
            violations.push(Violation::InvalidTimeout {
                menu_id: key.clone(),
            });
        }
        if !flow.prompts.contains_key(&menu.prompt) {
            violations.push(Violation::PromptNotFound {
                menu_id: key.clone(),
                prompt_id: menu.prompt.clone(),
            });
        }
        if let Some(parent) = &menu.parent_menu {
            if !flow.menus.contains_key(parent) {
                violations.push(Violation::ParentNotFound {
                    menu_id: key.clone(),
                    parent: parent.clone(),
                });
            }
        }
        for option_key in menu.options.keys() {
            if !is_dtmf_key(option_key) {
                violations.push(Violation::InvalidOptionKey {
                    menu_id: key.clone(),
                    key: option_key.clone(),
                });
            }
        }
    }
}

pub fn is_dtmf_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit() || c == '*' || c == '#')
}

/// Checks every action's targets and collects the external references it routes to.
pub(super) fn check_actions(flow: &Flow, violations: &mut Vec<Violation>) -> Vec<ExternalRef> {
    let mut refs = Vec::new();
    for (menu_id, menu) in &flow.menus {
        for (key, action) in &menu.options {
            check_action(flow, menu_id, key, action, violations, &mut refs);
        }
        check_action(
            flow,
            menu_id,
            "fallback",
            &menu.fallback_action,
            violations,
            &mut refs,
        );
    }
    // Faults, over-long calls and the default after-hours action all end here.
    check_action(
        flow,
        FLOW_LEVEL,
        "after_hours",
        &flow.after_hours_action(),
        violations,
        &mut refs,
    );
    check_action(
        flow,
        FLOW_LEVEL,
        "voicemail_fallback",
        &Action::voicemail_fallback(flow),
        violations,
        &mut refs,
    );
    refs.sort();
    refs.dedup();
    refs
}

fn check_action(
    flow: &Flow,
    menu_id: &str,
    key: &str,
    action: &Action,
    violations: &mut Vec<Violation>,
    refs: &mut Vec<ExternalRef>,
) {
    let missing = |action: &'static str, field: &'static str| Violation::MissingActionField {
        menu_id: menu_id.to_string(),
        key: key.to_string(),
        action,
        field,
    };
    let check_prompt = |prompt: &Option<String>, violations: &mut Vec<Violation>| {
        if let Some(prompt_id) = prompt {
            if !flow.prompts.contains_key(prompt_id) {
                violations.push(Violation::PromptNotFound {
                    menu_id: menu_id.to_string(),
                    prompt_id: prompt_id.clone(),
                });
            }
        }
    };
    let check_menu = |target: &str, violations: &mut Vec<Violation>| {
        if !flow.menus.contains_key(target) {
            violations.push(Violation::MenuNotFound {
                menu_id: menu_id.to_string(),
                key: key.to_string(),
                target: target.to_string(),
            });
        }
    };

    match action.resolved(flow) {
        Action::Menu { menu_ref } => {
            if menu_ref.is_empty() {
                violations.push(missing("menu", "menu_ref"));
            } else {
                check_menu(&menu_ref, violations);
            }
        }
        Action::Queue { queue_ref } => {
            if queue_ref.is_empty() {
                violations.push(missing("queue", "queue_ref"));
            } else {
                refs.push(ExternalRef::Queue(queue_ref));
            }
        }
        Action::Extension { context, extension } => {
            if context.is_empty() {
                violations.push(missing("extension", "context"));
            }
            if extension.is_empty() {
                violations.push(missing("extension", "extension"));
            }
            if !context.is_empty() && !extension.is_empty() {
                refs.push(ExternalRef::Extension { context, extension });
            }
        }
        Action::Voicemail {
            voicemail_box,
            context,
        } => match voicemail_box {
            Some(voicemail_box) if voicemail_box.is_empty() => {
                violations.push(missing("voicemail", "voicemail_box"));
            }
            Some(voicemail_box) => refs.push(ExternalRef::Voicemail {
                voicemail_box,
                context: context.unwrap_or_else(|| flow.tenant.clone()),
            }),
            // No box anywhere: the telephony platform's default mailbox takes the call.
            None => {}
        },
        Action::Hangup { prompt } => check_prompt(&prompt, violations),
        Action::Transfer { destination, .. } => {
            if destination.is_empty() {
                violations.push(missing("transfer", "destination"));
            } else {
                refs.push(ExternalRef::Transfer(destination));
            }
        }
        Action::Language {
            language,
            prompt,
            menu_ref,
            ..
        } => {
            if flow.language(&language).is_none() {
                violations.push(Violation::UndeclaredLanguage {
                    menu_id: menu_id.to_string(),
                    key: key.to_string(),
                    language,
                });
            }
            check_prompt(&prompt, violations);
            if let Some(target) = menu_ref {
                check_menu(&target, violations);
            }
        }
        Action::Back => {}
    }
}

pub(super) fn check_translations(
    flow: &Flow,
    options: &ValidationOptions,
    violations: &mut Vec<Violation>,
) {
    let default_code = flow.default_language().map(|l| l.code.as_str());
    for prompt in flow.prompts.values() {
        for language in &flow.languages {
            if prompt.text.contains_key(&language.code) {
                continue;
            }
            let covered = options.default_language_fallback
                && default_code.is_some_and(|code| prompt.text.contains_key(code));
            if !covered {
                violations.push(Violation::MissingTranslation {
                    prompt_id: prompt.id.clone(),
                    language: language.code.clone(),
                });
            }
        }
    }
}
