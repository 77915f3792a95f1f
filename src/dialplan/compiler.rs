use super::artifact::{DialplanArtifact, FORMAT_VERSION, MenuBlock};
use super::instruction::{Block, Instruction, Target, Terminal};
use crate::config::EngineConfig;
use crate::flow::{Action, Flow, Menu, TtsBackend};
use crate::navigation::{Decision, FailureKind, MenuInput, RetryPolicy, decide};
use crate::prompt::{CacheKey, resolve_key, voices};
use crate::validator::ValidatedFlow;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub retry_policy: RetryPolicy,
    /// Root under which `<tenant>/<flow>` prompt directories live.
    pub sounds_dir: PathBuf,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl CompileOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry_policy: config.retry_policy,
            sounds_dir: config.sounds_dir.clone(),
        }
    }

    /// Directory holding the published prompts of one flow.
    pub fn flow_sounds_dir(&self, tenant: &str, flow_id: &str) -> PathBuf {
        self.sounds_dir.join(tenant).join(flow_id)
    }
}

/// Compiles a validated flow into a dialplan artifact.
///
/// Every menu is compiled, reachable or not, and each menu's blocks depend only
/// on that menu, so adding or removing a menu leaves the others untouched.
/// The output is deterministic: no timestamps, ordered maps only.
pub fn compile(flow: &ValidatedFlow, options: &CompileOptions) -> DialplanArtifact {
    let def = flow.flow();
    let menus = def
        .menus
        .iter()
        .map(|(id, menu)| (id.clone(), compile_menu(def, menu, options.retry_policy)))
        .collect();

    let voicemail_fallback = Terminal::from_action(&Action::voicemail_fallback(def)).unwrap_or(
        Terminal::Voicemail {
            voicemail_box: None,
            context: None,
        },
    );

    let mut artifact = DialplanArtifact {
        format_version: FORMAT_VERSION,
        flow_id: def.id.clone(),
        tenant: def.tenant.clone(),
        entry_context: def.entry_context.clone(),
        root_menu: flow.root_menu().to_string(),
        default_language: flow.default_language().code.clone(),
        languages: def.languages.clone(),
        retry_policy: options.retry_policy,
        schedule: def.business_hours.clone(),
        max_call_duration: def.max_call_duration,
        recording: def.call_recording.clone(),
        voicemail_fallback,
        sounds_dir: options
            .flow_sounds_dir(&def.tenant, &def.id)
            .display()
            .to_string(),
        prompt_audio: prompt_audio(flow),
        entry: Block::new(
            "entry",
            vec![Instruction::Goto(Target::Entry(flow.root_menu().to_string()))],
        ),
        menus,
        after_hours: Block::new(
            "after-hours",
            compile_action(def, &def.after_hours_action(), None, true),
        ),
        fingerprint: String::new(),
    };

    match artifact.compute_fingerprint() {
        Ok(fingerprint) => artifact.fingerprint = fingerprint,
        Err(e) => tracing::warn!(flow_id = %def.id, error = %e, "Could not fingerprint dialplan"),
    }
    tracing::info!(
        flow_id = %def.id,
        menus = artifact.menus.len(),
        fingerprint = %artifact.fingerprint,
        "Compiled dialplan"
    );
    artifact
}

fn compile_menu(flow: &Flow, menu: &Menu, policy: RetryPolicy) -> MenuBlock {
    let id = menu.id.clone();
    let label = |part: &str| format!("{}/{}", id, part);
    let listen = Instruction::Listen {
        menu: id.clone(),
        timeout_sec: menu.timeout_sec,
    };
    let arm = Instruction::Arm {
        menu: id.clone(),
        retries: menu.max_retries,
    };
    let play = Instruction::Play {
        prompt: menu.prompt.clone(),
    };

    // Option blocks come from the same decision the live engine makes for that key.
    let options = menu
        .options
        .keys()
        .map(|key| {
            let instructions =
                match decide(menu, MenuInput::Digits(key), menu.max_retries, policy) {
                    Decision::Dispatch(action) => compile_action(flow, &action, Some(id.as_str()), false),
                    Decision::Reprompt { .. } | Decision::Fallback(_) => {
                        vec![Instruction::Fail(FailureKind::Invalid)]
                    }
                };
            (key.clone(), Block::new(label(&format!("option/{}", key)), instructions))
        })
        .collect();

    MenuBlock {
        id: id.clone(),
        prompt: menu.prompt.clone(),
        timeout_sec: menu.timeout_sec,
        max_retries: menu.max_retries,
        parent_menu: menu.parent_menu.clone(),
        entry: Block::new(
            label("entry"),
            vec![
                Instruction::Enter { menu: id.clone() },
                Instruction::CheckHours,
                Instruction::Goto(Target::Present(id.clone())),
            ],
        ),
        present: Block::new(label("present"), vec![arm.clone(), play.clone(), listen.clone()]),
        listen: Block::new(label("listen"), vec![arm, listen.clone()]),
        reprompt: Block::new(label("reprompt"), vec![play, listen]),
        options,
        timeout: Block::new(label("timeout"), vec![Instruction::Fail(FailureKind::Timeout)]),
        invalid: Block::new(label("invalid"), vec![Instruction::Fail(FailureKind::Invalid)]),
        fallback: Block::new(
            label("fallback"),
            compile_action(flow, &menu.fallback_action, Some(id.as_str()), false),
        ),
    }
}

/// Lowers one action. `menu` is the menu the action belongs to, `None` for the
/// shared after-hours block; after-hours actions enter menus without a second
/// hours check.
fn compile_action(
    flow: &Flow,
    action: &Action,
    menu: Option<&str>,
    after_hours: bool,
) -> Vec<Instruction> {
    let enter = |target: &str| {
        if after_hours {
            vec![
                Instruction::Enter {
                    menu: target.to_string(),
                },
                Instruction::Goto(Target::Present(target.to_string())),
            ]
        } else {
            vec![Instruction::Goto(Target::Entry(target.to_string()))]
        }
    };

    match action {
        Action::Menu { menu_ref } => {
            let mut out = vec![Instruction::PushHistory];
            out.extend(enter(menu_ref));
            out
        }
        Action::Language {
            language,
            prompt,
            menu_ref,
            reprompt,
        } => {
            let mut out = vec![Instruction::SetLanguage {
                language: language.clone(),
            }];
            if let Some(prompt) = prompt {
                out.push(Instruction::Play {
                    prompt: prompt.clone(),
                });
            }
            match (menu_ref, menu) {
                (Some(target), _) => {
                    out.push(Instruction::PushHistory);
                    out.extend(enter(target));
                }
                (None, Some(current)) if *reprompt => {
                    out.push(Instruction::Goto(Target::Present(current.to_string())))
                }
                (None, Some(current)) => {
                    out.push(Instruction::Goto(Target::Listen(current.to_string())))
                }
                (None, None) if *reprompt => out.push(Instruction::PresentCurrent),
                (None, None) => out.push(Instruction::ListenCurrent),
            }
            out
        }
        Action::Back => vec![Instruction::Back {
            check_hours: !after_hours,
        }],
        terminal => {
            let resolved = terminal.resolved(flow);
            let mut out = Vec::new();
            if let Action::Hangup {
                prompt: Some(prompt),
            } = &resolved
            {
                out.push(Instruction::Play {
                    prompt: prompt.clone(),
                });
            }
            if let Some(terminal) = Terminal::from_action(&resolved) {
                out.push(Instruction::Dispatch(terminal));
            }
            out
        }
    }
}

/// Cache keys of every prompt in every declared language, as the resolver would derive them.
fn prompt_audio(flow: &ValidatedFlow) -> BTreeMap<String, BTreeMap<String, CacheKey>> {
    let def = flow.flow();
    def.prompts
        .keys()
        .map(|prompt_id| {
            let per_language = def
                .languages
                .iter()
                .filter_map(|language| {
                    let text = flow.prompt_text(prompt_id, &language.code).ok()?;
                    let voice = match def.tts_backend {
                        TtsBackend::Polly => voices::checked_voice(&language.code, &language.voice),
                        TtsBackend::Local => language.voice.as_str(),
                    };
                    let key = resolve_key(def.tts_backend.as_str(), voice, &language.code, text);
                    Some((language.code.clone(), key))
                })
                .collect();
            (prompt_id.clone(), per_language)
        })
        .collect()
}
