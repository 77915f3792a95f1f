use crate::schedule::BusinessHours;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type MenuId = String;
pub type PromptId = String;

/// Default ring time, in seconds, for a `transfer` action without an explicit timeout.
pub const DEFAULT_TRANSFER_TIMEOUT: u32 = 30;

/// The complete, canonical definition of an IVR flow, ready for validation.
/// This is the target structure for any custom document conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub tenant: String,
    pub entry_context: String,
    pub tts_backend: TtsBackend,
    /// Ordered; the first entry is the default language.
    pub languages: Vec<Language>,
    pub prompts: BTreeMap<PromptId, Prompt>,
    pub menus: BTreeMap<MenuId, Menu>,
    /// Explicit root. When `None` the unique menu without a parent is the root.
    pub root_menu: Option<MenuId>,
    pub business_hours: Option<BusinessHours>,
    /// What happens to a call entering a menu while the business is closed.
    /// `None` means voicemail to the flow's fallback box.
    pub after_hours: Option<Action>,
    pub voicemail_fallback: Option<String>,
    pub call_recording: RecordingPolicy,
    /// Call-wide ceiling in seconds.
    pub max_call_duration: u32,
}

impl Flow {
    /// Creates an empty flow with the defaults a flow document would get.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tenant: "default".to_string(),
            entry_context: format!("dp-ivr-{}", id),
            tts_backend: TtsBackend::Polly,
            languages: vec![Language::new("en-US", "Joanna")],
            prompts: BTreeMap::new(),
            menus: BTreeMap::new(),
            root_menu: None,
            business_hours: None,
            after_hours: None,
            voicemail_fallback: None,
            call_recording: RecordingPolicy::default(),
            max_call_duration: 300,
        }
    }

    pub fn default_language(&self) -> Option<&Language> {
        self.languages.first()
    }

    pub fn language(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == code)
    }

    pub fn menu(&self, id: &str) -> Option<&Menu> {
        self.menus.get(id)
    }

    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.get(id)
    }

    /// The action applied when the business is closed.
    pub fn after_hours_action(&self) -> Action {
        self.after_hours.clone().unwrap_or(Action::Voicemail {
            voicemail_box: None,
            context: None,
        })
    }
}

/// A spoken language offered by the flow and the voice used to synthesize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub voice: String,
}

impl Language {
    pub fn new(code: &str, voice: &str) -> Self {
        Self {
            code: code.to_string(),
            voice: voice.to_string(),
        }
    }
}

/// The speech-synthesis engine family used to render prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    Polly,
    Local,
}

impl TtsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsBackend::Polly => "polly",
            TtsBackend::Local => "local",
        }
    }
}

impl fmt::Display for TtsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingPolicy {
    pub enabled: bool,
    pub format: String,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            format: "wav".to_string(),
        }
    }
}

/// A piece of spoken text, translated per language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub text: BTreeMap<String, String>,
}

impl Prompt {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            text: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, language: &str, text: &str) -> Self {
        self.text.insert(language.to_string(), text.to_string());
        self
    }
}

/// One DTMF decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub id: MenuId,
    pub prompt: PromptId,
    pub timeout_sec: u32,
    pub max_retries: u32,
    /// Keyed by the digit sequence the caller types.
    pub options: BTreeMap<String, Action>,
    pub fallback_action: Action,
    pub parent_menu: Option<MenuId>,
}

impl Menu {
    pub fn new(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            timeout_sec: 5,
            max_retries: 3,
            options: BTreeMap::new(),
            fallback_action: Action::Voicemail {
                voicemail_box: None,
                context: None,
            },
            parent_menu: None,
        }
    }

    pub fn with_option(mut self, key: &str, action: Action) -> Self {
        self.options.insert(key.to_string(), action);
        self
    }
}

/// The effect of choosing a menu option. Only navigational kinds keep the call in the menu tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Menu {
        menu_ref: MenuId,
    },
    Queue {
        queue_ref: String,
    },
    Extension {
        context: String,
        extension: String,
    },
    Voicemail {
        #[serde(default)]
        voicemail_box: Option<String>,
        #[serde(default)]
        context: Option<String>,
    },
    Hangup {
        #[serde(default)]
        prompt: Option<PromptId>,
    },
    Transfer {
        destination: String,
        #[serde(default)]
        timeout: Option<u32>,
    },
    Language {
        language: String,
        #[serde(default)]
        prompt: Option<PromptId>,
        #[serde(default)]
        menu_ref: Option<MenuId>,
        #[serde(default = "default_reprompt")]
        reprompt: bool,
    },
    Back,
}

fn default_reprompt() -> bool {
    true
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Menu { .. } => ActionKind::Menu,
            Action::Queue { .. } => ActionKind::Queue,
            Action::Extension { .. } => ActionKind::Extension,
            Action::Voicemail { .. } => ActionKind::Voicemail,
            Action::Hangup { .. } => ActionKind::Hangup,
            Action::Transfer { .. } => ActionKind::Transfer,
            Action::Language { .. } => ActionKind::Language,
            Action::Back => ActionKind::Back,
        }
    }

    /// Whether choosing this action hands the call over to the telephony engine.
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// The menu this action navigates to, if it names one.
    pub fn menu_target(&self) -> Option<&str> {
        match self {
            Action::Menu { menu_ref } => Some(menu_ref),
            Action::Language {
                menu_ref: Some(menu_ref),
                ..
            } => Some(menu_ref),
            _ => None,
        }
    }

    /// Fills in the defaults a terminal action inherits from its flow.
    pub fn resolved(&self, flow: &Flow) -> Action {
        match self {
            Action::Voicemail {
                voicemail_box,
                context,
            } => Action::Voicemail {
                voicemail_box: voicemail_box
                    .clone()
                    .or_else(|| flow.voicemail_fallback.clone()),
                context: context.clone().or_else(|| Some(flow.tenant.clone())),
            },
            Action::Transfer {
                destination,
                timeout,
            } => Action::Transfer {
                destination: destination.clone(),
                timeout: Some(timeout.unwrap_or(DEFAULT_TRANSFER_TIMEOUT)),
            },
            other => other.clone(),
        }
    }

    /// The voicemail action a faulted or over-long call is routed to.
    pub fn voicemail_fallback(flow: &Flow) -> Action {
        Action::Voicemail {
            voicemail_box: None,
            context: None,
        }
        .resolved(flow)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Menu { menu_ref } => write!(f, "menu({})", menu_ref),
            Action::Queue { queue_ref } => write!(f, "queue({})", queue_ref),
            Action::Extension { context, extension } => {
                write!(f, "extension({}@{})", extension, context)
            }
            Action::Voicemail {
                voicemail_box,
                context,
            } => write!(
                f,
                "voicemail({}@{})",
                voicemail_box.as_deref().unwrap_or("fallback"),
                context.as_deref().unwrap_or("tenant")
            ),
            Action::Hangup { .. } => write!(f, "hangup"),
            Action::Transfer {
                destination,
                timeout,
            } => write!(
                f,
                "transfer({}, {}s)",
                destination,
                timeout.unwrap_or(DEFAULT_TRANSFER_TIMEOUT)
            ),
            Action::Language { language, .. } => write!(f, "language({})", language),
            Action::Back => write!(f, "back"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Menu,
    Queue,
    Extension,
    Voicemail,
    Hangup,
    Transfer,
    Language,
    Back,
}

impl ActionKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionKind::Queue
                | ActionKind::Extension
                | ActionKind::Voicemail
                | ActionKind::Hangup
                | ActionKind::Transfer
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Menu => "menu",
            ActionKind::Queue => "queue",
            ActionKind::Extension => "extension",
            ActionKind::Voicemail => "voicemail",
            ActionKind::Hangup => "hangup",
            ActionKind::Transfer => "transfer",
            ActionKind::Language => "language",
            ActionKind::Back => "back",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
