//! The JSON/YAML flow document layout accepted by the management layer and the CLI.
//!
//! Documents are loosely typed on purpose: ids inside maps are optional, prompt
//! text may be a bare string or a `{ text: ... }` object, and a menu's fallback
//! may be a bare action kind (`"voicemail"`) or a full action. [`IntoFlow`]
//! turns a document into the canonical [`Flow`].

use super::conversion::IntoFlow;
use super::definition::*;
use crate::error::FlowError;
use crate::schedule::BusinessHours;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DEFAULT_FALLBACK_QUEUE: &str = "support";

#[derive(Debug, Clone, Deserialize)]
pub struct FlowDocument {
    pub id: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default)]
    pub entry_context: String,
    #[serde(default = "default_backend")]
    pub tts_backend: TtsBackend,
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub prompts: BTreeMap<String, BTreeMap<String, PromptText>>,
    #[serde(default)]
    pub menus: BTreeMap<String, MenuDocument>,
    #[serde(default)]
    pub root_menu: Option<String>,
    #[serde(default)]
    pub business_hours: Option<BusinessHours>,
    #[serde(default)]
    pub after_hours: Option<Action>,
    #[serde(default)]
    pub voicemail_fallback: Option<String>,
    #[serde(default)]
    pub fallback_queue: Option<String>,
    /// Older documents only carry `recording.enabled`.
    #[serde(default)]
    pub recording: Option<LegacyRecording>,
    #[serde(default)]
    pub call_recording: Option<RecordingDocument>,
    #[serde(default = "default_max_call_duration")]
    pub max_call_duration: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt: String,
    #[serde(default = "default_timeout")]
    pub timeout_sec: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub options: BTreeMap<String, Action>,
    #[serde(default)]
    pub fallback_action: Option<FallbackDocument>,
    #[serde(default)]
    pub parent_menu: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PromptText {
    Plain(String),
    Rich { text: String },
}

impl PromptText {
    fn into_text(self) -> String {
        match self {
            PromptText::Plain(text) | PromptText::Rich { text } => text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FallbackDocument {
    Kind(String),
    Action(Action),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRecording {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingDocument {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_recording_format")]
    pub format: String,
}

fn default_tenant() -> String {
    "default".to_string()
}
fn default_backend() -> TtsBackend {
    TtsBackend::Polly
}
fn default_languages() -> Vec<Language> {
    vec![Language::new("en-US", "Joanna")]
}
fn default_max_call_duration() -> u32 {
    300
}
fn default_timeout() -> u32 {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_recording_format() -> String {
    "wav".to_string()
}

impl FlowDocument {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a document, choosing YAML for `.yml`/`.yaml` files and JSON otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| FlowError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    fn convert_fallback(
        menu_id: &str,
        fallback: Option<FallbackDocument>,
        fallback_queue: &str,
    ) -> Result<Action, FlowError> {
        match fallback {
            None => Ok(Action::Voicemail {
                voicemail_box: None,
                context: None,
            }),
            Some(FallbackDocument::Action(action)) => Ok(action),
            Some(FallbackDocument::Kind(kind)) => match kind.as_str() {
                "voicemail" => Ok(Action::Voicemail {
                    voicemail_box: None,
                    context: None,
                }),
                "hangup" => Ok(Action::Hangup { prompt: None }),
                "queue" => Ok(Action::Queue {
                    queue_ref: fallback_queue.to_string(),
                }),
                other => Err(FlowError::Conversion(format!(
                    "menu '{}' has unsupported fallback action '{}'",
                    menu_id, other
                ))),
            },
        }
    }
}

impl IntoFlow for FlowDocument {
    fn into_flow(self) -> Result<Flow, FlowError> {
        let fallback_queue = self
            .fallback_queue
            .as_deref()
            .unwrap_or(DEFAULT_FALLBACK_QUEUE)
            .to_string();

        let prompts = self
            .prompts
            .into_iter()
            .map(|(id, texts)| {
                let text = texts
                    .into_iter()
                    .map(|(lang, text)| (lang, text.into_text()))
                    .collect();
                (id.clone(), Prompt { id, text })
            })
            .collect();

        let mut menus = BTreeMap::new();
        for (key, menu) in self.menus {
            let fallback_action =
                Self::convert_fallback(&key, menu.fallback_action, &fallback_queue)?;
            menus.insert(
                key.clone(),
                Menu {
                    // A declared id that disagrees with its key is kept so validation reports it.
                    id: menu.id.unwrap_or_else(|| key.clone()),
                    prompt: menu.prompt,
                    timeout_sec: menu.timeout_sec,
                    max_retries: menu.max_retries,
                    options: menu.options,
                    fallback_action,
                    parent_menu: menu.parent_menu,
                },
            );
        }

        let mut call_recording = self
            .call_recording
            .map(|r| RecordingPolicy {
                enabled: r.enabled,
                format: r.format,
            })
            .unwrap_or_default();
        if self.recording.is_some_and(|r| r.enabled) {
            call_recording.enabled = true;
        }

        let entry_context = if self.entry_context.is_empty() {
            format!("dp-ivr-{}", self.id)
        } else {
            self.entry_context
        };

        Ok(Flow {
            id: self.id,
            tenant: self.tenant,
            entry_context,
            tts_backend: self.tts_backend,
            languages: self.languages,
            prompts,
            menus,
            root_menu: self.root_menu,
            business_hours: self.business_hours,
            after_hours: self.after_hours,
            voicemail_fallback: self.voicemail_fallback,
            call_recording,
            max_call_duration: self.max_call_duration,
        })
    }
}
