//! Structural and referential validation of IVR flows.
//!
//! [`validate`] consumes a [`Flow`] and either returns a [`ValidatedFlow`], the
//! only form the navigation engine and the dialplan compiler accept, or a
//! [`ValidationError`] listing every defect found.

mod directory;
mod reachability;
mod rules;

pub use directory::{DirectoryService, verify_external_references};
pub use rules::is_dtmf_key;

use crate::error::{RuntimeInconsistencyError, ValidationError, Violation};
use crate::flow::{Flow, Language, Menu, MenuId, Prompt};
use crate::schedule::Schedule;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// A prompt missing a translation may use the default language's text.
    pub default_language_fallback: bool,
    /// Unreachable menus become warnings instead of violations.
    pub allow_unreachable_menus: bool,
}

/// A resource owned by the telephony platform that a flow routes calls to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExternalRef {
    Queue(String),
    Extension { context: String, extension: String },
    Voicemail { voicemail_box: String, context: String },
    Transfer(String),
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalRef::Queue(queue) => write!(f, "queue '{}'", queue),
            ExternalRef::Extension { context, extension } => {
                write!(f, "extension '{}@{}'", extension, context)
            }
            ExternalRef::Voicemail {
                voicemail_box,
                context,
            } => write!(f, "voicemail box '{}@{}'", voicemail_box, context),
            ExternalRef::Transfer(destination) => write!(f, "transfer destination '{}'", destination),
        }
    }
}

/// A flow that passed validation. Read-only; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFlow {
    flow: Flow,
    root: MenuId,
    default_language: Language,
    external_refs: Vec<ExternalRef>,
    warnings: Vec<String>,
    options: ValidationOptions,
}

impl ValidatedFlow {
    pub fn id(&self) -> &str {
        &self.flow.id
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn into_flow(self) -> Flow {
        self.flow
    }

    pub fn root_menu(&self) -> &str {
        &self.root
    }

    pub fn default_language(&self) -> &Language {
        &self.default_language
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Sorted and de-duplicated.
    pub fn external_refs(&self) -> &[ExternalRef] {
        &self.external_refs
    }

    /// Non-blocking findings such as a malformed schedule.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn menu(&self, id: &str) -> Result<&Menu, RuntimeInconsistencyError> {
        self.flow
            .menu(id)
            .ok_or_else(|| RuntimeInconsistencyError::UnknownMenu(id.to_string()))
    }

    pub fn prompt(&self, id: &str) -> Result<&Prompt, RuntimeInconsistencyError> {
        self.flow
            .prompt(id)
            .ok_or_else(|| RuntimeInconsistencyError::UnknownPrompt(id.to_string()))
    }

    /// The text of a prompt in `language`, falling back to the default language.
    pub fn prompt_text(
        &self,
        prompt_id: &str,
        language: &str,
    ) -> Result<&str, RuntimeInconsistencyError> {
        let prompt = self.prompt(prompt_id)?;
        prompt
            .text
            .get(language)
            .or_else(|| prompt.text.get(&self.default_language.code))
            .map(String::as_str)
            .ok_or_else(|| RuntimeInconsistencyError::UntranslatedPrompt {
                prompt_id: prompt_id.to_string(),
                language: language.to_string(),
            })
    }

    /// The voice declared for `language`, or the default language's voice.
    pub fn voice_for(&self, language: &str) -> &str {
        self.flow
            .language(language)
            .map(|l| l.voice.as_str())
            .unwrap_or(&self.default_language.voice)
    }
}

/// Validates a flow, collecting every violation.
///
/// Violations come back sorted and de-duplicated, so the outcome does not depend
/// on map iteration order and validating the same flow twice gives the same result.
pub fn validate(flow: Flow, options: &ValidationOptions) -> Result<ValidatedFlow, ValidationError> {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    rules::check_flow_header(&flow, &mut violations);
    let root = rules::resolve_root(&flow, &mut violations);
    rules::check_menus(&flow, &mut violations);
    let external_refs = rules::check_actions(&flow, &mut violations);
    rules::check_translations(&flow, options, &mut violations);

    if let Some(root) = &root {
        for menu in reachability::unreachable_menus(&flow, root) {
            if options.allow_unreachable_menus {
                warnings.push(Violation::UnreachableMenu(menu).to_string());
            } else {
                violations.push(Violation::UnreachableMenu(menu));
            }
        }
    }

    if let Some(hours) = &flow.business_hours {
        if let Err(e) = Schedule::parse(hours) {
            warnings.push(e.to_string());
        }
    }

    let violations: Vec<Violation> = violations.into_iter().sorted().dedup().collect();
    let default_language = flow.default_language().cloned();
    match (root, default_language) {
        (Some(root), Some(default_language)) if violations.is_empty() => {
            for warning in &warnings {
                tracing::warn!(flow_id = %flow.id, "{}", warning);
            }
            tracing::debug!(
                flow_id = %flow.id,
                menus = flow.menus.len(),
                external_refs = external_refs.len(),
                "Flow validated"
            );
            Ok(ValidatedFlow {
                flow,
                root,
                default_language,
                external_refs,
                warnings,
                options: *options,
            })
        }
        _ => Err(ValidationError { violations }),
    }
}
