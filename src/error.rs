use itertools::Itertools;
use thiserror::Error;

/// A single structural or referential defect found while validating a flow.
#[derive(Error, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Violation {
    #[error("Flow ID is required")]
    MissingFlowId,

    #[error("Flow declares no languages")]
    NoLanguages,

    #[error("Language '{0}' is declared more than once")]
    DuplicateLanguage(String),

    #[error("Flow has no menus")]
    NoMenus,

    #[error("Root menu '{0}' does not exist")]
    RootMenuNotFound(String),

    #[error("No root menu found: every menu declares a parent")]
    NoRootMenu,

    #[error("Ambiguous root menu: menus {0:?} have no parent and no root_menu is set")]
    AmbiguousRootMenu(Vec<String>),

    #[error("Menu stored under key '{key}' declares id '{declared}'")]
    MenuIdMismatch { key: String, declared: String },

    #[error("Menu '{menu_id}' must have a timeout greater than zero")]
    InvalidTimeout { menu_id: String },

    #[error("Menu '{menu_id}' references non-existent prompt '{prompt_id}'")]
    PromptNotFound { menu_id: String, prompt_id: String },

    #[error("Menu '{menu_id}' declares non-existent parent menu '{parent}'")]
    ParentNotFound { menu_id: String, parent: String },

    #[error("Menu '{menu_id}' has an invalid option key '{key}'")]
    InvalidOptionKey { menu_id: String, key: String },

    #[error("Menu '{menu_id}' option '{key}' references non-existent menu '{target}'")]
    MenuNotFound {
        menu_id: String,
        key: String,
        target: String,
    },

    #[error("Menu '{menu_id}' option '{key}' selects undeclared language '{language}'")]
    UndeclaredLanguage {
        menu_id: String,
        key: String,
        language: String,
    },

    #[error("Menu '{menu_id}' option '{key}' {action} action is missing '{field}'")]
    MissingActionField {
        menu_id: String,
        key: String,
        action: &'static str,
        field: &'static str,
    },

    #[error("Prompt '{prompt_id}' has no text for language '{language}'")]
    MissingTranslation { prompt_id: String, language: String },

    #[error("Menu '{0}' is not reachable from the root menu")]
    UnreachableMenu(String),

    #[error("External reference {0} does not exist in the directory")]
    ExternalReferenceNotFound(String),
}

/// Every defect found in a flow. Deployment is refused until the list is empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "flow validation failed with {} violation(s):\n{}",
    .violations.len(),
    bullet_list(.violations)
)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn bullet_list(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("  - {}", v)).join("\n")
}

/// Errors raised while loading or converting a flow document.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Failed to parse flow JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse flow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not read flow file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid flow document: {0}")]
    Conversion(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Malformed business-hours data. Never blocks a call: the schedule is treated as always open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule '{schedule}' uses unknown timezone '{timezone}'")]
    InvalidTimezone { schedule: String, timezone: String },

    #[error("Schedule '{schedule}' uses unknown weekday '{day}'")]
    UnknownWeekday { schedule: String, day: String },

    #[error("Schedule '{schedule}' has malformed interval '{interval}' on {day}")]
    MalformedInterval {
        schedule: String,
        day: String,
        interval: String,
    },

    #[error("Schedule '{schedule}' has overlapping intervals on {day}: '{first}' and '{second}'")]
    OverlappingIntervals {
        schedule: String,
        day: String,
        first: String,
        second: String,
    },
}

/// A lookup failed that validation should have made impossible.
/// The affected call is terminated and routed to voicemail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeInconsistencyError {
    #[error("Menu '{0}' is missing from the validated flow")]
    UnknownMenu(String),

    #[error("Prompt '{0}' is missing from the validated flow")]
    UnknownPrompt(String),

    #[error("Prompt '{prompt_id}' has no text for '{language}' nor the default language")]
    UntranslatedPrompt { prompt_id: String, language: String },

    #[error("Dialplan block '{0}' is missing from the artifact")]
    UnknownBlock(String),

    #[error("Dialplan execution did not settle, last block '{0}'")]
    RunawayDialplan(String),
}

/// A speech-synthesis provider failed or the wait for it was abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Synthesis of '{key}' failed: {message}")]
    Provider { key: String, message: String },

    #[error("Timed out after {seconds}s waiting for synthesis of '{key}'")]
    Timeout { key: String, seconds: u64 },

    #[error("Synthesis of '{0}' was abandoned before completing")]
    Abandoned(String),

    #[error(transparent)]
    Inconsistent(#[from] RuntimeInconsistencyError),
}

/// Errors raised by the call-session arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Call '{0}' is not known to this engine")]
    CallNotFound(String),

    #[error("Call '{0}' already exists")]
    DuplicateCall(String),

    #[error("Call '{0}' has already left the menu tree")]
    CallFinished(String),

    #[error(transparent)]
    Inconsistent(#[from] RuntimeInconsistencyError),
}

/// Errors raised while storing or loading flow versions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Flow '{0}' not found")]
    FlowNotFound(String),

    #[error("Flow '{id}' has no version {version}")]
    VersionNotFound { id: String, version: u32 },
}

/// Errors raised while persisting or loading a compiled dialplan artifact.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Artifact serialization failed: {0}")]
    Serialization(String),

    #[error("Artifact format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Could not access artifact file '{path}': {message}")]
    Io { path: String, message: String },
}
