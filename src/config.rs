use crate::error::FlowError;
use crate::navigation::RetryPolicy;
use crate::validator::ValidationOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine-wide settings shared by validation, navigation, prompt resolution and compilation.
///
/// Every field has a default, so a config file only needs the values it changes:
///
/// ```yaml
/// retry_policy:
///   invalid_input_consumes_retry: false
/// default_language_fallback: true
/// cache_dir: /var/cache/annai/tts
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry_policy: RetryPolicy,
    /// Use the default language's text when a prompt lacks a translation.
    pub default_language_fallback: bool,
    /// Report unreachable menus as warnings instead of violations.
    pub allow_unreachable_menus: bool,
    /// Root under which per-tenant prompt audio is published.
    pub sounds_dir: PathBuf,
    /// Where synthesized audio is cached, keyed by cache key.
    pub cache_dir: PathBuf,
    /// How long a caller waits on a synthesis before the prompt counts as timed out.
    pub synthesis_timeout_secs: u64,
    /// Pre-recorded audio played when synthesis fails.
    pub fallback_prompt: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            default_language_fallback: false,
            allow_unreachable_menus: false,
            sounds_dir: PathBuf::from("/var/lib/annai/sounds/ivr"),
            cache_dir: PathBuf::from("/var/cache/annai/tts"),
            synthesis_timeout_secs: 30,
            fallback_prompt: None,
        }
    }
}

impl EngineConfig {
    /// Loads a config file, choosing YAML for `.yml`/`.yaml` files and JSON otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| FlowError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Ok(serde_yaml::from_str(&content)?),
            _ => Ok(serde_json::from_str(&content)?),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_default_language_fallback(mut self, enabled: bool) -> Self {
        self.default_language_fallback = enabled;
        self
    }

    pub fn with_unreachable_menus_allowed(mut self, allowed: bool) -> Self {
        self.allow_unreachable_menus = allowed;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_synthesis_timeout(mut self, seconds: u64) -> Self {
        self.synthesis_timeout_secs = seconds;
        self
    }

    pub fn with_fallback_prompt(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_prompt = Some(path.into());
        self
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            default_language_fallback: self.default_language_fallback,
            allow_unreachable_menus: self.allow_unreachable_menus,
        }
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}
