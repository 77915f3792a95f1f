use super::cache::PromptCache;
use super::key::resolve_key;
use super::synth::{AudioArtifact, SpeechSynthesizer, SynthesisRequest};
use super::voices::checked_voice;
use crate::config::EngineConfig;
use crate::error::{RuntimeInconsistencyError, SynthesisError};
use crate::flow::TtsBackend;
use crate::validator::ValidatedFlow;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Turns (flow, prompt, language) into playable audio through the cache.
#[derive(Clone)]
pub struct PromptResolver {
    cache: Arc<PromptCache>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    fallback_audio: Option<PathBuf>,
}

impl PromptResolver {
    pub fn new(cache: Arc<PromptCache>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            cache,
            synthesizer,
            fallback_audio: None,
        }
    }

    /// Builds a resolver over the configured cache directory, loading the audio
    /// already stored there. Waits are bounded by the configured synthesis timeout.
    pub fn from_config(config: &EngineConfig, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        let cache = PromptCache::new()
            .with_wait_timeout(config.synthesis_timeout())
            .with_dir(&config.cache_dir);
        if let Err(e) = cache.warm() {
            tracing::warn!(
                dir = %config.cache_dir.display(),
                error = %e,
                "Could not read prompt cache directory"
            );
        }
        Self {
            cache: Arc::new(cache),
            synthesizer,
            fallback_audio: config.fallback_prompt.clone(),
        }
    }

    pub fn with_fallback_audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_audio = Some(path.into());
        self
    }

    pub fn cache(&self) -> &Arc<PromptCache> {
        &self.cache
    }

    /// Picks text and voice for a prompt in the session language and derives its key.
    pub fn request(
        &self,
        flow: &ValidatedFlow,
        prompt_id: &str,
        language: &str,
    ) -> Result<SynthesisRequest, RuntimeInconsistencyError> {
        let text = flow.prompt_text(prompt_id, language)?;
        let backend = flow.flow().tts_backend;
        let declared = flow.voice_for(language);
        let voice = match backend {
            TtsBackend::Polly => checked_voice(language, declared),
            TtsBackend::Local => declared,
        };
        let key = resolve_key(backend.as_str(), voice, language, text);
        Ok(SynthesisRequest {
            destination: self.cache.audio_path(&key),
            key,
            backend,
            voice: voice.to_string(),
            language: language.to_string(),
            text: text.to_string(),
        })
    }

    pub async fn resolve(
        &self,
        flow: &ValidatedFlow,
        prompt_id: &str,
        language: &str,
    ) -> Result<AudioArtifact, SynthesisError> {
        let request = self.request(flow, prompt_id, language)?;
        self.cache
            .get_or_synthesize(&request.key, &request, self.synthesizer.as_ref())
            .await
    }

    /// Like [`resolve`](Self::resolve), but a failed synthesis yields the fallback
    /// audio when one is configured.
    pub async fn resolve_or_fallback(
        &self,
        flow: &ValidatedFlow,
        prompt_id: &str,
        language: &str,
    ) -> Result<AudioArtifact, SynthesisError> {
        match self.resolve(flow, prompt_id, language).await {
            Err(SynthesisError::Inconsistent(e)) => Err(SynthesisError::Inconsistent(e)),
            Err(e) => match &self.fallback_audio {
                Some(location) => {
                    tracing::warn!(prompt_id, language, error = %e, "Playing fallback prompt");
                    Ok(AudioArtifact {
                        location: location.clone(),
                        created_at: Utc::now(),
                    })
                }
                None => Err(e),
            },
            ok => ok,
        }
    }

    /// Synthesizes every prompt in every declared language concurrently.
    /// Returns the failures; successful renderings land in the cache.
    pub async fn prefetch(&self, flow: Arc<ValidatedFlow>) -> Vec<SynthesisError> {
        let mut tasks = JoinSet::new();
        for prompt_id in flow.flow().prompts.keys() {
            for language in &flow.flow().languages {
                let resolver = self.clone();
                let flow = Arc::clone(&flow);
                let prompt_id = prompt_id.clone();
                let language = language.code.clone();
                tasks.spawn(async move { resolver.resolve(&flow, &prompt_id, &language).await });
            }
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(SynthesisError::Abandoned(e.to_string())),
            }
        }
        tracing::info!(
            flow_id = %flow.id(),
            cached = self.cache.entries().len(),
            failed = failures.len(),
            "Prefetched flow prompts"
        );
        failures
    }
}
