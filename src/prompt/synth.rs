use super::key::CacheKey;
use crate::error::SynthesisError;
use crate::flow::TtsBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Playable audio produced by a synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub location: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Everything an engine needs to render one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub key: CacheKey,
    pub backend: TtsBackend,
    pub voice: String,
    pub language: String,
    pub text: String,
    /// Where the engine should write the audio, when the cache is backed by a directory.
    pub destination: Option<PathBuf>,
}

/// A text-to-speech engine. Failures are reported, never retried by the engine core.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, SynthesisError>;
}
