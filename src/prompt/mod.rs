//! Prompt audio: cache keys, the single-flight cache, voice selection and resolution.

pub mod cache;
pub mod key;
pub mod resolver;
pub mod synth;
pub mod voices;

pub use cache::{CacheEntry, Lookup, PromptCache};
pub use key::{AUDIO_EXTENSION, CacheKey, resolve_key};
pub use resolver::PromptResolver;
pub use synth::{AudioArtifact, SpeechSynthesizer, SynthesisRequest};
