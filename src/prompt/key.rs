use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Extension of cached prompt audio files.
pub const AUDIO_EXTENSION: &str = "wav";

/// Content address of a synthesized prompt: `<backend>_<sha256 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recognizes a key in a cached file's stem, e.g. `polly_<64 hex digits>`.
    pub fn parse(raw: &str) -> Option<CacheKey> {
        let (backend, digest) = raw.rsplit_once('_')?;
        let well_formed = !backend.is_empty()
            && digest.len() == 64
            && digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        well_formed.then(|| CacheKey(raw.to_string()))
    }

    /// File name of the cached audio for this key.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the cache key for one rendering of a prompt.
///
/// Every input is length-prefixed before hashing, so shifting characters between
/// fields (`"ab" + "c"` vs `"a" + "bc"`) yields a different key.
pub fn resolve_key(backend: &str, voice: &str, language: &str, text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    for part in [backend, voice, language, text] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    CacheKey(format!("{}_{}", backend, hex::encode(hasher.finalize())))
}
