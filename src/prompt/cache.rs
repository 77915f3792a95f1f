use super::key::{AUDIO_EXTENSION, CacheKey};
use super::synth::{AudioArtifact, SpeechSynthesizer, SynthesisRequest};
use crate::error::SynthesisError;
use ahash::AHashMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// An immutable record of audio stored under a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub location: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(AudioArtifact),
    Miss,
}

type Outcome = Option<Result<AudioArtifact, SynthesisError>>;

enum Slot {
    Ready(AudioArtifact),
    /// A synthesis is in flight; the receiver yields its outcome.
    Pending(watch::Receiver<Outcome>),
}

enum Role {
    Leader(watch::Sender<Outcome>),
    Waiter(watch::Receiver<Outcome>),
}

/// Prompt audio cache with single-flight synthesis.
///
/// At most one synthesis per key is in flight. Callers arriving while it runs
/// wait for the same outcome, success or failure. Unrelated keys never block
/// each other: the map lock is only held to inspect or update a slot.
///
/// With a directory attached, audio lives at `<dir>/<key>.wav` and survives
/// restarts: [`warm`](Self::warm) registers what is already there.
#[derive(Default)]
pub struct PromptCache {
    slots: Mutex<AHashMap<CacheKey, Slot>>,
    wait_timeout: Option<Duration>,
    dir: Option<PathBuf>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long a caller waits for a synthesis, leader included.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Where the audio for `key` belongs in the cache directory.
    pub fn audio_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(key.file_name(AUDIO_EXTENSION)))
    }

    /// Registers every cached audio file found in the directory. A missing
    /// directory holds nothing yet. Returns how many entries were loaded.
    pub fn warm(&self) -> io::Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut loaded = 0;
        for entry in listing {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(AUDIO_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(CacheKey::parse)
            else {
                continue;
            };
            let created_at = fs::metadata(&path)?
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            self.insert(CacheEntry {
                key,
                location: path,
                created_at,
            });
            loaded += 1;
        }
        tracing::info!(dir = %dir.display(), loaded, "Loaded cached prompt audio");
        Ok(loaded)
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        match self.lock().get(key) {
            Some(Slot::Ready(artifact)) => Lookup::Hit(artifact.clone()),
            _ => Lookup::Miss,
        }
    }

    /// Registers audio that already exists, e.g. found on disk at startup.
    pub fn insert(&self, entry: CacheEntry) {
        self.lock().insert(
            entry.key,
            Slot::Ready(AudioArtifact {
                location: entry.location,
                created_at: entry.created_at,
            }),
        );
    }

    /// Completed entries, sorted by key.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .lock()
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(artifact) => Some(CacheEntry {
                    key: key.clone(),
                    location: artifact.location.clone(),
                    created_at: artifact.created_at,
                }),
                Slot::Pending(_) => None,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Forgets entries created more than `max_age` before `now` and returns them
    /// so the caller can delete the audio files.
    pub fn evict_older_than(&self, max_age: ChronoDuration, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let cutoff = now - max_age;
        let mut slots = self.lock();
        let stale: Vec<CacheKey> = slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(artifact) if artifact.created_at < cutoff => Some(key.clone()),
                _ => None,
            })
            .collect();
        let mut evicted: Vec<CacheEntry> = stale
            .into_iter()
            .filter_map(|key| match slots.remove(&key) {
                Some(Slot::Ready(artifact)) => Some(CacheEntry {
                    key,
                    location: artifact.location,
                    created_at: artifact.created_at,
                }),
                _ => None,
            })
            .collect();
        evicted.sort_by(|a, b| a.key.cmp(&b.key));
        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), "Evicted stale prompt audio");
        }
        evicted
    }

    /// Evicts like [`evict_older_than`](Self::evict_older_than) and deletes the
    /// evicted files that live in the cache directory.
    pub fn purge_older_than(&self, max_age: ChronoDuration, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let evicted = self.evict_older_than(max_age, now);
        if let Some(dir) = &self.dir {
            for entry in evicted.iter().filter(|e| e.location.starts_with(dir)) {
                if let Err(e) = fs::remove_file(&entry.location) {
                    tracing::warn!(
                        path = %entry.location.display(),
                        error = %e,
                        "Could not delete cached prompt audio"
                    );
                }
            }
        }
        evicted
    }

    /// Returns cached audio for `key`, synthesizing it on a miss.
    ///
    /// If the caller driving the synthesis is dropped mid-flight its slot is
    /// released and one of the waiting callers starts a fresh synthesis.
    pub async fn get_or_synthesize(
        &self,
        key: &CacheKey,
        request: &SynthesisRequest,
        synthesizer: &dyn SpeechSynthesizer,
    ) -> Result<AudioArtifact, SynthesisError> {
        loop {
            let role = {
                let mut slots = self.lock();
                match slots.get(key) {
                    Some(Slot::Ready(artifact)) => return Ok(artifact.clone()),
                    Some(Slot::Pending(rx)) => Role::Waiter(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slots.insert(key.clone(), Slot::Pending(rx));
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => return self.lead(key, request, synthesizer, tx).await,
                Role::Waiter(rx) => {
                    if let Some(outcome) = self.wait(key, rx).await? {
                        return outcome;
                    }
                    tracing::debug!(key = %key, "Synthesis leader went away, retrying");
                }
            }
        }
    }

    async fn lead(
        &self,
        key: &CacheKey,
        request: &SynthesisRequest,
        synthesizer: &dyn SpeechSynthesizer,
        tx: watch::Sender<Outcome>,
    ) -> Result<AudioArtifact, SynthesisError> {
        let mut guard = PendingGuard {
            cache: self,
            key,
            armed: true,
        };
        tracing::debug!(key = %key, voice = %request.voice, "Synthesizing prompt");

        let result = match self.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, synthesizer.synthesize(request))
                .await
                .unwrap_or_else(|_| Err(timeout_error(key, limit))),
            None => synthesizer.synthesize(request).await,
        };

        {
            let mut slots = self.lock();
            match &result {
                Ok(artifact) => {
                    slots.insert(key.clone(), Slot::Ready(artifact.clone()));
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Prompt synthesis failed");
                    slots.remove(key);
                }
            }
        }
        guard.armed = false;
        // Nobody waiting is fine.
        let _ = tx.send(Some(result.clone()));
        result
    }

    /// `Ok(None)` means the leader vanished without an outcome.
    async fn wait(
        &self,
        key: &CacheKey,
        mut rx: watch::Receiver<Outcome>,
    ) -> Result<Option<Result<AudioArtifact, SynthesisError>>, SynthesisError> {
        let outcome = async move {
            loop {
                if let Some(outcome) = rx.borrow_and_update().clone() {
                    return Some(outcome);
                }
                if rx.changed().await.is_err() {
                    return rx.borrow().clone();
                }
            }
        };
        match self.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, outcome)
                .await
                .map_err(|_| timeout_error(key, limit)),
            None => Ok(outcome.await),
        }
    }
}

fn timeout_error(key: &CacheKey, limit: Duration) -> SynthesisError {
    SynthesisError::Timeout {
        key: key.to_string(),
        seconds: limit.as_secs(),
    }
}

/// Releases a pending slot if the leading caller is dropped before finishing.
struct PendingGuard<'a> {
    cache: &'a PromptCache,
    key: &'a CacheKey,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.cache.lock();
        if matches!(slots.get(self.key), Some(Slot::Pending(_))) {
            slots.remove(self.key);
        }
    }
}
