use super::instruction::{Block, Target, Terminal};
use crate::error::{ArtifactError, RuntimeInconsistencyError};
use crate::flow::{Language, MenuId, PromptId, RecordingPolicy};
use crate::navigation::RetryPolicy;
use crate::prompt::CacheKey;
use crate::schedule::BusinessHours;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};

/// Bumped whenever the artifact layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// The compiled blocks of one menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuBlock {
    pub id: MenuId,
    pub prompt: PromptId,
    pub timeout_sec: u32,
    pub max_retries: u32,
    pub parent_menu: Option<MenuId>,
    pub entry: Block,
    pub present: Block,
    pub listen: Block,
    pub reprompt: Block,
    /// One block per option key.
    pub options: BTreeMap<String, Block>,
    pub timeout: Block,
    pub invalid: Block,
    pub fallback: Block,
}

/// A deployable, self-contained dialplan compiled from a validated flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialplanArtifact {
    pub format_version: u32,
    pub flow_id: String,
    pub tenant: String,
    pub entry_context: String,
    pub root_menu: MenuId,
    pub default_language: String,
    pub languages: Vec<Language>,
    pub retry_policy: RetryPolicy,
    pub schedule: Option<BusinessHours>,
    pub max_call_duration: u32,
    pub recording: RecordingPolicy,
    pub voicemail_fallback: Terminal,
    /// Where this flow's prompt audio is published.
    pub sounds_dir: String,
    /// Cache key of every prompt rendering, by prompt id then language.
    pub prompt_audio: BTreeMap<PromptId, BTreeMap<String, CacheKey>>,
    pub entry: Block,
    pub menus: BTreeMap<MenuId, MenuBlock>,
    pub after_hours: Block,
    /// SHA-256 over the encoded artifact with this field empty.
    pub fingerprint: String,
}

impl DialplanArtifact {
    pub fn menu(&self, id: &str) -> Result<&MenuBlock, RuntimeInconsistencyError> {
        self.menus
            .get(id)
            .ok_or_else(|| RuntimeInconsistencyError::UnknownMenu(id.to_string()))
    }

    pub fn block(&self, target: &Target) -> Result<&Block, RuntimeInconsistencyError> {
        let missing = || RuntimeInconsistencyError::UnknownBlock(target.to_string());
        match target {
            Target::AfterHours => Ok(&self.after_hours),
            Target::Entry(menu) => self.menus.get(menu).map(|m| &m.entry).ok_or_else(missing),
            Target::Present(menu) => self.menus.get(menu).map(|m| &m.present).ok_or_else(missing),
            Target::Listen(menu) => self.menus.get(menu).map(|m| &m.listen).ok_or_else(missing),
            Target::Reprompt(menu) => self.menus.get(menu).map(|m| &m.reprompt).ok_or_else(missing),
            Target::Fallback(menu) => self.menus.get(menu).map(|m| &m.fallback).ok_or_else(missing),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        encode_to_vec(self, standard()).map_err(|e| ArtifactError::Serialization(e.to_string()))
    }

    /// Deserializes an artifact, rejecting other format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: Self = decode_from_slice(bytes, standard())
            .map(|(artifact, _)| artifact)
            .map_err(|e| ArtifactError::Serialization(e.to_string()))?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: artifact.format_version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(artifact)
    }

    /// Saves the artifact to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let io_error = |e: std::io::Error| ArtifactError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::create(path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        Ok(())
    }

    pub fn from_file(path: &str) -> Result<Self, ArtifactError> {
        let io_error = |e: std::io::Error| ArtifactError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::open(path).map_err(io_error)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_error)?;
        Self::from_bytes(&bytes)
    }

    pub fn compute_fingerprint(&self) -> Result<String, ArtifactError> {
        let mut unsigned = self.clone();
        unsigned.fingerprint.clear();
        let bytes = unsigned.to_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn verify_fingerprint(&self) -> Result<bool, ArtifactError> {
        Ok(self.compute_fingerprint()? == self.fingerprint)
    }
}
