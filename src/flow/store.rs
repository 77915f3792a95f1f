use super::definition::Flow;
use crate::config::EngineConfig;
use crate::error::{FlowError, StoreError};
use crate::validator::{ValidatedFlow, validate};
use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Source of flow documents, keyed by flow id and version.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Loads the latest version of a flow.
    async fn load(&self, id: &str) -> Result<Flow, StoreError>;
    async fn load_version(&self, id: &str, version: u32) -> Result<Flow, StoreError>;
}

/// In-memory `FlowStore`. Saving never overwrites: every save appends a version.
#[derive(Default)]
pub struct MemoryFlowStore {
    inner: RwLock<AHashMap<String, Vec<Flow>>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new version of the flow and returns its version number (1-based).
    pub fn save(&self, flow: Flow) -> u32 {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let versions = store.entry(flow.id.clone()).or_default();
        versions.push(flow);
        versions.len() as u32
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn load(&self, id: &str) -> Result<Flow, StoreError> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store
            .get(id)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| StoreError::FlowNotFound(id.to_string()))
    }

    async fn load_version(&self, id: &str, version: u32) -> Result<Flow, StoreError> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let versions = store
            .get(id)
            .ok_or_else(|| StoreError::FlowNotFound(id.to_string()))?;
        version
            .checked_sub(1)
            .and_then(|idx| versions.get(idx as usize))
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound {
                id: id.to_string(),
                version,
            })
    }
}

/// A deployed, validated flow version.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub version: u32,
    pub flow: Arc<ValidatedFlow>,
}

/// Holds the live version of every deployed flow.
///
/// Deploying swaps in a new `Arc`; calls that already hold the previous `Arc`
/// keep navigating it until they end.
#[derive(Default)]
pub struct FlowRegistry {
    deployments: RwLock<AHashMap<String, Vec<Deployment>>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and publishes a flow as the new current version.
    pub fn deploy(&self, flow: Flow, config: &EngineConfig) -> Result<Deployment, FlowError> {
        let validated = Arc::new(validate(flow, &config.validation_options())?);
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        let versions = deployments.entry(validated.id().to_string()).or_default();
        let deployment = Deployment {
            version: versions.len() as u32 + 1,
            flow: validated,
        };
        versions.push(deployment.clone());
        tracing::info!(
            flow_id = %deployment.flow.id(),
            version = deployment.version,
            "Deployed IVR flow"
        );
        Ok(deployment)
    }

    /// Loads the latest flow from a store and deploys it.
    pub async fn deploy_from_store(
        &self,
        store: &dyn FlowStore,
        id: &str,
        config: &EngineConfig,
    ) -> Result<Deployment, FlowError> {
        let flow = store.load(id).await?;
        self.deploy(flow, config)
    }

    pub fn current(&self, id: &str) -> Result<Arc<ValidatedFlow>, StoreError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        deployments
            .get(id)
            .and_then(|versions| versions.last())
            .map(|d| Arc::clone(&d.flow))
            .ok_or_else(|| StoreError::FlowNotFound(id.to_string()))
    }

    pub fn version(&self, id: &str, version: u32) -> Result<Arc<ValidatedFlow>, StoreError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        let versions = deployments
            .get(id)
            .ok_or_else(|| StoreError::FlowNotFound(id.to_string()))?;
        version
            .checked_sub(1)
            .and_then(|idx| versions.get(idx as usize))
            .map(|d| Arc::clone(&d.flow))
            .ok_or_else(|| StoreError::VersionNotFound {
                id: id.to_string(),
                version,
            })
    }
}
