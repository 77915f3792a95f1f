use super::{ExternalRef, ValidatedFlow};
use crate::error::{ValidationError, Violation};
use async_trait::async_trait;

/// The telephony platform's view of queues, extensions, mailboxes and transfer targets.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn exists(&self, reference: &ExternalRef) -> bool;
}

/// Deploy-time check that every queue, extension, mailbox and transfer target a flow
/// routes to actually exists. Missing references are reported together.
pub async fn verify_external_references(
    flow: &ValidatedFlow,
    directory: &dyn DirectoryService,
) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    for reference in flow.external_refs() {
        if !directory.exists(reference).await {
            violations.push(Violation::ExternalReferenceNotFound(reference.to_string()));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!(
            flow_id = %flow.id(),
            missing = violations.len(),
            "Flow routes to external references the directory does not know"
        );
        Err(ValidationError { violations })
    }
}
