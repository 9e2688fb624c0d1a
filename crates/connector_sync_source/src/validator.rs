use async_trait::async_trait;
use connector_sync_model::{
    Filter,
    FilteringValidationResult,
    FilteringValidationState,
};

/// The collaborator `Connector::validate_filtering`/`SyncJob::validate_filtering`
/// call out to (§4.2, §4.3). Concretely this is adapter-specific: it knows
/// how to interpret a service type's advanced-rules snippet and basic
/// rules, so it lives alongside the adapter contract rather than in the
/// document-wrapper crate.
#[async_trait]
pub trait FilteringValidator: Send + Sync {
    async fn validate_filtering(&self, filter: &Filter) -> FilteringValidationResult;
}

/// A validator that accepts everything — useful for adapters with no
/// advanced-rules concept, and for exercising the wrapper mutators in
/// tests without a real validation backend.
pub struct AcceptAllValidator;

#[async_trait]
impl FilteringValidator for AcceptAllValidator {
    async fn validate_filtering(&self, _filter: &Filter) -> FilteringValidationResult {
        FilteringValidationResult {
            state: FilteringValidationState::Valid,
            errors: Vec::new(),
        }
    }
}
