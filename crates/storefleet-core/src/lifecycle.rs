use crate::ProviderError;
use storefleet_schema::StoreStatus;

/// PENDING may stay PENDING (aborted pipeline) or settle; settled states are
/// terminal.
pub fn validate_transition(from: StoreStatus, to: StoreStatus) -> Result<(), ProviderError> {
    let valid = matches!(
        (from, to),
        (
            StoreStatus::Pending,
            StoreStatus::Pending | StoreStatus::Available | StoreStatus::Failed
        )
    );

    if valid {
        Ok(())
    } else {
        Err(ProviderError::InvalidTransition { from, to })
    }
}
