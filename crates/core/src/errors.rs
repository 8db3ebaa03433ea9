use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::domain::requisition::RequisitionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid requisition transition from {from:?} to {to:?}")]
    InvalidRequisitionTransition { from: RequisitionStatus, to: RequisitionStatus },
    #[error("invalid quote transition from {from:?} to {to:?}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure taxonomy for workflow operations. The server edge maps each
/// variant to an HTTP status; nothing in this crate retries automatically.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvariantViolation(message) => Self::Validation(message),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, WorkflowError};
    use crate::domain::requisition::RequisitionStatus;

    #[test]
    fn invariant_violation_maps_to_validation() {
        let error: WorkflowError =
            DomainError::InvariantViolation("min_amount exceeds max_amount".to_owned()).into();
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[test]
    fn transition_error_maps_to_invalid_state() {
        let error: WorkflowError = DomainError::InvalidRequisitionTransition {
            from: RequisitionStatus::Rejected,
            to: RequisitionStatus::Approved,
        }
        .into();
        assert!(matches!(error, WorkflowError::InvalidState(_)));
    }

    #[test]
    fn not_found_carries_entity_and_id() {
        let error = WorkflowError::not_found("requisition", "REQ-1");
        assert_eq!(error.to_string(), "requisition not found: REQ-1");
    }
}
