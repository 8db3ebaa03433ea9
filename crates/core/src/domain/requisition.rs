use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequisitionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
}

impl RequisitionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: RequisitionId,
    pub requisition_number: String,
    pub requester_id: UserId,
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub estimated_amount: Decimal,
    pub urgency: Urgency,
    pub justification: Option<String>,
    /// Inherited from the requester at creation time.
    pub department: Option<String>,
    pub status: RequisitionStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// `Approved -> Approved` is deliberately allowed: workflow finalization
    /// must be idempotent under concurrent step resolution.
    pub fn can_transition_to(&self, next: RequisitionStatus) -> bool {
        matches!(
            (self.status, next),
            (RequisitionStatus::Pending, RequisitionStatus::Approved)
                | (RequisitionStatus::Pending, RequisitionStatus::Rejected)
                | (RequisitionStatus::Approved, RequisitionStatus::Approved)
                | (RequisitionStatus::Approved, RequisitionStatus::InProgress)
                | (RequisitionStatus::InProgress, RequisitionStatus::Completed)
        )
    }

    pub fn transition_to(&mut self, next: RequisitionStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRequisitionTransition { from: self.status, to: next })
    }

    pub fn mark_approved(
        &mut self,
        approved_by: UserId,
        approved_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(RequisitionStatus::Approved)?;
        self.approved_by = Some(approved_by);
        self.approved_at = Some(approved_at);
        self.updated_at = approved_at;
        Ok(())
    }

    pub fn mark_rejected(
        &mut self,
        reason: impl Into<String>,
        rejected_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(RequisitionStatus::Rejected)?;
        self.rejection_reason = Some(reason.into());
        self.updated_at = rejected_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::user::UserId;

    use super::{Requisition, RequisitionId, RequisitionStatus, Urgency};

    fn requisition(status: RequisitionStatus) -> Requisition {
        let now = Utc::now();
        Requisition {
            id: RequisitionId("req-1".to_string()),
            requisition_number: "REQ-2026-0001".to_string(),
            requester_id: UserId("u-requester".to_string()),
            description: "laptops".to_string(),
            category: "equipment".to_string(),
            quantity: 4,
            estimated_amount: Decimal::new(6000, 0),
            urgency: Urgency::Medium,
            justification: None,
            department: Some("engineering".to_string()),
            status,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_can_finalize_either_way() {
        let mut approved = requisition(RequisitionStatus::Pending);
        approved
            .mark_approved(UserId("u-admin".to_string()), Utc::now())
            .expect("pending -> approved");
        assert_eq!(approved.status, RequisitionStatus::Approved);
        assert!(approved.approved_by.is_some());
        assert!(approved.approved_at.is_some());

        let mut rejected = requisition(RequisitionStatus::Pending);
        rejected.mark_rejected("over budget", Utc::now()).expect("pending -> rejected");
        assert_eq!(rejected.status, RequisitionStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("over budget"));
    }

    #[test]
    fn rejected_is_terminal() {
        let mut requisition = requisition(RequisitionStatus::Rejected);
        assert!(requisition.mark_approved(UserId("u-x".to_string()), Utc::now()).is_err());
        assert!(!requisition.can_transition_to(RequisitionStatus::Pending));
        assert!(!requisition.can_transition_to(RequisitionStatus::InProgress));
    }

    #[test]
    fn approving_an_approved_requisition_is_idempotent() {
        let mut requisition = requisition(RequisitionStatus::Approved);
        requisition
            .mark_approved(UserId("u-admin".to_string()), Utc::now())
            .expect("approved -> approved is harmless");
        assert_eq!(requisition.status, RequisitionStatus::Approved);
    }

    #[test]
    fn fulfilment_path_runs_through_in_progress() {
        let mut requisition = requisition(RequisitionStatus::Approved);
        requisition.transition_to(RequisitionStatus::InProgress).expect("approved -> in_progress");
        requisition.transition_to(RequisitionStatus::Completed).expect("in_progress -> completed");
        assert!(!requisition.can_transition_to(RequisitionStatus::Pending));
    }

    #[test]
    fn status_round_trips_through_as_str() {
        for status in [
            RequisitionStatus::Pending,
            RequisitionStatus::Approved,
            RequisitionStatus::Rejected,
            RequisitionStatus::InProgress,
            RequisitionStatus::Completed,
        ] {
            assert_eq!(RequisitionStatus::parse(status.as_str()), Some(status));
        }
    }
}
