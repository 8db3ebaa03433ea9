use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::requisition::RequisitionId;
use crate::domain::rule::RuleId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One approval step per applicable rule, created as a batch when the
/// requisition enters the workflow. Only the assigned approver may resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: StepId,
    pub requisition_id: RequisitionId,
    pub rule_id: RuleId,
    pub approver_id: UserId,
    pub level: u32,
    pub status: StepStatus,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalStep {
    pub fn is_resolved(&self) -> bool {
        self.status != StepStatus::Pending
    }
}
