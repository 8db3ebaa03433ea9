use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::quote::QuoteId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
}

impl NegotiationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "countered" => Some(Self::Countered),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Countered => "countered",
        }
    }
}

/// One round of back-and-forth on a quote. `round` is monotonic per quote;
/// opening a round bumps the parent quote's counter and status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationId,
    pub quote_id: QuoteId,
    pub round: u32,
    pub status: NegotiationStatus,
    pub proposed_changes: Value,
    pub current_terms: Value,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
