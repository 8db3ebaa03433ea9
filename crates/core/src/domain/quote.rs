use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::requisition::RequisitionId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Submitted,
    Accepted,
    Rejected,
    Expired,
    Negotiating,
    Completed,
}

impl QuoteStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "negotiating" => Some(Self::Negotiating),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Negotiating => "negotiating",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: String,
    pub requisition_id: RequisitionId,
    pub supplier_id: SupplierId,
    pub total_amount: Decimal,
    /// Promised delivery lead time in days. Scoring and purchase-order
    /// derivation fall back to a configured default when unset.
    pub delivery_days: Option<u32>,
    pub terms: Option<String>,
    pub status: QuoteStatus,
    pub negotiation_rounds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// `Completed` marks the one-time conversion into a purchase order and
    /// is terminal.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Pending, QuoteStatus::Submitted)
                | (QuoteStatus::Pending, QuoteStatus::Expired)
                | (QuoteStatus::Submitted, QuoteStatus::Accepted)
                | (QuoteStatus::Submitted, QuoteStatus::Rejected)
                | (QuoteStatus::Submitted, QuoteStatus::Expired)
                | (QuoteStatus::Submitted, QuoteStatus::Negotiating)
                | (QuoteStatus::Negotiating, QuoteStatus::Submitted)
                | (QuoteStatus::Negotiating, QuoteStatus::Accepted)
                | (QuoteStatus::Negotiating, QuoteStatus::Rejected)
                | (QuoteStatus::Accepted, QuoteStatus::Completed)
        )
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    pub fn open_negotiation_round(&mut self) -> Result<u32, DomainError> {
        if self.status != QuoteStatus::Negotiating {
            self.transition_to(QuoteStatus::Negotiating)?;
        }
        self.negotiation_rounds += 1;
        Ok(self.negotiation_rounds)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::requisition::RequisitionId;

    use super::{Quote, QuoteId, QuoteStatus, SupplierId};

    fn quote(status: QuoteStatus) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId("quo-1".to_string()),
            quote_number: "QUO-2026-0001".to_string(),
            requisition_id: RequisitionId("req-1".to_string()),
            supplier_id: SupplierId("sup-1".to_string()),
            total_amount: Decimal::new(120_000, 2),
            delivery_days: Some(14),
            terms: Some("net 30".to_string()),
            status,
            negotiation_rounds: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepted_quote_completes_exactly_once() {
        let mut quote = quote(QuoteStatus::Accepted);
        quote.transition_to(QuoteStatus::Completed).expect("accepted -> completed");

        let error = quote.transition_to(QuoteStatus::Completed).expect_err("completed is terminal");
        assert!(matches!(error, crate::errors::DomainError::InvalidQuoteTransition { .. }));
    }

    #[test]
    fn pending_quote_cannot_be_accepted_directly() {
        let mut quote = quote(QuoteStatus::Pending);
        assert!(quote.transition_to(QuoteStatus::Accepted).is_err());
        quote.transition_to(QuoteStatus::Submitted).expect("pending -> submitted");
        quote.transition_to(QuoteStatus::Accepted).expect("submitted -> accepted");
    }

    #[test]
    fn negotiation_round_increments_counter_and_moves_status() {
        let mut quote = quote(QuoteStatus::Submitted);

        assert_eq!(quote.open_negotiation_round().expect("first round"), 1);
        assert_eq!(quote.status, QuoteStatus::Negotiating);

        // Further rounds while already negotiating keep counting.
        assert_eq!(quote.open_negotiation_round().expect("second round"), 2);
    }

    #[test]
    fn negotiating_quote_can_return_to_submitted() {
        let mut quote = quote(QuoteStatus::Negotiating);
        quote.transition_to(QuoteStatus::Submitted).expect("negotiating -> submitted");
    }

    #[test]
    fn completed_quote_cannot_negotiate() {
        let mut quote = quote(QuoteStatus::Completed);
        assert!(quote.open_negotiation_round().is_err());
        assert_eq!(quote.negotiation_rounds, 0);
    }
}
