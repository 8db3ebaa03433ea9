use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteId, SupplierId};
use crate::domain::requisition::RequisitionId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseOrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Sent,
    Confirmed,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "confirmed" => Some(Self::Confirmed),
            "in_transit" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Confirmed => "confirmed",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// At most one purchase order may exist per source quote; the schema backs
/// this with a unique index on `quote_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub po_number: String,
    pub requisition_id: RequisitionId,
    pub supplier_id: SupplierId,
    /// `None` for manually created purchase orders.
    pub quote_id: Option<QuoteId>,
    pub total_amount: Decimal,
    pub terms: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub auto_generated: bool,
    pub status: PurchaseOrderStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        matches!(
            (self.status, next),
            (PurchaseOrderStatus::Pending, PurchaseOrderStatus::Sent)
                | (PurchaseOrderStatus::Pending, PurchaseOrderStatus::Cancelled)
                | (PurchaseOrderStatus::Sent, PurchaseOrderStatus::Confirmed)
                | (PurchaseOrderStatus::Sent, PurchaseOrderStatus::Cancelled)
                | (PurchaseOrderStatus::Confirmed, PurchaseOrderStatus::InTransit)
                | (PurchaseOrderStatus::Confirmed, PurchaseOrderStatus::Cancelled)
                | (PurchaseOrderStatus::InTransit, PurchaseOrderStatus::Delivered)
                | (PurchaseOrderStatus::Delivered, PurchaseOrderStatus::Completed)
        )
    }

    pub fn transition_to(&mut self, next: PurchaseOrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvariantViolation(format!(
            "invalid purchase order transition from {} to {}",
            self.status.as_str(),
            next.as_str()
        )))
    }
}
