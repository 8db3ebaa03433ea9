use async_trait::async_trait;
use thiserror::Error;

use procura_core::domain::comparison::{ComparisonId, QuoteComparison};
use procura_core::domain::negotiation::Negotiation;
use procura_core::domain::notification::Notification;
use procura_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
use procura_core::domain::quote::{Quote, QuoteId};
use procura_core::domain::requisition::{Requisition, RequisitionId};
use procura_core::domain::rule::{ApprovalRule, RuleId};
use procura_core::domain::step::{ApprovalStep, StepId};
use procura_core::domain::user::{User, UserId};

pub mod comparison;
pub mod memory;
pub mod negotiation;
pub mod notification;
pub mod purchase_order;
pub mod quote;
pub mod requisition;
pub mod rule;
pub mod step;
pub mod user;

pub use comparison::SqlComparisonRepository;
pub use memory::{
    InMemoryApprovalRuleRepository, InMemoryApprovalStepRepository, InMemoryComparisonRepository,
    InMemoryNegotiationRepository, InMemoryNotificationRepository,
    InMemoryPurchaseOrderRepository, InMemoryQuoteRepository, InMemoryRequisitionRepository,
    InMemoryUserRepository,
};
pub use negotiation::SqlNegotiationRepository;
pub use notification::SqlNotificationRepository;
pub use purchase_order::SqlPurchaseOrderRepository;
pub use quote::SqlQuoteRepository;
pub use requisition::SqlRequisitionRepository;
pub use rule::SqlApprovalRuleRepository;
pub use step::SqlApprovalStepRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// A uniqueness constraint fired. Both backing stores report this the
    /// same way so the workflow can treat a racing duplicate insert exactly
    /// like a detected one.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                Self::Conflict(db_error.message().to_string())
            }
            _ => Self::Database(error),
        }
    }
}

pub(crate) fn parse_datetime(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

pub(crate) fn parse_opt_datetime(raw: Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.and_then(|value| chrono::DateTime::parse_from_rfc3339(&value).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

pub(crate) fn parse_decimal(raw: &str) -> Result<rust_decimal::Decimal, RepositoryError> {
    raw.parse::<rust_decimal::Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("bad decimal `{raw}`: {error}")))
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    /// Directory listing in creation order; approver resolution picks the
    /// first role holder from this order.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalRuleRepository: Send + Sync {
    async fn find_by_id(&self, id: &RuleId) -> Result<Option<ApprovalRule>, RepositoryError>;
    /// Active rules ordered ascending by level then id.
    async fn list_active(&self) -> Result<Vec<ApprovalRule>, RepositoryError>;
    async fn save(&self, rule: ApprovalRule) -> Result<(), RepositoryError>;
    /// Soft delete; the row stays for historical step references.
    async fn deactivate(&self, id: &RuleId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait RequisitionRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequisitionId)
        -> Result<Option<Requisition>, RepositoryError>;
    async fn save(&self, requisition: Requisition) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalStepRepository: Send + Sync {
    async fn find_by_id(&self, id: &StepId) -> Result<Option<ApprovalStep>, RepositoryError>;
    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError>;
    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError>;
    async fn save(&self, step: ApprovalStep) -> Result<(), RepositoryError>;
    async fn save_all(&self, steps: &[ApprovalStep]) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ComparisonRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ComparisonId,
    ) -> Result<Option<QuoteComparison>, RepositoryError>;
    async fn save(&self, comparison: QuoteComparison) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PurchaseOrderRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError>;
    async fn find_by_quote_id(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError>;
    async fn save(&self, purchase_order: PurchaseOrder) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    async fn list_for_quote(&self, quote_id: &QuoteId)
        -> Result<Vec<Negotiation>, RepositoryError>;
    async fn save(&self, negotiation: Negotiation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_for_user(&self, user_id: &UserId)
        -> Result<Vec<Notification>, RepositoryError>;
    async fn save(&self, notification: Notification) -> Result<(), RepositoryError>;
}
