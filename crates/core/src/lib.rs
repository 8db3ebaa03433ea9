pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod reference;
pub mod scoring;

pub use approvals::{
    resolve_step, rollup, ApprovalPlan, ApprovalPlanner, PlanError, RequisitionOutcome,
    ResolutionError, StepDecision,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::comparison::{
    ComparisonId, Criterion, QuoteComparison, QuoteScore, ScoreBreakdown,
};
pub use domain::negotiation::{Negotiation, NegotiationId, NegotiationStatus};
pub use domain::notification::{Notification, NotificationId, NotificationKind};
pub use domain::purchase_order::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
pub use domain::quote::{Quote, QuoteId, QuoteStatus, SupplierId};
pub use domain::requisition::{Requisition, RequisitionId, RequisitionStatus, Urgency};
pub use domain::rule::{applicable_rules, ApprovalRule, RuleId};
pub use domain::step::{ApprovalStep, StepId, StepStatus};
pub use domain::user::{Role, User, UserId};
pub use errors::{DomainError, WorkflowError};
pub use scoring::{ComparisonScorer, ScoringWeights};
