//! Orchestration over the pure workflow engines: loads entities through the
//! repository traits, applies the core planning/resolution/scoring logic, and
//! persists the results with audit events and notifications.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use procura_core::approvals::{resolve_step, rollup, ApprovalPlanner, RequisitionOutcome,
    StepDecision};
use procura_core::config::ProcurementConfig;
use procura_core::domain::comparison::{ComparisonId, Criterion, QuoteComparison};
use procura_core::domain::negotiation::{Negotiation, NegotiationId, NegotiationStatus};
use procura_core::domain::notification::{Notification, NotificationKind};
use procura_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use procura_core::domain::quote::{QuoteId, QuoteStatus};
use procura_core::domain::requisition::{
    Requisition, RequisitionId, RequisitionStatus, Urgency,
};
use procura_core::domain::step::{ApprovalStep, StepId};
use procura_core::domain::user::UserId;
use procura_core::errors::WorkflowError;
use procura_core::reference;
use procura_core::scoring::ComparisonScorer;
use procura_core::ResolutionError;
use procura_core::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use procura_db::repositories::{
    ApprovalRuleRepository, ApprovalStepRepository, ComparisonRepository,
    InMemoryApprovalRuleRepository, InMemoryApprovalStepRepository, InMemoryComparisonRepository,
    InMemoryNegotiationRepository, InMemoryNotificationRepository,
    InMemoryPurchaseOrderRepository, InMemoryQuoteRepository, InMemoryRequisitionRepository,
    InMemoryUserRepository, NegotiationRepository, NotificationRepository,
    PurchaseOrderRepository, QuoteRepository, RepositoryError, RequisitionRepository,
    SqlApprovalRuleRepository, SqlApprovalStepRepository, SqlComparisonRepository,
    SqlNegotiationRepository, SqlNotificationRepository, SqlPurchaseOrderRepository,
    SqlQuoteRepository, SqlRequisitionRepository, SqlUserRepository, UserRepository,
};
use procura_db::DbPool;

/// The repository handles the workflow operates over. Both backends satisfy
/// the same traits with the same error semantics, so the service code never
/// knows which one it is running on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub rules: Arc<dyn ApprovalRuleRepository>,
    pub requisitions: Arc<dyn RequisitionRepository>,
    pub steps: Arc<dyn ApprovalStepRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub comparisons: Arc<dyn ComparisonRepository>,
    pub purchase_orders: Arc<dyn PurchaseOrderRepository>,
    pub negotiations: Arc<dyn NegotiationRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            rules: Arc::new(SqlApprovalRuleRepository::new(pool.clone())),
            requisitions: Arc::new(SqlRequisitionRepository::new(pool.clone())),
            steps: Arc::new(SqlApprovalStepRepository::new(pool.clone())),
            quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
            comparisons: Arc::new(SqlComparisonRepository::new(pool.clone())),
            purchase_orders: Arc::new(SqlPurchaseOrderRepository::new(pool.clone())),
            negotiations: Arc::new(SqlNegotiationRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            rules: Arc::new(InMemoryApprovalRuleRepository::new()),
            requisitions: Arc::new(InMemoryRequisitionRepository::new()),
            steps: Arc::new(InMemoryApprovalStepRepository::new()),
            quotes: Arc::new(InMemoryQuoteRepository::new()),
            comparisons: Arc::new(InMemoryComparisonRepository::new()),
            purchase_orders: Arc::new(InMemoryPurchaseOrderRepository::new()),
            negotiations: Arc::new(InMemoryNegotiationRepository::new()),
            notifications: Arc::new(InMemoryNotificationRepository::new()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewRequisition {
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub estimated_amount: Decimal,
    pub urgency: Urgency,
    pub justification: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewComparison {
    pub requisition_id: RequisitionId,
    pub name: String,
    pub quote_ids: Vec<QuoteId>,
    pub criteria: Vec<Criterion>,
    pub weights: Vec<f64>,
}

pub struct WorkflowService {
    repos: Repositories,
    planner: ApprovalPlanner,
    scorer: ComparisonScorer,
    default_delivery_days: u32,
    audit: Arc<dyn AuditSink>,
}

impl WorkflowService {
    pub fn new(
        repos: Repositories,
        procurement: &ProcurementConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repos,
            planner: ApprovalPlanner,
            scorer: ComparisonScorer::new(procurement.default_delivery_days),
            default_delivery_days: procurement.default_delivery_days,
            audit,
        }
    }

    /// Create a requisition and run it through approval planning.
    ///
    /// The requisition write is the critical half; planning or persisting the
    /// step batch failing afterwards is recoverable, so the requisition is
    /// returned with an empty step list and the failure is logged for a
    /// manual re-run.
    pub async fn create_requisition(
        &self,
        actor: &UserId,
        input: NewRequisition,
    ) -> Result<(Requisition, Vec<ApprovalStep>), WorkflowError> {
        let requester = self
            .repos
            .users
            .find_by_id(actor)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::Authorization(format!("unknown actor `{}`", actor.0)))?;

        if input.description.trim().is_empty() {
            return Err(WorkflowError::Validation("description must not be blank".to_string()));
        }
        if input.category.trim().is_empty() {
            return Err(WorkflowError::Validation("category must not be blank".to_string()));
        }
        if input.quantity == 0 {
            return Err(WorkflowError::Validation("quantity must be at least 1".to_string()));
        }
        if input.estimated_amount <= Decimal::ZERO {
            return Err(WorkflowError::Validation(
                "estimated amount must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let requisition = Requisition {
            id: RequisitionId(Uuid::new_v4().to_string()),
            requisition_number: reference::requisition_number(),
            requester_id: requester.id.clone(),
            description: input.description,
            category: input.category,
            quantity: input.quantity,
            estimated_amount: input.estimated_amount,
            urgency: input.urgency,
            justification: input.justification,
            department: requester.department.clone(),
            status: RequisitionStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.repos.requisitions.save(requisition.clone()).await.map_err(store_error)?;
        self.audit.emit(
            AuditEvent::new(
                "requisition",
                requisition.id.0.clone(),
                requisition.id.0.clone(),
                "workflow.requisition.created",
                AuditCategory::Workflow,
                actor.0.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("requisition_number", requisition.requisition_number.clone())
            .with_metadata("estimated_amount", requisition.estimated_amount.to_string()),
        );

        let steps = match self.process_requisition_approval(&requisition.id).await {
            Ok(steps) => steps,
            Err(error) => {
                warn!(
                    event_name = "workflow.steps.generation_failed",
                    requisition_id = %requisition.id.0,
                    error = %error,
                    "approval step generation failed after requisition creation; \
                     returning the requisition without steps"
                );
                Vec::new()
            }
        };

        Ok((requisition, steps))
    }

    /// Plan and persist the approval step batch for a requisition, notifying
    /// each assigned approver.
    pub async fn process_requisition_approval(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<ApprovalStep>, WorkflowError> {
        let requisition = self
            .repos
            .requisitions
            .find_by_id(requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &requisition_id.0))?;

        let rules = self.repos.rules.list_active().await.map_err(store_error)?;
        let directory = self.repos.users.list().await.map_err(store_error)?;

        let plan = self
            .planner
            .plan(&requisition, &rules, &directory, Utc::now())
            .map_err(|error| WorkflowError::Validation(error.to_string()))?;

        if plan.is_empty() {
            // A requisition with no matching rule gets no steps and this
            // engine will never move it out of pending. Surfaced loudly so
            // operators can close the rule gap instead of waiting forever.
            warn!(
                event_name = "workflow.requisition.no_rules_matched",
                requisition_id = %requisition.id.0,
                estimated_amount = %requisition.estimated_amount,
                category = %requisition.category,
                "no active approval rule matched; requisition stays pending"
            );
            return Ok(Vec::new());
        }

        self.repos.steps.save_all(&plan.steps).await.map_err(store_error)?;

        for step in &plan.steps {
            self.notify_best_effort(Notification::new(
                step.approver_id.clone(),
                NotificationKind::Info,
                "Approval requested",
                format!(
                    "Requisition {} is waiting for your level {} approval",
                    requisition.requisition_number, step.level
                ),
                "approval_step",
                step.id.0.clone(),
            ))
            .await;
        }

        info!(
            event_name = "workflow.steps.generated",
            requisition_id = %requisition.id.0,
            step_count = plan.steps.len(),
            "approval steps generated"
        );
        self.audit.emit(
            AuditEvent::new(
                "requisition",
                requisition.id.0.clone(),
                requisition.id.0.clone(),
                "workflow.steps.generated",
                AuditCategory::Workflow,
                "system",
                AuditOutcome::Success,
            )
            .with_metadata("step_count", plan.steps.len().to_string()),
        );

        Ok(plan.steps)
    }

    pub async fn requisition_with_steps(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<(Requisition, Vec<ApprovalStep>), WorkflowError> {
        let requisition = self
            .repos
            .requisitions
            .find_by_id(requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &requisition_id.0))?;
        let steps = self
            .repos
            .steps
            .list_for_requisition(requisition_id)
            .await
            .map_err(store_error)?;
        Ok((requisition, steps))
    }

    pub async fn approve_step(
        &self,
        step_id: &StepId,
        actor: &UserId,
        comments: Option<&str>,
    ) -> Result<ApprovalStep, WorkflowError> {
        self.resolve(step_id, actor, StepDecision::Approve, comments).await
    }

    pub async fn reject_step(
        &self,
        step_id: &StepId,
        actor: &UserId,
        comments: &str,
    ) -> Result<ApprovalStep, WorkflowError> {
        self.resolve(step_id, actor, StepDecision::Reject, Some(comments)).await
    }

    async fn resolve(
        &self,
        step_id: &StepId,
        actor: &UserId,
        decision: StepDecision,
        comments: Option<&str>,
    ) -> Result<ApprovalStep, WorkflowError> {
        let mut step = self
            .repos
            .steps
            .find_by_id(step_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("approval step", &step_id.0))?;

        resolve_step(&mut step, actor, decision, comments, Utc::now())
            .map_err(resolution_error)?;
        self.repos.steps.save(step.clone()).await.map_err(store_error)?;

        // The rollup must see the write just made plus any sibling
        // resolutions that landed concurrently.
        let all_steps = self
            .repos
            .steps
            .list_for_requisition(&step.requisition_id)
            .await
            .map_err(store_error)?;

        match rollup(&all_steps) {
            RequisitionOutcome::Approved => {
                self.finalize_approval(&step.requisition_id, actor).await?;
            }
            RequisitionOutcome::Rejected { rejected_rule_id, reason } => {
                self.finalize_rejection(&step.requisition_id, &rejected_rule_id.0, reason)
                    .await?;
            }
            RequisitionOutcome::Outstanding { pending } => {
                info!(
                    event_name = "workflow.requisition.outstanding",
                    requisition_id = %step.requisition_id.0,
                    pending_steps = pending,
                    "requisition still waiting on approvals"
                );
            }
        }

        Ok(step)
    }

    /// Transition the requisition to approved. Re-finalizing an already
    /// approved requisition is a no-op transition, which keeps concurrent
    /// final-step resolutions harmless.
    async fn finalize_approval(
        &self,
        requisition_id: &RequisitionId,
        actor: &UserId,
    ) -> Result<(), WorkflowError> {
        let mut requisition = self
            .repos
            .requisitions
            .find_by_id(requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &requisition_id.0))?;

        requisition.mark_approved(actor.clone(), Utc::now())?;
        self.repos.requisitions.save(requisition.clone()).await.map_err(store_error)?;

        info!(
            event_name = "workflow.requisition.approved",
            requisition_id = %requisition.id.0,
            approved_by = %actor.0,
            "requisition fully approved"
        );
        self.audit.emit(AuditEvent::new(
            "requisition",
            requisition.id.0.clone(),
            requisition.id.0.clone(),
            "workflow.requisition.approved",
            AuditCategory::Workflow,
            actor.0.clone(),
            AuditOutcome::Success,
        ));
        self.notify_best_effort(Notification::new(
            requisition.requester_id.clone(),
            NotificationKind::Success,
            "Requisition approved",
            format!("Requisition {} was fully approved", requisition.requisition_number),
            "requisition",
            requisition.id.0.clone(),
        ))
        .await;

        Ok(())
    }

    /// Rejection is final for the whole requisition. An already rejected
    /// requisition stays rejected no matter what sibling steps do afterwards.
    async fn finalize_rejection(
        &self,
        requisition_id: &RequisitionId,
        rejected_rule_id: &str,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        let mut requisition = self
            .repos
            .requisitions
            .find_by_id(requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &requisition_id.0))?;

        if requisition.status == RequisitionStatus::Rejected {
            return Ok(());
        }

        let reason = reason.unwrap_or_else(|| "rejected without stated reason".to_string());
        requisition.mark_rejected(reason.clone(), Utc::now())?;
        self.repos.requisitions.save(requisition.clone()).await.map_err(store_error)?;

        info!(
            event_name = "workflow.requisition.rejected",
            requisition_id = %requisition.id.0,
            rejected_rule_id = %rejected_rule_id,
            "requisition rejected"
        );
        self.audit.emit(
            AuditEvent::new(
                "requisition",
                requisition.id.0.clone(),
                requisition.id.0.clone(),
                "workflow.requisition.rejected",
                AuditCategory::Workflow,
                "system",
                AuditOutcome::Rejected,
            )
            .with_metadata("rule_id", rejected_rule_id.to_string())
            .with_metadata("reason", reason.clone()),
        );
        self.notify_best_effort(Notification::new(
            requisition.requester_id.clone(),
            NotificationKind::Error,
            "Requisition rejected",
            format!("Requisition {} was rejected: {reason}", requisition.requisition_number),
            "requisition",
            requisition.id.0.clone(),
        ))
        .await;

        Ok(())
    }

    pub async fn pending_approvals(
        &self,
        actor: &UserId,
    ) -> Result<Vec<ApprovalStep>, WorkflowError> {
        self.repos.steps.list_pending_for_approver(actor).await.map_err(store_error)
    }

    pub async fn create_comparison(
        &self,
        actor: &UserId,
        input: NewComparison,
    ) -> Result<QuoteComparison, WorkflowError> {
        self.repos
            .requisitions
            .find_by_id(&input.requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &input.requisition_id.0))?;

        for quote_id in &input.quote_ids {
            let quote = self
                .repos
                .quotes
                .find_by_id(quote_id)
                .await
                .map_err(store_error)?
                .ok_or_else(|| WorkflowError::not_found("quote", &quote_id.0))?;
            if quote.requisition_id != input.requisition_id {
                return Err(WorkflowError::Validation(format!(
                    "quote `{}` belongs to a different requisition",
                    quote_id.0
                )));
            }
        }

        let comparison = QuoteComparison {
            id: ComparisonId(Uuid::new_v4().to_string()),
            requisition_id: input.requisition_id,
            name: input.name,
            quote_ids: input.quote_ids,
            criteria: input.criteria,
            weights: input.weights,
            scores: None,
            recommended_quote_id: None,
            created_by: actor.clone(),
            created_at: Utc::now(),
        };
        comparison.validate()?;

        self.repos.comparisons.save(comparison.clone()).await.map_err(store_error)?;
        Ok(comparison)
    }

    pub async fn calculate_scores(
        &self,
        comparison_id: &ComparisonId,
    ) -> Result<QuoteComparison, WorkflowError> {
        let mut comparison = self
            .repos
            .comparisons
            .find_by_id(comparison_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("comparison", &comparison_id.0))?;

        let mut quotes = Vec::with_capacity(comparison.quote_ids.len());
        for quote_id in &comparison.quote_ids {
            let quote = self
                .repos
                .quotes
                .find_by_id(quote_id)
                .await
                .map_err(store_error)?
                .ok_or_else(|| WorkflowError::not_found("quote", &quote_id.0))?;
            quotes.push(quote);
        }

        let scores = self.scorer.score(&quotes, &comparison.criteria, &comparison.weights);
        comparison.recommended_quote_id = ComparisonScorer::recommend(&scores);
        comparison.scores = Some(scores);

        self.repos.comparisons.save(comparison.clone()).await.map_err(store_error)?;
        self.audit.emit(
            AuditEvent::new(
                "comparison",
                comparison.id.0.clone(),
                comparison.requisition_id.0.clone(),
                "scoring.comparison.calculated",
                AuditCategory::Scoring,
                "system",
                AuditOutcome::Success,
            )
            .with_metadata("quote_count", comparison.quote_ids.len().to_string()),
        );

        Ok(comparison)
    }

    /// Derive the one purchase order an accepted quote may produce.
    ///
    /// The pre-insert existence check gives a clean error message; the
    /// persistence-layer uniqueness constraint is what actually holds under
    /// concurrent generation, surfacing the loser as `Duplicate`.
    pub async fn generate_purchase_order(
        &self,
        quote_id: &QuoteId,
        actor: &UserId,
    ) -> Result<PurchaseOrder, WorkflowError> {
        let mut quote = self
            .repos
            .quotes
            .find_by_id(quote_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("quote", &quote_id.0))?;

        if quote.status != QuoteStatus::Accepted {
            return Err(WorkflowError::InvalidState(format!(
                "quote `{}` is {}, only accepted quotes can generate a purchase order",
                quote.id.0,
                quote.status.as_str()
            )));
        }

        let requisition = self
            .repos
            .requisitions
            .find_by_id(&quote.requisition_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("requisition", &quote.requisition_id.0))?;

        if let Some(existing) = self
            .repos
            .purchase_orders
            .find_by_quote_id(quote_id)
            .await
            .map_err(store_error)?
        {
            return Err(WorkflowError::Duplicate(format!(
                "purchase order `{}` already exists for quote `{}`",
                existing.po_number, quote.id.0
            )));
        }

        let now = Utc::now();
        let delivery_days = quote.delivery_days.unwrap_or(self.default_delivery_days);
        let purchase_order = PurchaseOrder {
            id: PurchaseOrderId(Uuid::new_v4().to_string()),
            po_number: reference::po_number(),
            requisition_id: requisition.id.clone(),
            supplier_id: quote.supplier_id.clone(),
            quote_id: Some(quote.id.clone()),
            total_amount: quote.total_amount,
            terms: quote.terms.clone(),
            expected_delivery: Some(now + Duration::days(i64::from(delivery_days))),
            auto_generated: true,
            status: PurchaseOrderStatus::Pending,
            created_by: actor.clone(),
            created_at: now,
        };

        self.repos.purchase_orders.save(purchase_order.clone()).await.map_err(store_error)?;

        quote.transition_to(QuoteStatus::Completed)?;
        quote.updated_at = now;
        self.repos.quotes.save(quote.clone()).await.map_err(store_error)?;

        info!(
            event_name = "procurement.purchase_order.generated",
            po_number = %purchase_order.po_number,
            quote_id = %quote.id.0,
            "purchase order generated from quote"
        );
        self.audit.emit(
            AuditEvent::new(
                "purchase_order",
                purchase_order.id.0.clone(),
                requisition.id.0.clone(),
                "procurement.purchase_order.generated",
                AuditCategory::Procurement,
                actor.0.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("po_number", purchase_order.po_number.clone())
            .with_metadata("quote_id", quote.id.0.clone()),
        );
        self.notify_best_effort(Notification::new(
            actor.clone(),
            NotificationKind::Success,
            "Purchase order created",
            format!(
                "Purchase order {} was generated from quote {}",
                purchase_order.po_number, quote.quote_number
            ),
            "purchase_order",
            purchase_order.id.0.clone(),
        ))
        .await;

        Ok(purchase_order)
    }

    pub async fn open_negotiation(
        &self,
        quote_id: &QuoteId,
        actor: &UserId,
        proposed_changes: serde_json::Value,
    ) -> Result<Negotiation, WorkflowError> {
        let mut quote = self
            .repos
            .quotes
            .find_by_id(quote_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| WorkflowError::not_found("quote", &quote_id.0))?;

        let round = quote.open_negotiation_round()?;
        quote.updated_at = Utc::now();
        self.repos.quotes.save(quote.clone()).await.map_err(store_error)?;

        let negotiation = Negotiation {
            id: NegotiationId(Uuid::new_v4().to_string()),
            quote_id: quote.id.clone(),
            round,
            status: NegotiationStatus::Pending,
            proposed_changes,
            current_terms: json!({
                "total_amount": quote.total_amount.to_string(),
                "delivery_days": quote.delivery_days,
                "terms": quote.terms,
            }),
            created_by: actor.clone(),
            created_at: Utc::now(),
        };
        self.repos.negotiations.save(negotiation.clone()).await.map_err(store_error)?;

        info!(
            event_name = "procurement.negotiation.opened",
            quote_id = %quote.id.0,
            round = round,
            "negotiation round opened"
        );

        Ok(negotiation)
    }

    pub async fn notifications_for(
        &self,
        actor: &UserId,
    ) -> Result<Vec<Notification>, WorkflowError> {
        self.repos.notifications.list_for_user(actor).await.map_err(store_error)
    }

    /// Notification delivery never fails a workflow operation.
    async fn notify_best_effort(&self, notification: Notification) {
        if let Err(error) = self.repos.notifications.save(notification).await {
            warn!(
                event_name = "workflow.notification.delivery_failed",
                error = %error,
                "failed to persist notification"
            );
        }
    }
}

fn store_error(error: RepositoryError) -> WorkflowError {
    match error {
        RepositoryError::Conflict(message) => WorkflowError::Duplicate(message),
        other => WorkflowError::Persistence(other.to_string()),
    }
}

fn resolution_error(error: ResolutionError) -> WorkflowError {
    match error {
        ResolutionError::ApproverMismatch { .. } => {
            WorkflowError::Authorization(error.to_string())
        }
        ResolutionError::AlreadyResolved { .. } => WorkflowError::InvalidState(error.to_string()),
        ResolutionError::CommentsRequired => WorkflowError::Validation(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use procura_core::config::ProcurementConfig;
    use procura_core::domain::comparison::QuoteComparison;
    use procura_core::domain::quote::{Quote, QuoteId, QuoteStatus, SupplierId};
    use procura_core::domain::requisition::{RequisitionStatus, Urgency};
    use procura_core::domain::rule::{ApprovalRule, RuleId};
    use procura_core::domain::user::{Role, User, UserId};
    use procura_core::errors::WorkflowError;
    use procura_core::InMemoryAuditSink;
    use procura_db::repositories::{ApprovalRuleRepository, QuoteRepository, UserRepository};

    use super::{NewComparison, NewRequisition, Repositories, WorkflowService};

    fn procurement() -> ProcurementConfig {
        ProcurementConfig {
            default_delivery_days: 30,
            default_price_weight: 0.5,
            default_delivery_weight: 0.3,
            default_quality_weight: 0.2,
        }
    }

    fn service() -> (WorkflowService, Repositories) {
        let repos = Repositories::in_memory();
        let service =
            WorkflowService::new(repos.clone(), &procurement(), Arc::new(InMemoryAuditSink::default()));
        (service, repos)
    }

    async fn seed_user(repos: &Repositories, id: &str, role: Role) {
        repos
            .users
            .save(User {
                id: UserId(id.to_string()),
                name: id.to_string(),
                email: format!("{id}@example.test"),
                role,
                department: Some("engineering".to_string()),
            })
            .await
            .expect("seed user");
    }

    async fn seed_rule(repos: &Repositories, id: &str, role: Role, level: u32) {
        repos
            .rules
            .save(ApprovalRule {
                id: RuleId(id.to_string()),
                name: format!("rule {id}"),
                min_amount: Decimal::new(1000, 0),
                max_amount: Some(Decimal::new(10_000, 0)),
                category: Some("equipment".to_string()),
                department: None,
                approver_role: role,
                approver_user_id: None,
                level,
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .expect("seed rule");
    }

    fn new_requisition(amount: i64) -> NewRequisition {
        NewRequisition {
            description: "laptops".to_string(),
            category: "equipment".to_string(),
            quantity: 4,
            estimated_amount: Decimal::new(amount, 0),
            urgency: Urgency::Medium,
            justification: None,
        }
    }

    async fn seed_quote(
        repos: &Repositories,
        id: &str,
        requisition_id: &str,
        cents: i64,
        delivery_days: Option<u32>,
        status: QuoteStatus,
    ) {
        let now = Utc::now();
        repos
            .quotes
            .save(Quote {
                id: QuoteId(id.to_string()),
                quote_number: format!("QUO-2026-{id}"),
                requisition_id: procura_core::RequisitionId(requisition_id.to_string()),
                supplier_id: SupplierId("sup-1".to_string()),
                total_amount: Decimal::new(cents, 2),
                delivery_days,
                terms: Some("net 30".to_string()),
                status,
                negotiation_rounds: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed quote");
    }

    #[tokio::test]
    async fn full_approval_flow_requires_unanimity() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_user(&repos, "u-approver", Role::Approver).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;
        seed_rule(&repos, "R-2", Role::Approver, 2).await;

        let (requisition, steps) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");
        assert_eq!(steps.len(), 2);
        assert_eq!(requisition.status, RequisitionStatus::Pending);

        // First approval alone leaves the requisition pending.
        service
            .approve_step(&steps[0].id, &UserId("u-admin".to_string()), None)
            .await
            .expect("approve level 1");
        let (after_first, _) =
            service.requisition_with_steps(&requisition.id).await.expect("reload");
        assert_eq!(after_first.status, RequisitionStatus::Pending);

        service
            .approve_step(&steps[1].id, &UserId("u-approver".to_string()), Some("ok"))
            .await
            .expect("approve level 2");
        let (finalized, _) = service.requisition_with_steps(&requisition.id).await.expect("reload");
        assert_eq!(finalized.status, RequisitionStatus::Approved);
        assert_eq!(finalized.approved_by, Some(UserId("u-approver".to_string())));
        assert!(finalized.approved_at.is_some());

        // Requester got the success notification.
        let inbox = service
            .notifications_for(&UserId("u-req".to_string()))
            .await
            .expect("notifications");
        assert!(inbox.iter().any(|n| n.title == "Requisition approved"));
    }

    #[tokio::test]
    async fn rejection_short_circuits_and_is_final() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_user(&repos, "u-approver", Role::Approver).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;
        seed_rule(&repos, "R-2", Role::Approver, 2).await;

        let (requisition, steps) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");

        service
            .reject_step(&steps[0].id, &UserId("u-admin".to_string()), "over budget")
            .await
            .expect("reject level 1");

        let (rejected, _) = service.requisition_with_steps(&requisition.id).await.expect("reload");
        assert_eq!(rejected.status, RequisitionStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("over budget"));

        // A sibling approval afterwards cannot resurrect the requisition.
        service
            .approve_step(&steps[1].id, &UserId("u-approver".to_string()), None)
            .await
            .expect("sibling approval still records");
        let (still_rejected, _) =
            service.requisition_with_steps(&requisition.id).await.expect("reload");
        assert_eq!(still_rejected.status, RequisitionStatus::Rejected);
    }

    #[tokio::test]
    async fn rejection_without_comments_is_refused() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;

        let (_, steps) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");

        let error = service
            .reject_step(&steps[0].id, &UserId("u-admin".to_string()), "   ")
            .await
            .expect_err("blank comments");
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_approver_fails_closed() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;

        let (_, steps) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");

        let error = service
            .approve_step(&steps[0].id, &UserId("u-req".to_string()), None)
            .await
            .expect_err("not the assigned approver");
        assert!(matches!(error, WorkflowError::Authorization(_)));
    }

    #[tokio::test]
    async fn no_matching_rule_leaves_the_requisition_pending_with_no_steps() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        // Rule floor is 1000; this requisition sits below it.
        seed_rule(&repos, "R-1", Role::Admin, 1).await;

        let (requisition, steps) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(500))
            .await
            .expect("create");

        assert!(steps.is_empty());
        assert_eq!(requisition.status, RequisitionStatus::Pending);
        let pending = service
            .pending_approvals(&UserId("u-admin".to_string()))
            .await
            .expect("pending");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn purchase_order_generation_is_exactly_once() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        let (requisition, _) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");
        seed_quote(&repos, "quo-1", &requisition.id.0, 100_000, Some(14), QuoteStatus::Accepted)
            .await;

        let po = service
            .generate_purchase_order(&QuoteId("quo-1".to_string()), &UserId("u-req".to_string()))
            .await
            .expect("first generation");
        assert!(po.auto_generated);
        assert_eq!(po.quote_id, Some(QuoteId("quo-1".to_string())));
        assert!(po.expected_delivery.is_some());

        let quote =
            repos.quotes.find_by_id(&QuoteId("quo-1".to_string())).await.expect("find").unwrap();
        assert_eq!(quote.status, QuoteStatus::Completed);

        let error = service
            .generate_purchase_order(&QuoteId("quo-1".to_string()), &UserId("u-req".to_string()))
            .await
            .expect_err("second generation");
        assert!(matches!(
            error,
            WorkflowError::Duplicate(_) | WorkflowError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn purchase_order_refuses_non_accepted_quotes_without_mutating_them() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        let (requisition, _) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");
        seed_quote(&repos, "quo-1", &requisition.id.0, 100_000, Some(14), QuoteStatus::Submitted)
            .await;

        let error = service
            .generate_purchase_order(&QuoteId("quo-1".to_string()), &UserId("u-req".to_string()))
            .await
            .expect_err("quote not accepted");
        assert!(matches!(error, WorkflowError::InvalidState(_)));

        let quote =
            repos.quotes.find_by_id(&QuoteId("quo-1".to_string())).await.expect("find").unwrap();
        assert_eq!(quote.status, QuoteStatus::Submitted);
    }

    #[tokio::test]
    async fn comparison_recommends_the_highest_total_score() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        let (requisition, _) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");

        seed_quote(&repos, "quo-a", &requisition.id.0, 100_000, Some(7), QuoteStatus::Submitted)
            .await;
        seed_quote(&repos, "quo-b", &requisition.id.0, 120_000, Some(14), QuoteStatus::Submitted)
            .await;
        seed_quote(&repos, "quo-c", &requisition.id.0, 90_000, Some(30), QuoteStatus::Submitted)
            .await;

        let comparison = service
            .create_comparison(
                &UserId("u-req".to_string()),
                NewComparison {
                    requisition_id: requisition.id.clone(),
                    name: "laptop bids".to_string(),
                    quote_ids: vec![
                        QuoteId("quo-a".to_string()),
                        QuoteId("quo-b".to_string()),
                        QuoteId("quo-c".to_string()),
                    ],
                    criteria: QuoteComparison::DEFAULT_CRITERIA.to_vec(),
                    weights: QuoteComparison::DEFAULT_WEIGHTS.to_vec(),
                },
            )
            .await
            .expect("create comparison");

        let calculated = service.calculate_scores(&comparison.id).await.expect("calculate");
        let scores = calculated.scores.expect("scores");

        // Prices [1000, 1200, 900], delivery [7, 14, 30]:
        // a: 0.5*66.67 + 0.3*100 + 0.2*75 = 78.33 (winner)
        // b: 0.5*0 + 0.3*80 + 0.2*75 = 39.00
        // c: 0.5*100 + 0.3*40 + 0.2*75 = 77.00
        assert_eq!(scores[0].total_score, 78.33);
        assert_eq!(scores[1].total_score, 39.0);
        assert_eq!(scores[2].total_score, 77.0);
        assert_eq!(calculated.recommended_quote_id, Some(QuoteId("quo-a".to_string())));
    }

    #[tokio::test]
    async fn comparison_with_a_single_quote_is_invalid() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        let (requisition, _) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");
        seed_quote(&repos, "quo-a", &requisition.id.0, 100_000, Some(7), QuoteStatus::Submitted)
            .await;

        let error = service
            .create_comparison(
                &UserId("u-req".to_string()),
                NewComparison {
                    requisition_id: requisition.id,
                    name: "solo".to_string(),
                    quote_ids: vec![QuoteId("quo-a".to_string())],
                    criteria: QuoteComparison::DEFAULT_CRITERIA.to_vec(),
                    weights: QuoteComparison::DEFAULT_WEIGHTS.to_vec(),
                },
            )
            .await
            .expect_err("needs two quotes");
        assert!(matches!(error, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn negotiation_round_bumps_the_quote_counter() {
        let (service, repos) = service();
        seed_user(&repos, "u-req", Role::User).await;
        let (requisition, _) = service
            .create_requisition(&UserId("u-req".to_string()), new_requisition(6000))
            .await
            .expect("create");
        seed_quote(&repos, "quo-1", &requisition.id.0, 100_000, Some(14), QuoteStatus::Submitted)
            .await;

        let negotiation = service
            .open_negotiation(
                &QuoteId("quo-1".to_string()),
                &UserId("u-req".to_string()),
                serde_json::json!({"total_amount": "950.00"}),
            )
            .await
            .expect("open round");
        assert_eq!(negotiation.round, 1);

        let quote =
            repos.quotes.find_by_id(&QuoteId("quo-1".to_string())).await.expect("find").unwrap();
        assert_eq!(quote.status, QuoteStatus::Negotiating);
        assert_eq!(quote.negotiation_rounds, 1);
    }
}
