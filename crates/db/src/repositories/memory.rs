//! In-memory repository twins. They mirror the SQL implementations'
//! observable behavior, uniqueness conflicts included, so workflow tests can
//! run without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use procura_core::domain::comparison::{ComparisonId, QuoteComparison};
use procura_core::domain::negotiation::Negotiation;
use procura_core::domain::notification::Notification;
use procura_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
use procura_core::domain::quote::{Quote, QuoteId};
use procura_core::domain::requisition::{Requisition, RequisitionId};
use procura_core::domain::rule::{ApprovalRule, RuleId};
use procura_core::domain::step::{ApprovalStep, StepId, StepStatus};
use procura_core::domain::user::{User, UserId};

use super::{
    ApprovalRuleRepository, ApprovalStepRepository, ComparisonRepository, NegotiationRepository,
    NotificationRepository, PurchaseOrderRepository, QuoteRepository, RepositoryError,
    RequisitionRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    // Insertion order doubles as the directory order.
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.iter().find(|user| &user.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.users.read().await.clone())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.iter().any(|existing| existing.email == user.email && existing.id != user.id) {
            return Err(RepositoryError::Conflict(format!(
                "email `{}` already registered",
                user.email
            )));
        }

        match users.iter_mut().find(|existing| existing.id == user.id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRuleRepository {
    rules: RwLock<HashMap<RuleId, ApprovalRule>>,
}

impl InMemoryApprovalRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRuleRepository for InMemoryApprovalRuleRepository {
    async fn find_by_id(&self, id: &RuleId) -> Result<Option<ApprovalRule>, RepositoryError> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let mut active: Vec<ApprovalRule> =
            self.rules.read().await.values().filter(|rule| rule.is_active).cloned().collect();
        active.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(active)
    }

    async fn save(&self, rule: ApprovalRule) -> Result<(), RepositoryError> {
        self.rules.write().await.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn deactivate(&self, id: &RuleId) -> Result<bool, RepositoryError> {
        match self.rules.write().await.get_mut(id) {
            Some(rule) => {
                rule.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryRequisitionRepository {
    requisitions: RwLock<HashMap<RequisitionId, Requisition>>,
}

impl InMemoryRequisitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequisitionRepository for InMemoryRequisitionRepository {
    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, RepositoryError> {
        Ok(self.requisitions.read().await.get(id).cloned())
    }

    async fn save(&self, requisition: Requisition) -> Result<(), RepositoryError> {
        let mut requisitions = self.requisitions.write().await;
        if requisitions.values().any(|existing| {
            existing.requisition_number == requisition.requisition_number
                && existing.id != requisition.id
        }) {
            return Err(RepositoryError::Conflict(format!(
                "requisition number `{}` already taken",
                requisition.requisition_number
            )));
        }

        requisitions.insert(requisition.id.clone(), requisition);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryApprovalStepRepository {
    steps: RwLock<HashMap<StepId, ApprovalStep>>,
}

impl InMemoryApprovalStepRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStepRepository for InMemoryApprovalStepRepository {
    async fn find_by_id(&self, id: &StepId) -> Result<Option<ApprovalStep>, RepositoryError> {
        Ok(self.steps.read().await.get(id).cloned())
    }

    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let mut steps: Vec<ApprovalStep> = self
            .steps
            .read()
            .await
            .values()
            .filter(|step| &step.requisition_id == requisition_id)
            .cloned()
            .collect();
        steps.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(steps)
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let mut steps: Vec<ApprovalStep> = self
            .steps
            .read()
            .await
            .values()
            .filter(|step| &step.approver_id == approver_id && step.status == StepStatus::Pending)
            .cloned()
            .collect();
        steps.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(steps)
    }

    async fn save(&self, step: ApprovalStep) -> Result<(), RepositoryError> {
        self.steps.write().await.insert(step.id.clone(), step);
        Ok(())
    }

    async fn save_all(&self, steps: &[ApprovalStep]) -> Result<(), RepositoryError> {
        let mut store = self.steps.write().await;
        for step in steps {
            store.insert(step.id.clone(), step.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<QuoteId, Quote>>,
}

impl InMemoryQuoteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.quotes.read().await.get(id).cloned())
    }

    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let mut quotes: Vec<Quote> = self
            .quotes
            .read()
            .await
            .values()
            .filter(|quote| &quote.requisition_id == requisition_id)
            .cloned()
            .collect();
        quotes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(quotes)
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if quotes
            .values()
            .any(|existing| existing.quote_number == quote.quote_number && existing.id != quote.id)
        {
            return Err(RepositoryError::Conflict(format!(
                "quote number `{}` already taken",
                quote.quote_number
            )));
        }

        quotes.insert(quote.id.clone(), quote);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryComparisonRepository {
    comparisons: RwLock<HashMap<ComparisonId, QuoteComparison>>,
}

impl InMemoryComparisonRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComparisonRepository for InMemoryComparisonRepository {
    async fn find_by_id(
        &self,
        id: &ComparisonId,
    ) -> Result<Option<QuoteComparison>, RepositoryError> {
        Ok(self.comparisons.read().await.get(id).cloned())
    }

    async fn save(&self, comparison: QuoteComparison) -> Result<(), RepositoryError> {
        self.comparisons.write().await.insert(comparison.id.clone(), comparison);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPurchaseOrderRepository {
    orders: RwLock<HashMap<PurchaseOrderId, PurchaseOrder>>,
}

impl InMemoryPurchaseOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PurchaseOrderRepository for InMemoryPurchaseOrderRepository {
    async fn find_by_id(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_quote_id(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|order| order.quote_id.as_ref() == Some(quote_id))
            .cloned())
    }

    async fn save(&self, purchase_order: PurchaseOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        if let Some(quote_id) = &purchase_order.quote_id {
            if orders.values().any(|existing| {
                existing.quote_id.as_ref() == Some(quote_id)
                    && existing.id != purchase_order.id
            }) {
                return Err(RepositoryError::Conflict(format!(
                    "quote `{}` already has a purchase order",
                    quote_id.0
                )));
            }
        }

        orders.insert(purchase_order.id.clone(), purchase_order);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNegotiationRepository {
    negotiations: RwLock<Vec<Negotiation>>,
}

impl InMemoryNegotiationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NegotiationRepository for InMemoryNegotiationRepository {
    async fn list_for_quote(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<Negotiation>, RepositoryError> {
        let mut rounds: Vec<Negotiation> = self
            .negotiations
            .read()
            .await
            .iter()
            .filter(|negotiation| &negotiation.quote_id == quote_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|negotiation| negotiation.round);
        Ok(rounds)
    }

    async fn save(&self, negotiation: Negotiation) -> Result<(), RepositoryError> {
        let mut negotiations = self.negotiations.write().await;
        match negotiations.iter_mut().find(|existing| existing.id == negotiation.id) {
            Some(existing) => *existing = negotiation,
            None => negotiations.push(negotiation),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut inbox: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|notification| &notification.user_id == user_id)
            .cloned()
            .collect();
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(inbox)
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        match notifications.iter_mut().find(|existing| existing.id == notification.id) {
            Some(existing) => *existing = notification,
            None => notifications.push(notification),
        }
        Ok(())
    }
}
