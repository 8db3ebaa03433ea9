//! JSON API routes for the procurement workflow.
//!
//! Endpoints (all under `/api/v1`):
//! - `POST /requisitions`                        — create a requisition and plan its approvals
//! - `GET  /requisitions/{id}`                   — fetch a requisition with its steps
//! - `POST /approval-steps/{id}/approve`         — resolve a step as approved
//! - `POST /approval-steps/{id}/reject`          — resolve a step as rejected (comments required)
//! - `GET  /pending-approvals`                   — steps waiting on the current actor
//! - `POST /quote-comparisons`                   — create a quote comparison
//! - `POST /quote-comparisons/{id}/calculate`    — run scoring over a comparison
//! - `POST /quotes/{quote_id}/generate-po`       — derive a purchase order from an accepted quote
//! - `POST /quotes/{quote_id}/negotiations`      — open a negotiation round
//! - `GET  /notifications`                       — the current actor's notifications
//!
//! Authentication proper lives in front of this service; the actor identity
//! arrives in the `x-actor-id` header and a missing header is a 401.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use procura_core::domain::comparison::{ComparisonId, Criterion, QuoteComparison, QuoteScore};
use procura_core::domain::negotiation::{Negotiation, NegotiationStatus};
use procura_core::domain::notification::{Notification, NotificationKind};
use procura_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderStatus};
use procura_core::domain::quote::QuoteId;
use procura_core::domain::requisition::{Requisition, RequisitionId, RequisitionStatus, Urgency};
use procura_core::domain::step::{ApprovalStep, StepId, StepStatus};
use procura_core::domain::user::UserId;
use procura_core::errors::WorkflowError;

use crate::workflow::{NewComparison, NewRequisition, WorkflowService};

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct ApiState {
    workflow: Arc<WorkflowService>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequisitionRequest {
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub estimated_amount: Decimal,
    pub urgency: Urgency,
    pub justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveStepRequest {
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectStepRequest {
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComparisonRequest {
    pub requisition_id: String,
    pub comparison_name: String,
    pub quote_ids: Vec<String>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub weights: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenNegotiationRequest {
    pub proposed_changes: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionView {
    pub id: String,
    pub requisition_number: String,
    pub requester_id: String,
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub estimated_amount: Decimal,
    pub urgency: Urgency,
    pub justification: Option<String>,
    pub department: Option<String>,
    pub status: RequisitionStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Requisition> for RequisitionView {
    fn from(requisition: Requisition) -> Self {
        Self {
            id: requisition.id.0,
            requisition_number: requisition.requisition_number,
            requester_id: requisition.requester_id.0,
            description: requisition.description,
            category: requisition.category,
            quantity: requisition.quantity,
            estimated_amount: requisition.estimated_amount,
            urgency: requisition.urgency,
            justification: requisition.justification,
            department: requisition.department,
            status: requisition.status,
            approved_by: requisition.approved_by.map(|id| id.0),
            approved_at: requisition.approved_at,
            rejection_reason: requisition.rejection_reason,
            created_at: requisition.created_at,
            updated_at: requisition.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStepView {
    pub id: String,
    pub requisition_id: String,
    pub rule_id: String,
    pub approver_id: String,
    pub level: u32,
    pub status: StepStatus,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApprovalStep> for ApprovalStepView {
    fn from(step: ApprovalStep) -> Self {
        Self {
            id: step.id.0,
            requisition_id: step.requisition_id.0,
            rule_id: step.rule_id.0,
            approver_id: step.approver_id.0,
            level: step.level,
            status: step.status,
            comments: step.comments,
            approved_at: step.approved_at,
            created_at: step.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionWithStepsResponse {
    pub requisition: RequisitionView,
    pub approval_steps: Vec<ApprovalStepView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteScoreView {
    pub quote_id: String,
    pub total_score: f64,
    pub price_score: f64,
    pub delivery_score: f64,
    pub quality_score: f64,
}

impl From<QuoteScore> for QuoteScoreView {
    fn from(score: QuoteScore) -> Self {
        Self {
            quote_id: score.quote_id.0,
            total_score: score.total_score,
            price_score: score.breakdown.price,
            delivery_score: score.breakdown.delivery,
            quality_score: score.breakdown.quality,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonView {
    pub id: String,
    pub requisition_id: String,
    pub name: String,
    pub quote_ids: Vec<String>,
    pub criteria: Vec<Criterion>,
    pub weights: Vec<f64>,
    pub scores: Option<Vec<QuoteScoreView>>,
    pub recommended_quote_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<QuoteComparison> for ComparisonView {
    fn from(comparison: QuoteComparison) -> Self {
        Self {
            id: comparison.id.0,
            requisition_id: comparison.requisition_id.0,
            name: comparison.name,
            quote_ids: comparison.quote_ids.into_iter().map(|id| id.0).collect(),
            criteria: comparison.criteria,
            weights: comparison.weights,
            scores: comparison
                .scores
                .map(|scores| scores.into_iter().map(QuoteScoreView::from).collect()),
            recommended_quote_id: comparison.recommended_quote_id.map(|id| id.0),
            created_by: comparison.created_by.0,
            created_at: comparison.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateScoresResponse {
    pub scores: Vec<QuoteScoreView>,
    pub recommended_quote_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: String,
    pub po_number: String,
    pub requisition_id: String,
    pub supplier_id: String,
    pub quote_id: Option<String>,
    pub total_amount: Decimal,
    pub terms: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub auto_generated: bool,
    pub status: PurchaseOrderStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<PurchaseOrder> for PurchaseOrderView {
    fn from(purchase_order: PurchaseOrder) -> Self {
        Self {
            id: purchase_order.id.0,
            po_number: purchase_order.po_number,
            requisition_id: purchase_order.requisition_id.0,
            supplier_id: purchase_order.supplier_id.0,
            quote_id: purchase_order.quote_id.map(|id| id.0),
            total_amount: purchase_order.total_amount,
            terms: purchase_order.terms,
            expected_delivery: purchase_order.expected_delivery,
            auto_generated: purchase_order.auto_generated,
            status: purchase_order.status,
            created_by: purchase_order.created_by.0,
            created_at: purchase_order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationView {
    pub id: String,
    pub quote_id: String,
    pub round: u32,
    pub status: NegotiationStatus,
    pub proposed_changes: serde_json::Value,
    pub current_terms: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Negotiation> for NegotiationView {
    fn from(negotiation: Negotiation) -> Self {
        Self {
            id: negotiation.id.0,
            quote_id: negotiation.quote_id.0,
            round: negotiation.round,
            status: negotiation.status,
            proposed_changes: negotiation.proposed_changes,
            current_terms: negotiation.current_terms,
            created_by: negotiation.created_by.0,
            created_at: negotiation.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub entity_type: String,
    pub entity_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id.0,
            user_id: notification.user_id.0,
            kind: notification.kind,
            title: notification.title,
            body: notification.body,
            entity_type: notification.entity_type,
            entity_id: notification.entity_id,
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(workflow: Arc<WorkflowService>) -> Router {
    let state = ApiState { workflow };

    Router::new()
        .route("/api/v1/requisitions", post(create_requisition))
        .route("/api/v1/requisitions/{id}", get(get_requisition))
        .route("/api/v1/approval-steps/{id}/approve", post(approve_step))
        .route("/api/v1/approval-steps/{id}/reject", post(reject_step))
        .route("/api/v1/pending-approvals", get(pending_approvals))
        .route("/api/v1/quote-comparisons", post(create_comparison))
        .route("/api/v1/quote-comparisons/{id}/calculate", post(calculate_comparison))
        .route("/api/v1/quotes/{quote_id}/generate-po", post(generate_purchase_order))
        .route("/api/v1/quotes/{quote_id}/negotiations", post(open_negotiation))
        .route("/api/v1/notifications", get(list_notifications))
        .with_state(state)
}

fn actor_from(headers: &HeaderMap) -> Result<UserId, ApiFailure> {
    let value = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match value {
        Some(actor) => Ok(UserId(actor.to_string())),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError { error: format!("missing `{ACTOR_HEADER}` header") }),
        )),
    }
}

fn error_response(error: WorkflowError) -> ApiFailure {
    let status = match &error {
        WorkflowError::Validation(_)
        | WorkflowError::InvalidState(_)
        | WorkflowError::Duplicate(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Authorization(_) => StatusCode::FORBIDDEN,
        WorkflowError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %error, "workflow operation failed");
    }

    (status, Json(ApiError { error: error.to_string() }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_requisition(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateRequisitionRequest>,
) -> Result<(StatusCode, Json<RequisitionWithStepsResponse>), ApiFailure> {
    let actor = actor_from(&headers)?;

    let (requisition, steps) = state
        .workflow
        .create_requisition(
            &actor,
            NewRequisition {
                description: request.description,
                category: request.category,
                quantity: request.quantity,
                estimated_amount: request.estimated_amount,
                urgency: request.urgency,
                justification: request.justification,
            },
        )
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(RequisitionWithStepsResponse {
            requisition: requisition.into(),
            approval_steps: steps.into_iter().map(ApprovalStepView::from).collect(),
        }),
    ))
}

async fn get_requisition(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RequisitionWithStepsResponse>, ApiFailure> {
    actor_from(&headers)?;

    let (requisition, steps) = state
        .workflow
        .requisition_with_steps(&RequisitionId(id))
        .await
        .map_err(error_response)?;

    Ok(Json(RequisitionWithStepsResponse {
        requisition: requisition.into(),
        approval_steps: steps.into_iter().map(ApprovalStepView::from).collect(),
    }))
}

async fn approve_step(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<ApproveStepRequest>,
) -> Result<Json<AckResponse>, ApiFailure> {
    let actor = actor_from(&headers)?;

    state
        .workflow
        .approve_step(&StepId(id), &actor, request.comments.as_deref())
        .await
        .map_err(error_response)?;

    Ok(Json(AckResponse { success: true }))
}

async fn reject_step(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<RejectStepRequest>,
) -> Result<Json<AckResponse>, ApiFailure> {
    let actor = actor_from(&headers)?;

    // Comments are the rejection reason; refusing without one is refused
    // here so the step is never loaded for a request that cannot succeed.
    let comments = match request.comments.as_deref().map(str::trim) {
        Some(comments) if !comments.is_empty() => comments.to_string(),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError { error: "comments are required when rejecting".to_string() }),
            ))
        }
    };

    state
        .workflow
        .reject_step(&StepId(id), &actor, &comments)
        .await
        .map_err(error_response)?;

    Ok(Json(AckResponse { success: true }))
}

async fn pending_approvals(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApprovalStepView>>, ApiFailure> {
    let actor = actor_from(&headers)?;

    let steps = state.workflow.pending_approvals(&actor).await.map_err(error_response)?;
    Ok(Json(steps.into_iter().map(ApprovalStepView::from).collect()))
}

async fn create_comparison(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateComparisonRequest>,
) -> Result<(StatusCode, Json<ComparisonView>), ApiFailure> {
    let actor = actor_from(&headers)?;

    let criteria = if request.criteria.is_empty() {
        QuoteComparison::DEFAULT_CRITERIA.to_vec()
    } else {
        request.criteria
    };
    let weights = if request.weights.is_empty() {
        QuoteComparison::DEFAULT_WEIGHTS.to_vec()
    } else {
        request.weights
    };

    let comparison = state
        .workflow
        .create_comparison(
            &actor,
            NewComparison {
                requisition_id: RequisitionId(request.requisition_id),
                name: request.comparison_name,
                quote_ids: request.quote_ids.into_iter().map(QuoteId).collect(),
                criteria,
                weights,
            },
        )
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(comparison.into())))
}

async fn calculate_comparison(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CalculateScoresResponse>, ApiFailure> {
    actor_from(&headers)?;

    let comparison =
        state.workflow.calculate_scores(&ComparisonId(id)).await.map_err(error_response)?;

    Ok(Json(CalculateScoresResponse {
        scores: comparison
            .scores
            .unwrap_or_default()
            .into_iter()
            .map(QuoteScoreView::from)
            .collect(),
        recommended_quote_id: comparison.recommended_quote_id.map(|id| id.0),
    }))
}

async fn generate_purchase_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(quote_id): Path<String>,
) -> Result<(StatusCode, Json<PurchaseOrderView>), ApiFailure> {
    let actor = actor_from(&headers)?;

    let purchase_order = state
        .workflow
        .generate_purchase_order(&QuoteId(quote_id), &actor)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(purchase_order.into())))
}

async fn open_negotiation(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(quote_id): Path<String>,
    Json(request): Json<OpenNegotiationRequest>,
) -> Result<(StatusCode, Json<NegotiationView>), ApiFailure> {
    let actor = actor_from(&headers)?;

    let negotiation = state
        .workflow
        .open_negotiation(&QuoteId(quote_id), &actor, request.proposed_changes)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(negotiation.into())))
}

async fn list_notifications(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<NotificationView>>, ApiFailure> {
    let actor = actor_from(&headers)?;

    let notifications =
        state.workflow.notifications_for(&actor).await.map_err(error_response)?;
    Ok(Json(notifications.into_iter().map(NotificationView::from).collect()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
    use axum::Json;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use procura_core::config::ProcurementConfig;
    use procura_core::domain::quote::{Quote, QuoteId, QuoteStatus, SupplierId};
    use procura_core::domain::requisition::{RequisitionId, RequisitionStatus, Urgency};
    use procura_core::domain::rule::{ApprovalRule, RuleId};
    use procura_core::domain::user::{Role, User, UserId};
    use procura_core::InMemoryAuditSink;
    use procura_db::connection::connect_with_settings;
    use procura_db::repositories::{ApprovalRuleRepository, QuoteRepository, UserRepository};
    use procura_db::{migrations, DbPool};

    use crate::workflow::{Repositories, WorkflowService};

    use super::{
        actor_from, approve_step, calculate_comparison, create_comparison, create_requisition,
        generate_purchase_order, get_requisition, pending_approvals, reject_step, ApiState,
        CreateComparisonRequest, CreateRequisitionRequest, RejectStepRequest, ACTOR_HEADER,
    };

    async fn setup() -> (ApiState, Repositories, DbPool) {
        // Single connection: every handle on an in-memory database must be
        // the same handle.
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let repos = Repositories::sql(pool.clone());
        let procurement = ProcurementConfig {
            default_delivery_days: 30,
            default_price_weight: 0.5,
            default_delivery_weight: 0.3,
            default_quality_weight: 0.2,
        };
        let workflow = Arc::new(WorkflowService::new(
            repos.clone(),
            &procurement,
            Arc::new(InMemoryAuditSink::default()),
        ));
        (ApiState { workflow }, repos, pool)
    }

    fn headers(actor: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(actor).expect("header value"));
        headers
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
                requisition_id: RequisitionId(requisition_id.to_string()),
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

    fn requisition_body(amount: i64) -> CreateRequisitionRequest {
        CreateRequisitionRequest {
            description: "laptops".to_string(),
            category: "equipment".to_string(),
            quantity: 4,
            estimated_amount: Decimal::new(amount, 0),
            urgency: Urgency::Medium,
            justification: None,
        }
    }

    #[test]
    fn missing_actor_header_is_unauthorized() {
        let error = actor_from(&HeaderMap::new()).expect_err("no header");
        assert_eq!(error.0, StatusCode::UNAUTHORIZED);

        let mut blank = HeaderMap::new();
        blank.insert(ACTOR_HEADER, HeaderValue::from_static("   "));
        assert!(actor_from(&blank).is_err());
    }

    #[tokio::test]
    async fn two_step_approval_flow_over_sqlite() {
        let (state, repos, _pool) = setup().await;
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_user(&repos, "u-approver", Role::Approver).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;
        seed_rule(&repos, "R-2", Role::Approver, 2).await;

        let (status, Json(created)) = create_requisition(
            State(state.clone()),
            headers("u-req"),
            Json(requisition_body(6000)),
        )
        .await
        .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.approval_steps.len(), 2);
        assert_eq!(created.requisition.status, RequisitionStatus::Pending);

        // Level-1 approver sees exactly their step pending.
        let Json(pending) = pending_approvals(State(state.clone()), headers("u-admin"))
            .await
            .expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, created.approval_steps[0].id);

        approve_step(
            State(state.clone()),
            headers("u-admin"),
            Path(created.approval_steps[0].id.clone()),
            Json(super::ApproveStepRequest { comments: None }),
        )
        .await
        .expect("approve level 1");

        let Json(mid) = get_requisition(
            State(state.clone()),
            headers("u-req"),
            Path(created.requisition.id.clone()),
        )
        .await
        .expect("reload");
        assert_eq!(mid.requisition.status, RequisitionStatus::Pending);

        approve_step(
            State(state.clone()),
            headers("u-approver"),
            Path(created.approval_steps[1].id.clone()),
            Json(super::ApproveStepRequest { comments: Some("ok".to_string()) }),
        )
        .await
        .expect("approve level 2");

        let Json(done) = get_requisition(
            State(state.clone()),
            headers("u-req"),
            Path(created.requisition.id.clone()),
        )
        .await
        .expect("reload");
        assert_eq!(done.requisition.status, RequisitionStatus::Approved);
        assert_eq!(done.requisition.approved_by.as_deref(), Some("u-approver"));
    }

    #[tokio::test]
    async fn rejection_short_circuits_with_the_stored_reason() {
        let (state, repos, _pool) = setup().await;
        seed_user(&repos, "u-req", Role::User).await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        seed_user(&repos, "u-approver", Role::Approver).await;
        seed_rule(&repos, "R-1", Role::Admin, 1).await;
        seed_rule(&repos, "R-2", Role::Approver, 2).await;

        let (_, Json(created)) = create_requisition(
            State(state.clone()),
            headers("u-req"),
            Json(requisition_body(6000)),
        )
        .await
        .expect("create");

        reject_step(
            State(state.clone()),
            headers("u-admin"),
            Path(created.approval_steps[0].id.clone()),
            Json(RejectStepRequest { comments: Some("over budget".to_string()) }),
        )
        .await
        .expect("reject");

        let Json(reloaded) = get_requisition(
            State(state.clone()),
            headers("u-req"),
            Path(created.requisition.id.clone()),
        )
        .await
        .expect("reload");
        assert_eq!(reloaded.requisition.status, RequisitionStatus::Rejected);
        assert_eq!(reloaded.requisition.rejection_reason.as_deref(), Some("over budget"));
    }

    #[tokio::test]
    async fn purchase_order_generation_second_call_fails() {
        let (state, repos, _pool) = setup().await;
        seed_user(&repos, "u-req", Role::User).await;

        let (_, Json(created)) = create_requisition(
            State(state.clone()),
            headers("u-req"),
            Json(requisition_body(6000)),
        )
        .await
        .expect("create");
        seed_quote(&repos, "quo-1", &created.requisition.id, 100_000, Some(14), QuoteStatus::Accepted)
            .await;

        let (status, Json(po)) = generate_purchase_order(
            State(state.clone()),
            headers("u-req"),
            Path("quo-1".to_string()),
        )
        .await
        .expect("first generation");
        assert_eq!(status, StatusCode::CREATED);
        assert!(po.auto_generated);
        assert_eq!(po.quote_id.as_deref(), Some("quo-1"));

        let error = generate_purchase_order(
            State(state.clone()),
            headers("u-req"),
            Path("quo-1".to_string()),
        )
        .await
        .expect_err("second generation");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn comparison_calculation_recommends_the_cheapest_fast_quote() {
        let (state, repos, _pool) = setup().await;
        seed_user(&repos, "u-req", Role::User).await;

        let (_, Json(created)) = create_requisition(
            State(state.clone()),
            headers("u-req"),
            Json(requisition_body(6000)),
        )
        .await
        .expect("create");
        let requisition_id = created.requisition.id.clone();
        seed_quote(&repos, "quo-a", &requisition_id, 100_000, Some(7), QuoteStatus::Submitted)
            .await;
        seed_quote(&repos, "quo-b", &requisition_id, 120_000, Some(14), QuoteStatus::Submitted)
            .await;
        seed_quote(&repos, "quo-c", &requisition_id, 90_000, Some(30), QuoteStatus::Submitted)
            .await;

        let (status, Json(comparison)) = create_comparison(
            State(state.clone()),
            headers("u-req"),
            Json(CreateComparisonRequest {
                requisition_id: requisition_id.clone(),
                comparison_name: "laptop bids".to_string(),
                quote_ids: vec![
                    "quo-a".to_string(),
                    "quo-b".to_string(),
                    "quo-c".to_string(),
                ],
                criteria: Vec::new(),
                weights: Vec::new(),
            }),
        )
        .await
        .expect("create comparison");
        assert_eq!(status, StatusCode::CREATED);
        // Empty criteria/weights fall back to the documented defaults.
        assert_eq!(comparison.weights, [0.5, 0.3, 0.2]);

        let Json(calculated) = calculate_comparison(
            State(state.clone()),
            headers("u-req"),
            Path(comparison.id.clone()),
        )
        .await
        .expect("calculate");
        assert_eq!(calculated.scores.len(), 3);
        assert_eq!(calculated.scores[0].total_score, 78.33);
        assert_eq!(calculated.recommended_quote_id.as_deref(), Some("quo-a"));
    }

    #[tokio::test]
    async fn router_maps_auth_and_validation_failures() {
        let (state, repos, _pool) = setup().await;
        seed_user(&repos, "u-admin", Role::Admin).await;
        let app = super::router(state.workflow.clone());

        // No actor header at all.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/pending-approvals")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Rejecting without comments never reaches the store.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/approval-steps/step-1/reject")
                    .header(ACTOR_HEADER, "u-admin")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // With comments present, an unknown step is a 404.
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/approval-steps/step-1/reject")
                    .header(ACTOR_HEADER, "u-admin")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"comments":"too costly"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
