//! Pure half of the approval workflow: rule-to-step planning, single-step
//! resolution, and the rollup that decides the requisition's fate.
//!
//! Persistence and notification delivery stay with the caller; everything
//! here is deterministic over its inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::requisition::Requisition;
use crate::domain::rule::{applicable_rules, ApprovalRule, RuleId};
use crate::domain::step::{ApprovalStep, StepId, StepStatus};
use crate::domain::user::{User, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no approver found holding role `{role}` required by rule `{rule_id}`")]
    NoApproverFound { rule_id: String, role: &'static str },
    #[error("pinned approver `{user_id}` for rule `{rule_id}` does not exist")]
    UnknownPinnedApprover { rule_id: String, user_id: String },
}

/// The step set planned for a requisition, in level order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPlan {
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalPlan {
    /// Zero applicable rules is a valid outcome: the requisition then gets
    /// no steps and this engine will never move it out of `pending`. Callers
    /// are expected to surface that gap rather than silently auto-approve.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalPlanner;

impl ApprovalPlanner {
    /// Plan one pending step per applicable rule, lowest level first.
    ///
    /// Approver resolution: a rule's pinned `approver_user_id` wins; otherwise
    /// the first directory user holding the rule's role is chosen. First-match
    /// is a documented simplification, not a load-balancing policy — the
    /// directory's listing order (creation order) makes it deterministic.
    pub fn plan(
        &self,
        requisition: &Requisition,
        rules: &[ApprovalRule],
        directory: &[User],
        now: DateTime<Utc>,
    ) -> Result<ApprovalPlan, PlanError> {
        let matched = applicable_rules(
            rules,
            requisition.estimated_amount,
            Some(requisition.category.as_str()),
            requisition.department.as_deref(),
        );

        let mut steps = Vec::with_capacity(matched.len());
        for rule in &matched {
            let approver_id = resolve_approver(rule, directory)?;
            steps.push(ApprovalStep {
                id: StepId(Uuid::new_v4().to_string()),
                requisition_id: requisition.id.clone(),
                rule_id: rule.id.clone(),
                approver_id,
                level: rule.level,
                status: StepStatus::Pending,
                comments: None,
                approved_at: None,
                created_at: now,
            });
        }

        Ok(ApprovalPlan { steps })
    }
}

fn resolve_approver(rule: &ApprovalRule, directory: &[User]) -> Result<UserId, PlanError> {
    if let Some(pinned) = &rule.approver_user_id {
        return directory
            .iter()
            .find(|user| &user.id == pinned)
            .map(|user| user.id.clone())
            .ok_or_else(|| PlanError::UnknownPinnedApprover {
                rule_id: rule.id.0.clone(),
                user_id: pinned.0.clone(),
            });
    }

    directory
        .iter()
        .find(|user| user.role == rule.approver_role)
        .map(|user| user.id.clone())
        .ok_or_else(|| PlanError::NoApproverFound {
            rule_id: rule.id.0.clone(),
            role: rule.approver_role.as_str(),
        })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDecision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("step `{step_id}` is assigned to `{assigned}`, not `{actor}`")]
    ApproverMismatch { step_id: String, assigned: String, actor: String },
    #[error("step `{step_id}` was already resolved as {status}")]
    AlreadyResolved { step_id: String, status: &'static str },
    #[error("rejection requires a reason")]
    CommentsRequired,
}

/// Apply an approver's decision to their own pending step.
///
/// Cross-approver resolution fails closed; rejection without a substantive
/// comment is refused so the requisition always carries a rejection reason.
pub fn resolve_step(
    step: &mut ApprovalStep,
    actor: &UserId,
    decision: StepDecision,
    comments: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), ResolutionError> {
    if &step.approver_id != actor {
        return Err(ResolutionError::ApproverMismatch {
            step_id: step.id.0.clone(),
            assigned: step.approver_id.0.clone(),
            actor: actor.0.clone(),
        });
    }

    if step.is_resolved() {
        return Err(ResolutionError::AlreadyResolved {
            step_id: step.id.0.clone(),
            status: step.status.as_str(),
        });
    }

    let trimmed = comments.map(str::trim).filter(|value| !value.is_empty());

    match decision {
        StepDecision::Approve => {
            step.status = StepStatus::Approved;
            step.approved_at = Some(now);
        }
        StepDecision::Reject => {
            if trimmed.is_none() {
                return Err(ResolutionError::CommentsRequired);
            }
            step.status = StepStatus::Rejected;
        }
    }

    step.comments = trimmed.map(ToOwned::to_owned);
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequisitionOutcome {
    /// Every generated step is approved — unanimity, no quorum logic.
    Approved,
    /// Any single rejected step is final for the whole requisition.
    Rejected { rejected_rule_id: RuleId, reason: Option<String> },
    /// At least one step is still pending and none are rejected.
    Outstanding { pending: usize },
}

/// Roll the full step set up into a requisition-level outcome. Rejection
/// short-circuits regardless of the other steps' states or resolution order.
pub fn rollup(steps: &[ApprovalStep]) -> RequisitionOutcome {
    if let Some(rejected) = steps.iter().find(|step| step.status == StepStatus::Rejected) {
        return RequisitionOutcome::Rejected {
            rejected_rule_id: rejected.rule_id.clone(),
            reason: rejected.comments.clone(),
        };
    }

    let pending = steps.iter().filter(|step| step.status == StepStatus::Pending).count();
    if pending > 0 {
        return RequisitionOutcome::Outstanding { pending };
    }

    RequisitionOutcome::Approved
}
