use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::{Role, UserId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// A single approval rule. Rules are matched against a requisition's amount,
/// category and department; `None` in an optional dimension matches anything.
/// Rules are never hard-deleted: deactivation flips `is_active` so historical
/// approval steps keep a valid rule reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: RuleId,
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub approver_role: Role,
    /// A pinned approver. Takes precedence over `approver_role` resolution.
    pub approver_user_id: Option<UserId>,
    pub level: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRule {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(max_amount) = self.max_amount {
            if self.min_amount > max_amount {
                return Err(DomainError::InvariantViolation(format!(
                    "rule `{}` min_amount {} exceeds max_amount {}",
                    self.id.0, self.min_amount, max_amount
                )));
            }
        }

        if self.level == 0 {
            return Err(DomainError::InvariantViolation(format!(
                "rule `{}` level must be a positive integer",
                self.id.0
            )));
        }

        Ok(())
    }

    /// Amount bounds are inclusive on both ends.
    pub fn matches(
        &self,
        amount: Decimal,
        category: Option<&str>,
        department: Option<&str>,
    ) -> bool {
        if !self.is_active {
            return false;
        }

        if amount < self.min_amount {
            return false;
        }

        if let Some(max_amount) = self.max_amount {
            if amount > max_amount {
                return false;
            }
        }

        if let Some(rule_category) = &self.category {
            if category.map(|value| !eq_key(rule_category, value)).unwrap_or(true) {
                return false;
            }
        }

        if let Some(rule_department) = &self.department {
            if department.map(|value| !eq_key(rule_department, value)).unwrap_or(true) {
                return false;
            }
        }

        true
    }
}

/// Filter `rules` down to those matching the requisition dimensions, ordered
/// ascending by level (lower level = earlier approval stage; ties broken by
/// rule id so step generation is deterministic).
pub fn applicable_rules(
    rules: &[ApprovalRule],
    amount: Decimal,
    category: Option<&str>,
    department: Option<&str>,
) -> Vec<ApprovalRule> {
    let mut matched: Vec<ApprovalRule> =
        rules.iter().filter(|rule| rule.matches(amount, category, department)).cloned().collect();
    matched.sort_by(|left, right| {
        left.level.cmp(&right.level).then_with(|| left.id.0.cmp(&right.id.0))
    });
    matched
}

fn eq_key(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
