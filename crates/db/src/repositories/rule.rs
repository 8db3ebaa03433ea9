use sqlx::Row;

use procura_core::domain::rule::{ApprovalRule, RuleId};
use procura_core::domain::user::{Role, UserId};

use super::{parse_datetime, parse_decimal, ApprovalRuleRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalRuleRepository {
    pool: DbPool,
}

impl SqlApprovalRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const RULE_COLUMNS: &str = "id, name, min_amount, max_amount, category, department,
                            approver_role, approver_user_id, level, is_active, created_at";

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRule, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let min_amount_str: String =
        row.try_get("min_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let max_amount_str: Option<String> =
        row.try_get("max_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let department: Option<String> =
        row.try_get("department").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("approver_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approver_user_id: Option<String> =
        row.try_get("approver_user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let level: i64 = row.try_get("level").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let approver_role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown approver role `{role_str}`")))?;
    let max_amount = match max_amount_str {
        Some(raw) => Some(parse_decimal(&raw)?),
        None => None,
    };

    Ok(ApprovalRule {
        id: RuleId(id),
        name,
        min_amount: parse_decimal(&min_amount_str)?,
        max_amount,
        category,
        department,
        approver_role,
        approver_user_id: approver_user_id.map(UserId),
        level: level.max(0) as u32,
        is_active,
        created_at: parse_datetime(&created_at_str),
    })
}

#[async_trait::async_trait]
impl ApprovalRuleRepository for SqlApprovalRuleRepository {
    async fn find_by_id(&self, id: &RuleId) -> Result<Option<ApprovalRule>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM approval_rules WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_rule(r)?)),
            None => Ok(None),
        }
    }

    async fn list_active(&self) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM approval_rules
             WHERE is_active = 1 ORDER BY level ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, rule: ApprovalRule) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_rules (id, name, min_amount, max_amount, category, department,
                                         approver_role, approver_user_id, level, is_active,
                                         created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 min_amount = excluded.min_amount,
                 max_amount = excluded.max_amount,
                 category = excluded.category,
                 department = excluded.department,
                 approver_role = excluded.approver_role,
                 approver_user_id = excluded.approver_user_id,
                 level = excluded.level,
                 is_active = excluded.is_active",
        )
        .bind(&rule.id.0)
        .bind(&rule.name)
        .bind(rule.min_amount.to_string())
        .bind(rule.max_amount.map(|amount| amount.to_string()))
        .bind(&rule.category)
        .bind(&rule.department)
        .bind(rule.approver_role.as_str())
        .bind(rule.approver_user_id.as_ref().map(|id| id.0.clone()))
        .bind(rule.level as i64)
        .bind(rule.is_active)
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, id: &RuleId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE approval_rules SET is_active = 0 WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
