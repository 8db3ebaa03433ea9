use sqlx::Row;

use procura_core::domain::requisition::RequisitionId;
use procura_core::domain::rule::RuleId;
use procura_core::domain::step::{ApprovalStep, StepId, StepStatus};
use procura_core::domain::user::UserId;

use super::{parse_datetime, parse_opt_datetime, ApprovalStepRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalStepRepository {
    pool: DbPool,
}

impl SqlApprovalStepRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const STEP_COLUMNS: &str =
    "id, requisition_id, rule_id, approver_id, level, status, comments, approved_at, created_at";

const STEP_UPSERT: &str =
    "INSERT INTO approval_steps (id, requisition_id, rule_id, approver_id, level, status,
                                 comments, approved_at, created_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
         status = excluded.status,
         comments = excluded.comments,
         approved_at = excluded.approved_at";

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requisition_id: String =
        row.try_get("requisition_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rule_id: String =
        row.try_get("rule_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approver_id: String =
        row.try_get("approver_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let level: i64 = row.try_get("level").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comments: Option<String> =
        row.try_get("comments").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approved_at_str: Option<String> =
        row.try_get("approved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = StepStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step status `{status_str}`")))?;

    Ok(ApprovalStep {
        id: StepId(id),
        requisition_id: RequisitionId(requisition_id),
        rule_id: RuleId(rule_id),
        approver_id: UserId(approver_id),
        level: level.max(0) as u32,
        status,
        comments,
        approved_at: parse_opt_datetime(approved_at_str),
        created_at: parse_datetime(&created_at_str),
    })
}

fn bind_step<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    step: &'q ApprovalStep,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&step.id.0)
        .bind(&step.requisition_id.0)
        .bind(&step.rule_id.0)
        .bind(&step.approver_id.0)
        .bind(step.level as i64)
        .bind(step.status.as_str())
        .bind(&step.comments)
        .bind(step.approved_at.map(|at| at.to_rfc3339()))
        .bind(step.created_at.to_rfc3339())
}

#[async_trait::async_trait]
impl ApprovalStepRepository for SqlApprovalStepRepository {
    async fn find_by_id(&self, id: &StepId) -> Result<Option<ApprovalStep>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_step(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps
             WHERE requisition_id = ? ORDER BY level ASC, id ASC"
        ))
        .bind(&requisition_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps
             WHERE approver_id = ? AND status = 'pending'
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(&approver_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, step: ApprovalStep) -> Result<(), RepositoryError> {
        bind_step(sqlx::query(STEP_UPSERT), &step).execute(&self.pool).await?;
        Ok(())
    }

    /// Writes the generated batch atomically; either the whole plan lands or
    /// none of it does.
    async fn save_all(&self, steps: &[ApprovalStep]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for step in steps {
            bind_step(sqlx::query(STEP_UPSERT), step).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
