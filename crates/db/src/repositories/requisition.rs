use sqlx::Row;

use procura_core::domain::requisition::{
    Requisition, RequisitionId, RequisitionStatus, Urgency,
};
use procura_core::domain::user::UserId;

use super::{parse_datetime, parse_decimal, parse_opt_datetime, RepositoryError};
use super::RequisitionRepository;
use crate::DbPool;

pub struct SqlRequisitionRepository {
    pool: DbPool,
}

impl SqlRequisitionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const REQUISITION_COLUMNS: &str =
    "id, requisition_number, requester_id, description, category, quantity, estimated_amount,
     urgency, justification, department, status, approved_by, approved_at, rejection_reason,
     created_at, updated_at";

fn row_to_requisition(row: &sqlx::sqlite::SqliteRow) -> Result<Requisition, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requisition_number: String =
        row.try_get("requisition_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requester_id: String =
        row.try_get("requester_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let estimated_amount_str: String =
        row.try_get("estimated_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let urgency_str: String =
        row.try_get("urgency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let justification: Option<String> =
        row.try_get("justification").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let department: Option<String> =
        row.try_get("department").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approved_by: Option<String> =
        row.try_get("approved_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approved_at_str: Option<String> =
        row.try_get("approved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rejection_reason: Option<String> =
        row.try_get("rejection_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = RequisitionStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown requisition status `{status_str}`"))
    })?;
    let urgency = Urgency::parse(&urgency_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown urgency `{urgency_str}`")))?;

    Ok(Requisition {
        id: RequisitionId(id),
        requisition_number,
        requester_id: UserId(requester_id),
        description,
        category,
        quantity: quantity.max(0) as u32,
        estimated_amount: parse_decimal(&estimated_amount_str)?,
        urgency,
        justification,
        department,
        status,
        approved_by: approved_by.map(UserId),
        approved_at: parse_opt_datetime(approved_at_str),
        rejection_reason,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

#[async_trait::async_trait]
impl RequisitionRepository for SqlRequisitionRepository {
    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUISITION_COLUMNS} FROM requisitions WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_requisition(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, requisition: Requisition) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO requisitions (id, requisition_number, requester_id, description,
                                       category, quantity, estimated_amount, urgency,
                                       justification, department, status, approved_by,
                                       approved_at, rejection_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 description = excluded.description,
                 category = excluded.category,
                 quantity = excluded.quantity,
                 estimated_amount = excluded.estimated_amount,
                 urgency = excluded.urgency,
                 justification = excluded.justification,
                 department = excluded.department,
                 status = excluded.status,
                 approved_by = excluded.approved_by,
                 approved_at = excluded.approved_at,
                 rejection_reason = excluded.rejection_reason,
                 updated_at = excluded.updated_at",
        )
        .bind(&requisition.id.0)
        .bind(&requisition.requisition_number)
        .bind(&requisition.requester_id.0)
        .bind(&requisition.description)
        .bind(&requisition.category)
        .bind(requisition.quantity as i64)
        .bind(requisition.estimated_amount.to_string())
        .bind(requisition.urgency.as_str())
        .bind(&requisition.justification)
        .bind(&requisition.department)
        .bind(requisition.status.as_str())
        .bind(requisition.approved_by.as_ref().map(|id| id.0.clone()))
        .bind(requisition.approved_at.map(|at| at.to_rfc3339()))
        .bind(&requisition.rejection_reason)
        .bind(requisition.created_at.to_rfc3339())
        .bind(requisition.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
