use sqlx::Row;

use procura_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use procura_core::domain::quote::{QuoteId, SupplierId};
use procura_core::domain::requisition::RequisitionId;
use procura_core::domain::user::UserId;

use super::{parse_datetime, parse_decimal, parse_opt_datetime, PurchaseOrderRepository};
use super::RepositoryError;
use crate::DbPool;

pub struct SqlPurchaseOrderRepository {
    pool: DbPool,
}

impl SqlPurchaseOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PO_COLUMNS: &str = "id, po_number, requisition_id, supplier_id, quote_id, total_amount,
                          terms, expected_delivery, auto_generated, status, created_by,
                          created_at";

fn row_to_purchase_order(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PurchaseOrder, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let po_number: String =
        row.try_get("po_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requisition_id: String =
        row.try_get("requisition_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_id: Option<String> =
        row.try_get("quote_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_amount_str: String =
        row.try_get("total_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let terms: Option<String> =
        row.try_get("terms").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expected_delivery_str: Option<String> =
        row.try_get("expected_delivery").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let auto_generated: bool =
        row.try_get("auto_generated").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = PurchaseOrderStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown purchase order status `{status_str}`"))
    })?;

    Ok(PurchaseOrder {
        id: PurchaseOrderId(id),
        po_number,
        requisition_id: RequisitionId(requisition_id),
        supplier_id: SupplierId(supplier_id),
        quote_id: quote_id.map(QuoteId),
        total_amount: parse_decimal(&total_amount_str)?,
        terms,
        expected_delivery: parse_opt_datetime(expected_delivery_str),
        auto_generated,
        status,
        created_by: UserId(created_by),
        created_at: parse_datetime(&created_at_str),
    })
}

#[async_trait::async_trait]
impl PurchaseOrderRepository for SqlPurchaseOrderRepository {
    async fn find_by_id(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_purchase_order(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_quote_id(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE quote_id = ?"
        ))
        .bind(&quote_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_purchase_order(r)?)),
            None => Ok(None),
        }
    }

    /// Update-then-insert rather than an upsert: the partial unique index on
    /// `quote_id` must only fire for genuinely new rows, where it surfaces as
    /// `Conflict`.
    async fn save(&self, purchase_order: PurchaseOrder) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            "UPDATE purchase_orders
             SET terms = ?, expected_delivery = ?, status = ?
             WHERE id = ?",
        )
        .bind(&purchase_order.terms)
        .bind(purchase_order.expected_delivery.map(|at| at.to_rfc3339()))
        .bind(purchase_order.status.as_str())
        .bind(&purchase_order.id.0)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO purchase_orders (id, po_number, requisition_id, supplier_id, quote_id,
                                          total_amount, terms, expected_delivery, auto_generated,
                                          status, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&purchase_order.id.0)
        .bind(&purchase_order.po_number)
        .bind(&purchase_order.requisition_id.0)
        .bind(&purchase_order.supplier_id.0)
        .bind(purchase_order.quote_id.as_ref().map(|id| id.0.clone()))
        .bind(purchase_order.total_amount.to_string())
        .bind(&purchase_order.terms)
        .bind(purchase_order.expected_delivery.map(|at| at.to_rfc3339()))
        .bind(purchase_order.auto_generated)
        .bind(purchase_order.status.as_str())
        .bind(&purchase_order.created_by.0)
        .bind(purchase_order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
