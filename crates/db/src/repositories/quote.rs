use sqlx::Row;

use procura_core::domain::quote::{Quote, QuoteId, QuoteStatus, SupplierId};
use procura_core::domain::requisition::RequisitionId;

use super::{parse_datetime, parse_decimal, QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const QUOTE_COLUMNS: &str = "id, quote_number, requisition_id, supplier_id, total_amount,
                             delivery_days, terms, status, negotiation_rounds, created_at,
                             updated_at";

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_number: String =
        row.try_get("quote_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requisition_id: String =
        row.try_get("requisition_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_amount_str: String =
        row.try_get("total_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivery_days: Option<i64> =
        row.try_get("delivery_days").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let terms: Option<String> =
        row.try_get("terms").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let negotiation_rounds: i64 =
        row.try_get("negotiation_rounds").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = QuoteStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_str}`")))?;

    Ok(Quote {
        id: QuoteId(id),
        quote_number,
        requisition_id: RequisitionId(requisition_id),
        supplier_id: SupplierId(supplier_id),
        total_amount: parse_decimal(&total_amount_str)?,
        delivery_days: delivery_days.map(|days| days.max(0) as u32),
        terms,
        status,
        negotiation_rounds: negotiation_rounds.max(0) as u32,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_requisition(
        &self,
        requisition_id: &RequisitionId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes
             WHERE requisition_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&requisition_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quotes (id, quote_number, requisition_id, supplier_id, total_amount,
                                 delivery_days, terms, status, negotiation_rounds, created_at,
                                 updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 total_amount = excluded.total_amount,
                 delivery_days = excluded.delivery_days,
                 terms = excluded.terms,
                 status = excluded.status,
                 negotiation_rounds = excluded.negotiation_rounds,
                 updated_at = excluded.updated_at",
        )
        .bind(&quote.id.0)
        .bind(&quote.quote_number)
        .bind(&quote.requisition_id.0)
        .bind(&quote.supplier_id.0)
        .bind(quote.total_amount.to_string())
        .bind(quote.delivery_days.map(|days| days as i64))
        .bind(&quote.terms)
        .bind(quote.status.as_str())
        .bind(quote.negotiation_rounds as i64)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
