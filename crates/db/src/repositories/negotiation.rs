use sqlx::Row;

use procura_core::domain::negotiation::{Negotiation, NegotiationId, NegotiationStatus};
use procura_core::domain::quote::QuoteId;
use procura_core::domain::user::UserId;

use super::{parse_datetime, NegotiationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNegotiationRepository {
    pool: DbPool,
}

impl SqlNegotiationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_negotiation(row: &sqlx::sqlite::SqliteRow) -> Result<Negotiation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_id: String =
        row.try_get("quote_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let round: i64 = row.try_get("round").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let proposed_changes_json: String =
        row.try_get("proposed_changes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_terms_json: String =
        row.try_get("current_terms").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = NegotiationStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown negotiation status `{status_str}`"))
    })?;
    let proposed_changes = serde_json::from_str(&proposed_changes_json)
        .map_err(|error| RepositoryError::Decode(format!("bad proposed_changes json: {error}")))?;
    let current_terms = serde_json::from_str(&current_terms_json)
        .map_err(|error| RepositoryError::Decode(format!("bad current_terms json: {error}")))?;

    Ok(Negotiation {
        id: NegotiationId(id),
        quote_id: QuoteId(quote_id),
        round: round.max(0) as u32,
        status,
        proposed_changes,
        current_terms,
        created_by: UserId(created_by),
        created_at: parse_datetime(&created_at_str),
    })
}

#[async_trait::async_trait]
impl NegotiationRepository for SqlNegotiationRepository {
    async fn list_for_quote(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<Negotiation>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, quote_id, round, status, proposed_changes, current_terms, created_by,
                    created_at
             FROM negotiations WHERE quote_id = ? ORDER BY round ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_negotiation).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, negotiation: Negotiation) -> Result<(), RepositoryError> {
        let proposed_changes = serde_json::to_string(&negotiation.proposed_changes)
            .map_err(|error| RepositoryError::Decode(format!("encode proposed_changes: {error}")))?;
        let current_terms = serde_json::to_string(&negotiation.current_terms)
            .map_err(|error| RepositoryError::Decode(format!("encode current_terms: {error}")))?;

        sqlx::query(
            "INSERT INTO negotiations (id, quote_id, round, status, proposed_changes,
                                       current_terms, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 proposed_changes = excluded.proposed_changes,
                 current_terms = excluded.current_terms",
        )
        .bind(&negotiation.id.0)
        .bind(&negotiation.quote_id.0)
        .bind(negotiation.round as i64)
        .bind(negotiation.status.as_str())
        .bind(proposed_changes)
        .bind(current_terms)
        .bind(&negotiation.created_by.0)
        .bind(negotiation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
