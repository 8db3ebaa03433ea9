use sqlx::Row;

use procura_core::domain::comparison::{ComparisonId, Criterion, QuoteComparison, QuoteScore};
use procura_core::domain::quote::QuoteId;
use procura_core::domain::requisition::RequisitionId;
use procura_core::domain::user::UserId;

use super::{parse_datetime, ComparisonRepository, RepositoryError};
use crate::DbPool;

pub struct SqlComparisonRepository {
    pool: DbPool,
}

impl SqlComparisonRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("bad {column} json: {error}")))
}

fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("encode {column} json: {error}")))
}

fn row_to_comparison(row: &sqlx::sqlite::SqliteRow) -> Result<QuoteComparison, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requisition_id: String =
        row.try_get("requisition_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_ids_json: String =
        row.try_get("quote_ids").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let criteria_json: String =
        row.try_get("criteria").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let weights_json: String =
        row.try_get("weights").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let scores_json: Option<String> =
        row.try_get("scores").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recommended_quote_id: Option<String> =
        row.try_get("recommended_quote_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quote_ids: Vec<QuoteId> = decode_json("quote_ids", &quote_ids_json)?;
    let criteria: Vec<Criterion> = decode_json("criteria", &criteria_json)?;
    let weights: Vec<f64> = decode_json("weights", &weights_json)?;
    let scores: Option<Vec<QuoteScore>> = match scores_json {
        Some(raw) => Some(decode_json("scores", &raw)?),
        None => None,
    };

    Ok(QuoteComparison {
        id: ComparisonId(id),
        requisition_id: RequisitionId(requisition_id),
        name,
        quote_ids,
        criteria,
        weights,
        scores,
        recommended_quote_id: recommended_quote_id.map(QuoteId),
        created_by: UserId(created_by),
        created_at: parse_datetime(&created_at_str),
    })
}

#[async_trait::async_trait]
impl ComparisonRepository for SqlComparisonRepository {
    async fn find_by_id(
        &self,
        id: &ComparisonId,
    ) -> Result<Option<QuoteComparison>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, requisition_id, name, quote_ids, criteria, weights, scores,
                    recommended_quote_id, created_by, created_at
             FROM quote_comparisons WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_comparison(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, comparison: QuoteComparison) -> Result<(), RepositoryError> {
        let quote_ids = encode_json("quote_ids", &comparison.quote_ids)?;
        let criteria = encode_json("criteria", &comparison.criteria)?;
        let weights = encode_json("weights", &comparison.weights)?;
        let scores = match &comparison.scores {
            Some(scores) => Some(encode_json("scores", scores)?),
            None => None,
        };

        sqlx::query(
            "INSERT INTO quote_comparisons (id, requisition_id, name, quote_ids, criteria,
                                            weights, scores, recommended_quote_id, created_by,
                                            created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 scores = excluded.scores,
                 recommended_quote_id = excluded.recommended_quote_id",
        )
        .bind(&comparison.id.0)
        .bind(&comparison.requisition_id.0)
        .bind(&comparison.name)
        .bind(quote_ids)
        .bind(criteria)
        .bind(weights)
        .bind(scores)
        .bind(comparison.recommended_quote_id.as_ref().map(|id| id.0.clone()))
        .bind(&comparison.created_by.0)
        .bind(comparison.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
