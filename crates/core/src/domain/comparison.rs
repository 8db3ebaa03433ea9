use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteId;
use crate::domain::requisition::RequisitionId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Price,
    Delivery,
    Quality,
}

impl Criterion {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price" => Some(Self::Price),
            "delivery" => Some(Self::Delivery),
            "quality" => Some(Self::Quality),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Delivery => "delivery",
            Self::Quality => "quality",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub price: f64,
    pub delivery: f64,
    pub quality: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteScore {
    pub quote_id: QuoteId,
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
}

/// A comparison over a requisition's quote set. `scores` stays `None` until
/// calculation runs; `recommended_quote_id` is derived from the scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteComparison {
    pub id: ComparisonId,
    pub requisition_id: RequisitionId,
    pub name: String,
    pub quote_ids: Vec<QuoteId>,
    pub criteria: Vec<Criterion>,
    /// Positional: `weights[i]` applies to `criteria[i]`. Weights are not
    /// normalized to sum to 1.0; scores are only comparable within one
    /// comparison.
    pub weights: Vec<f64>,
    pub scores: Option<Vec<QuoteScore>>,
    pub recommended_quote_id: Option<QuoteId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl QuoteComparison {
    pub const DEFAULT_CRITERIA: [Criterion; 3] =
        [Criterion::Price, Criterion::Delivery, Criterion::Quality];
    pub const DEFAULT_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quote_ids.len() < 2 {
            return Err(DomainError::InvariantViolation(
                "a comparison requires at least two quotes".to_string(),
            ));
        }

        if self.criteria.is_empty() {
            return Err(DomainError::InvariantViolation(
                "a comparison requires at least one criterion".to_string(),
            ));
        }

        if self.criteria.len() != self.weights.len() {
            return Err(DomainError::InvariantViolation(format!(
                "criteria/weights length mismatch: {} criteria vs {} weights",
                self.criteria.len(),
                self.weights.len()
            )));
        }

        if self.weights.iter().any(|weight| !weight.is_finite() || *weight <= 0.0) {
            return Err(DomainError::InvariantViolation(
                "weights must be finite positive numbers".to_string(),
            ));
        }

        Ok(())
    }
}
