//! Multi-criteria quote comparison scoring.
//!
//! Price is scored relative to the compared set (cheapest 100, dearest 0),
//! delivery through a fixed step function on lead-time days, and quality is
//! a constant placeholder until a real supplier-quality signal exists.
//! Per-criterion scores are combined with the comparison's positional
//! weights and rounded to two decimals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::comparison::{Criterion, QuoteScore, ScoreBreakdown};
use crate::domain::quote::{Quote, QuoteId};

/// Weights applied per criterion when a comparison does not override them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringWeights {
    pub price: f64,
    pub delivery: f64,
    pub quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { price: 0.5, delivery: 0.3, quality: 0.2 }
    }
}

#[derive(Clone, Debug)]
pub struct ComparisonScorer {
    default_delivery_days: u32,
}

impl ComparisonScorer {
    /// No quality signal is computed yet; every quote gets this constant.
    pub const QUALITY_PLACEHOLDER: f64 = 75.0;

    pub fn new(default_delivery_days: u32) -> Self {
        Self { default_delivery_days }
    }

    /// Score each quote against the others in the set.
    ///
    /// Price scoring is relative: rescoring the same quote inside a
    /// different comparison set yields a different score.
    pub fn score(
        &self,
        quotes: &[Quote],
        criteria: &[Criterion],
        weights: &[f64],
    ) -> Vec<QuoteScore> {
        let prices: Vec<f64> = quotes.iter().map(|quote| decimal_to_f64(quote.total_amount)).collect();
        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        quotes
            .iter()
            .zip(&prices)
            .map(|(quote, price)| {
                let breakdown = ScoreBreakdown {
                    price: price_score(*price, min_price, max_price),
                    delivery: delivery_score(
                        quote.delivery_days.unwrap_or(self.default_delivery_days),
                    ),
                    quality: Self::QUALITY_PLACEHOLDER,
                };
                QuoteScore {
                    quote_id: quote.id.clone(),
                    total_score: weighted_total(&breakdown, criteria, weights),
                    breakdown,
                }
            })
            .collect()
    }

    /// The entry with the maximum total score; ties break to the first
    /// maximum in list order.
    pub fn recommend(scores: &[QuoteScore]) -> Option<QuoteId> {
        scores
            .iter()
            .reduce(|best, candidate| {
                if candidate.total_score > best.total_score {
                    candidate
                } else {
                    best
                }
            })
            .map(|score| score.quote_id.clone())
    }
}

/// Linear interpolation between the set's extremes: cheapest quote scores
/// 100, most expensive 0. A degenerate set (all prices equal) scores 100
/// across the board rather than dividing by zero.
fn price_score(price: f64, min_price: f64, max_price: f64) -> f64 {
    let range = max_price - min_price;
    if range <= f64::EPSILON {
        return 100.0;
    }
    (max_price - price) / range * 100.0
}

fn delivery_score(delivery_days: u32) -> f64 {
    match delivery_days {
        0..=7 => 100.0,
        8..=14 => 80.0,
        15..=21 => 60.0,
        22..=30 => 40.0,
        _ => 20.0,
    }
}

fn weighted_total(breakdown: &ScoreBreakdown, criteria: &[Criterion], weights: &[f64]) -> f64 {
    let total: f64 = criteria
        .iter()
        .zip(weights)
        .map(|(criterion, weight)| {
            let score = match criterion {
                Criterion::Price => breakdown.price,
                Criterion::Delivery => breakdown.delivery,
                Criterion::Quality => breakdown.quality,
            };
            score * weight
        })
        .sum();

    round2(total)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
