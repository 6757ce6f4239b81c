//! Accuracy scoring for predictions against a resolved outcome.

use crate::error::SettleError;
use crate::types::ScoringMode;

pub const MIN_VALUE: f64 = 0.0;
pub const MAX_VALUE: f64 = 100.0;

/// Maps a raw prediction onto [0, 100]. "yes"/"no" are the binary extremes.
pub fn normalize(raw: &str) -> Result<f64, SettleError> {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("yes") {
        return Ok(MAX_VALUE);
    }
    if trimmed.eq_ignore_ascii_case("no") {
        return Ok(MIN_VALUE);
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| SettleError::InvalidPredictionFormat(raw.to_string()))?;

    if !value.is_finite() || !(MIN_VALUE..=MAX_VALUE).contains(&value) {
        return Err(SettleError::InvalidPredictionFormat(raw.to_string()));
    }

    Ok(value)
}

/// Score in (0, 1]; exactly 1 when the prediction hits the outcome.
pub fn score(prediction: f64, outcome: f64, mode: ScoringMode) -> f64 {
    let distance = (prediction - outcome).abs();

    match mode {
        ScoringMode::Linear => 1.0 / (distance + 1.0),
        ScoringMode::Quadratic => 1.0 / (distance * distance + 1.0),
    }
}

/// Validates an admin or oracle supplied outcome.
pub fn check_outcome(outcome: f64) -> Result<f64, SettleError> {
    if outcome.is_finite() && (MIN_VALUE..=MAX_VALUE).contains(&outcome) {
        Ok(outcome)
    } else {
        Err(SettleError::InvalidOutcome(outcome.to_string()))
    }
}
