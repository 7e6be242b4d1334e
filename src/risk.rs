//! Risk scoring.
//!
//! Maps a detection count to a numeric score, bands the score into a
//! category, and escalates one band when detection confidence falls below
//! the configured threshold.

use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Risk band for a scored request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Low,
    Medium,
    High,
    Critical,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Low => "Low",
            Category::Medium => "Medium",
            Category::High => "High",
            Category::Critical => "Critical",
        }
    }

    /// One-band promotion; Critical saturates.
    fn escalate(self) -> Category {
        match self {
            Category::Low => Category::Medium,
            Category::Medium => Category::High,
            Category::High => Category::Critical,
            Category::Critical => Category::Critical,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a request's detections.
#[derive(Debug, Clone, Copy)]
pub struct RiskResult {
    pub score: u32,
    pub category: Category,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum RiskError {
    /// Score fell outside [0, 100]. Unreachable with the clamp in place.
    #[error("invalid risk score: {0}")]
    InvalidScore(u32),
}

/// Scores detections and applies confidence escalation.
pub struct Scorer {
    confidence_threshold: f64,
}

impl Scorer {
    pub fn new(confidence_threshold: f64) -> Self {
        let confidence_threshold = if confidence_threshold <= 0.0 {
            DEFAULT_CONFIDENCE_THRESHOLD
        } else {
            confidence_threshold
        };
        Self {
            confidence_threshold,
        }
    }

    /// `score = min(detections * 25, 100)`, banded, then escalated one band
    /// when `confidence` is strictly below the threshold.
    pub fn evaluate(&self, detections: usize, confidence: f64) -> Result<RiskResult, RiskError> {
        let score = (detections as u32).saturating_mul(25).min(100);
        let base = band(score)?;

        let category = if confidence < self.confidence_threshold {
            base.escalate()
        } else {
            base
        };

        Ok(RiskResult {
            score,
            category,
            confidence,
        })
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

fn band(score: u32) -> Result<Category, RiskError> {
    match score {
        0..=24 => Ok(Category::Low),
        25..=49 => Ok(Category::Medium),
        50..=74 => Ok(Category::High),
        75..=100 => Ok(Category::Critical),
        other => Err(RiskError::InvalidScore(other)),
    }
}
