//! Entity detection and deterministic surrogation.
//!
//! The sanitizer scans raw prompt text with a set of detection rules and
//! replaces every non-overlapping match with a stable surrogate value.
//! Repeated occurrences of the same entity value map to the same surrogate
//! within one call; nothing persists across requests.

pub mod rules;

pub use rules::RegexSanitizer;

use serde::Serialize;
use thiserror::Error;

/// Kind of sensitive entity a detection rule recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityType {
    #[serde(rename = "EMAIL")]
    Email,
    #[serde(rename = "PHONE")]
    Phone,
    #[serde(rename = "SSN")]
    Ssn,
    #[serde(rename = "OTHER")]
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Email => "EMAIL",
            EntityType::Phone => "PHONE",
            EntityType::Ssn => "SSN",
            EntityType::Other => "OTHER",
        }
    }

    /// Surrogate value for the `index`-th novel entity of this type.
    /// Indices start at 1.
    pub(crate) fn surrogate(&self, index: usize) -> String {
        match self {
            EntityType::Email => format!("person{index}@example.net"),
            EntityType::Phone => format!("555-010-{index:04}"),
            EntityType::Ssn => format!("900-00-{index:04}"),
            EntityType::Other => format!("redacted-{index}"),
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One placeholder-to-original link produced by a sanitization pass.
///
/// The `original_value` never leaves the request context; only the
/// placeholder, entity type, and confidence may appear in responses.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub placeholder: String,
    pub original_value: String,
    pub entity_type: EntityType,
    pub confidence: f64,
}

/// Output of a sanitization pass: the rewritten text plus the ordered
/// mapping table (left-to-right by first occurrence).
#[derive(Debug, Clone, Default)]
pub struct SanitizeResult {
    pub sanitized: String,
    pub mappings: Vec<Mapping>,
}

impl SanitizeResult {
    /// Minimum confidence across mappings, or the 0.99 sentinel when there
    /// are no detections so a clean prompt stays low-risk.
    pub fn min_confidence(&self) -> f64 {
        self.mappings
            .iter()
            .map(|m| m.confidence)
            .reduce(f64::min)
            .unwrap_or(0.99)
    }

    /// True when any mapping carries an entity type that unconditionally
    /// forbids raw forwarding.
    pub fn has_hard_block(&self) -> bool {
        self.mappings
            .iter()
            .any(|m| m.entity_type == EntityType::Ssn)
    }
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    /// Overlap resolution produced out-of-order replacements. Unreachable
    /// with the tie-break invariant intact.
    #[error("overlap resolution failure at byte {cursor}")]
    OverlapResolution { cursor: usize },
}

/// Contract for detection-and-surrogation engines.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> Result<SanitizeResult, SanitizeError>;
}
