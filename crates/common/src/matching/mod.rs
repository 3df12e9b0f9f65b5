//! SKU matching
//!
//! Resolves free-text customer SKUs against the standard catalog:
//! - Character-overlap similarity scoring
//! - Batch detection (exact variation match first, fuzzy fallback second)

mod detection;
mod similarity;

pub use detection::{DetectionEngine, DetectionResult, MatchType, NO_MATCH_MESSAGE};
pub use similarity::{normalize, similarity, CONTAINMENT_SCORE};

/// Fuzzy candidates must score strictly above this
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Confidence reported for an exact variation match
pub const EXACT_MATCH_CONFIDENCE: u32 = 100;
