//! Batch SKU detection against a catalog snapshot

use super::similarity::similarity;
use super::{DEFAULT_FUZZY_THRESHOLD, EXACT_MATCH_CONFIDENCE};
use crate::db::{MappingWithVariations, VariationView};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Message carried by undetected results
pub const NO_MATCH_MESSAGE: &str = "No matching standard SKU found";

/// How a result was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::None => "none",
        }
    }
}

/// Resolution of a single input SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Input exactly as supplied
    pub original: String,

    pub detected: bool,

    pub match_type: MatchType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u32>,

    /// Provenance of the matched variation (exact matches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DetectionResult {
    fn exact(original: &str, mapping: &MappingWithVariations, variation: &VariationView) -> Self {
        Self {
            original: original.to_string(),
            detected: true,
            match_type: MatchType::Exact,
            suggested: Some(mapping.standard_sku.clone()),
            description: Some(mapping.standard_description.clone()),
            confidence: Some(EXACT_MATCH_CONFIDENCE),
            source: Some(variation.source.clone()),
            customer_id: Some(variation.customer_id),
            customer_name: variation.customer_name.clone(),
            message: None,
        }
    }

    fn fuzzy(original: &str, mapping: &MappingWithVariations, confidence: u32) -> Self {
        Self {
            original: original.to_string(),
            detected: true,
            match_type: MatchType::Fuzzy,
            suggested: Some(mapping.standard_sku.clone()),
            description: Some(mapping.standard_description.clone()),
            confidence: Some(confidence),
            source: None,
            customer_id: None,
            customer_name: None,
            message: None,
        }
    }

    fn undetected(original: &str) -> Self {
        Self {
            original: original.to_string(),
            detected: false,
            match_type: MatchType::None,
            suggested: None,
            description: None,
            confidence: None,
            source: None,
            customer_id: None,
            customer_name: None,
            message: Some(NO_MATCH_MESSAGE.to_string()),
        }
    }
}

/// Stateless detector; the catalog is passed per call so every request
/// works from its own snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DetectionEngine {
    threshold: f64,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}

impl DetectionEngine {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// One result per input, in input order.
    ///
    /// `customer_hint` only chooses between several variations that equal
    /// the input exactly; it never changes whether a SKU is detected.
    pub fn detect(
        &self,
        skus: &[String],
        catalog: &[MappingWithVariations],
        customer_hint: Option<i32>,
    ) -> Vec<DetectionResult> {
        let exact = exact_index(catalog);

        let results: Vec<DetectionResult> = skus
            .iter()
            .map(|sku| match exact.get(sku.as_str()) {
                Some(hits) => {
                    let (mapping, variation) = pick_hit(hits, customer_hint);
                    DetectionResult::exact(sku, mapping, variation)
                }
                None => match self.best_fuzzy(sku, catalog) {
                    Some((mapping, confidence)) => DetectionResult::fuzzy(sku, mapping, confidence),
                    None => DetectionResult::undetected(sku),
                },
            })
            .collect();

        debug!(
            skus = skus.len(),
            detected = results.iter().filter(|r| r.detected).count(),
            catalog_size = catalog.len(),
            "Detection batch scored"
        );

        results
    }

    /// Highest-confidence candidate above the threshold. Ties keep the
    /// first candidate in catalog order, and the standard SKU of a mapping
    /// is offered before its first qualifying variation.
    fn best_fuzzy<'a>(
        &self,
        sku: &str,
        catalog: &'a [MappingWithVariations],
    ) -> Option<(&'a MappingWithVariations, u32)> {
        let mut best: Option<(&MappingWithVariations, u32)> = None;

        for mapping in catalog {
            let standard = similarity(sku, &mapping.standard_sku);
            if standard > self.threshold {
                offer(&mut best, mapping, confidence(standard));
            }

            let variation = mapping
                .variations
                .iter()
                .map(|v| similarity(sku, &v.variation_sku))
                .find(|score| *score > self.threshold);

            if let Some(score) = variation {
                offer(&mut best, mapping, confidence(score));
            }
        }

        best
    }
}

type ExactHit<'a> = (&'a MappingWithVariations, &'a VariationView);

/// Variation SKU -> every (mapping, variation) carrying it, in catalog order
fn exact_index(catalog: &[MappingWithVariations]) -> HashMap<&str, Vec<ExactHit<'_>>> {
    let mut index: HashMap<&str, Vec<ExactHit<'_>>> = HashMap::new();
    for mapping in catalog {
        for variation in &mapping.variations {
            index
                .entry(variation.variation_sku.as_str())
                .or_default()
                .push((mapping, variation));
        }
    }
    index
}

fn pick_hit<'a>(hits: &[ExactHit<'a>], customer_hint: Option<i32>) -> ExactHit<'a> {
    *customer_hint
        .and_then(|customer| hits.iter().find(|(_, v)| v.customer_id == customer))
        .unwrap_or(&hits[0])
}

fn offer<'a>(best: &mut Option<(&'a MappingWithVariations, u32)>, mapping: &'a MappingWithVariations, confidence: u32) {
    if best.map_or(true, |(_, current)| confidence > current) {
        *best = Some((mapping, confidence));
    }
}

fn confidence(score: f64) -> u32 {
    (score * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn mapping(id: i32, sku: &str, description: &str, variations: &[(&str, i32, &str)]) -> MappingWithVariations {
        let now: DateTime<FixedOffset> = Utc::now().into();
        MappingWithVariations {
            id,
            standard_sku: sku.to_string(),
            standard_description: description.to_string(),
            variations: variations
                .iter()
                .enumerate()
                .map(|(n, (variation_sku, customer_id, source))| VariationView {
                    id: id * 100 + n as i32,
                    mapping_id: id,
                    customer_id: *customer_id,
                    customer_name: Some(format!("Customer {}", customer_id)),
                    variation_sku: variation_sku.to_string(),
                    source: source.to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    fn toner_catalog() -> Vec<MappingWithVariations> {
        vec![mapping(
            1,
            "CF226X",
            "HP 26X High Yield Black Toner",
            &[("HP26X", 1, "Tech Solutions Inc")],
        )]
    }

    fn skus(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_variation_match() {
        let results = DetectionEngine::default().detect(&skus(&["HP26X"]), &toner_catalog(), None);

        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert!(hit.detected);
        assert_eq!(hit.match_type, MatchType::Exact);
        assert_eq!(hit.suggested.as_deref(), Some("CF226X"));
        assert_eq!(hit.confidence, Some(100));
        assert_eq!(hit.customer_id, Some(1));
        assert_eq!(hit.source.as_deref(), Some("Tech Solutions Inc"));
    }

    #[test]
    fn test_decorated_sku_resolves_fuzzily() {
        let results = DetectionEngine::default().detect(&skus(&["HP-26-X"]), &toner_catalog(), None);

        let hit = &results[0];
        assert!(hit.detected);
        assert_eq!(hit.match_type, MatchType::Fuzzy);
        assert_eq!(hit.suggested.as_deref(), Some("CF226X"));
        assert!(hit.confidence.unwrap() >= 90);
        assert_eq!(hit.customer_id, None);
    }

    #[test]
    fn test_unknown_sku_is_undetected() {
        let results = DetectionEngine::default().detect(&skus(&["ZZZ999"]), &toner_catalog(), None);

        let miss = &results[0];
        assert!(!miss.detected);
        assert_eq!(miss.suggested, None);
        assert_eq!(miss.message.as_deref(), Some(NO_MATCH_MESSAGE));
    }

    #[test]
    fn test_exact_match_beats_earlier_fuzzy_candidates() {
        let catalog = vec![
            mapping(1, "ABC1234", "Fuzzy neighbour", &[("ABC-1234", 1, "Manual Entry")]),
            mapping(2, "XYZ-9", "Owner", &[("ABC123", 2, "Email Import")]),
        ];

        let results = DetectionEngine::default().detect(&skus(&["ABC123"]), &catalog, None);
        assert_eq!(results[0].suggested.as_deref(), Some("XYZ-9"));
        assert_eq!(results[0].confidence, Some(100));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let results = DetectionEngine::default().detect(&skus(&["hp26x"]), &toner_catalog(), None);

        // Falls through to fuzzy scoring, which does ignore case
        assert_eq!(results[0].match_type, MatchType::Fuzzy);
        assert_eq!(results[0].confidence, Some(100));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 7 of 10 characters shared scores exactly 0.7
        let at_threshold = vec![mapping(1, "ABCDEFG123", "", &[])];
        let results = DetectionEngine::default().detect(&skus(&["abcdefgxyz"]), &at_threshold, None);
        assert!(!results[0].detected);

        let above = vec![mapping(1, "ABCDEFGH12", "", &[])];
        let results = DetectionEngine::default().detect(&skus(&["abcdefghyz"]), &above, None);
        assert!(results[0].detected);
        assert_eq!(results[0].confidence, Some(80));
    }

    #[test]
    fn test_ties_resolve_to_catalog_order() {
        let catalog = vec![
            mapping(1, "ABCDEFGH12", "first", &[]),
            mapping(2, "ABCDEFGH34", "second", &[]),
        ];

        let results = DetectionEngine::default().detect(&skus(&["abcdefghyz"]), &catalog, None);
        assert_eq!(results[0].suggested.as_deref(), Some("ABCDEFGH12"));
    }

    #[test]
    fn test_higher_confidence_later_in_catalog_wins() {
        let catalog = vec![
            mapping(1, "ABCDEFGH12", "partial", &[]),
            mapping(2, "Q2612A", "contains", &[("ABCDEFGHYZ-R", 1, "Manual Entry")]),
        ];

        let results = DetectionEngine::default().detect(&skus(&["abcdefghyz"]), &catalog, None);
        assert_eq!(results[0].suggested.as_deref(), Some("Q2612A"));
        assert_eq!(results[0].confidence, Some(90));
    }

    #[test]
    fn test_customer_hint_prefers_that_customers_variation() {
        let catalog = vec![
            mapping(1, "CF226X", "HP 26X", &[("26X", 1, "Manual Entry")]),
            mapping(2, "CF226A", "HP 26A", &[("26X", 2, "Email Import")]),
        ];
        let engine = DetectionEngine::default();

        let unhinted = engine.detect(&skus(&["26X"]), &catalog, None);
        assert_eq!(unhinted[0].suggested.as_deref(), Some("CF226X"));

        let hinted = engine.detect(&skus(&["26X"]), &catalog, Some(2));
        assert_eq!(hinted[0].suggested.as_deref(), Some("CF226A"));
        assert_eq!(hinted[0].customer_id, Some(2));

        let unknown_hint = engine.detect(&skus(&["26X"]), &catalog, Some(9));
        assert_eq!(unknown_hint[0].suggested.as_deref(), Some("CF226X"));
    }

    #[test]
    fn test_output_order_matches_input() {
        let input = skus(&["ZZZ999", "HP26X", "HP-26-X", "HP26X"]);
        let results = DetectionEngine::default().detect(&input, &toner_catalog(), None);

        let originals: Vec<&str> = results.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["ZZZ999", "HP26X", "HP-26-X", "HP26X"]);
        assert!(!results[0].detected);
        assert!(results[1..].iter().all(|r| r.detected));
    }

    #[test]
    fn test_custom_threshold() {
        let engine = DetectionEngine::new(0.4);
        // 0.5 character overlap against CF226X
        let results = engine.detect(&skus(&["HP26X"]), &[mapping(1, "CF226X", "", &[])], None);
        assert!(results[0].detected);
        assert_eq!(results[0].confidence, Some(50));
    }

    #[test]
    fn test_result_serialization_omits_empty_fields() {
        let results = DetectionEngine::default().detect(&skus(&["ZZZ999"]), &toner_catalog(), None);
        let json = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(json["original"], "ZZZ999");
        assert_eq!(json["detected"], false);
        assert_eq!(json["matchType"], "none");
        assert!(json.get("suggested").is_none());
        assert!(json.get("customerId").is_none());
    }
}
