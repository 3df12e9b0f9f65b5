//! Read models and write commands exchanged with the repository

use super::models::{SkuVariation, StandardMapping};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A standard SKU together with every known variation of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingWithVariations {
    pub id: i32,
    pub standard_sku: String,
    pub standard_description: String,
    pub variations: Vec<VariationView>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl MappingWithVariations {
    pub(crate) fn from_parts(mapping: StandardMapping, variations: Vec<VariationView>) -> Self {
        Self {
            id: mapping.id,
            standard_sku: mapping.standard_sku,
            standard_description: mapping.standard_description,
            variations,
            created_at: mapping.created_at,
            updated_at: mapping.updated_at,
        }
    }
}

/// A variation with its customer's display name resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationView {
    pub id: i32,
    pub mapping_id: i32,
    pub customer_id: i32,
    pub customer_name: Option<String>,
    pub variation_sku: String,
    pub source: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl VariationView {
    pub(crate) fn from_model(variation: SkuVariation, customer_name: Option<String>) -> Self {
        Self {
            id: variation.id,
            mapping_id: variation.mapping_id,
            customer_id: variation.customer_id,
            customer_name,
            variation_sku: variation.variation_sku,
            source: variation.source,
            created_at: variation.created_at,
            updated_at: variation.updated_at,
        }
    }
}

/// Result of an exact variation lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSkuMatch {
    pub standard_sku: String,
    pub standard_description: String,
}

/// One page of a mapping listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPage {
    pub items: Vec<MappingWithVariations>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl MappingPage {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// Bulk-import command: one standard SKU and the variation rows grouped under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingUpsert {
    pub standard_sku: String,
    pub standard_description: String,
    pub variations: Vec<VariationUpsert>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationUpsert {
    pub variation_sku: String,
    pub source: String,
    pub customer_id: i32,
}

/// What a single mapping upsert did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// A new standard mapping row was inserted
    pub created: bool,
    /// Variations inserted or whose source changed
    pub variations_written: usize,
    /// Variations dropped because their customer does not exist
    pub variations_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page = MappingPage { items: Vec::new(), total: 41, page: 1, page_size: 20 };
        assert_eq!(page.total_pages(), 3);

        let empty = MappingPage { items: Vec::new(), total: 0, page: 1, page_size: 20 };
        assert_eq!(empty.total_pages(), 0);
    }
}
