//! Request payloads for mapping create/update and their validation
//!
//! Payloads arrive with every field optional so that a missing field is
//! reported as a validation error naming it, not a deserialization failure.

use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use validator::Validate;

/// A variation as supplied by API callers
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariationInput {
    /// Existing variation id (update reconciliation only)
    pub id: Option<i32>,

    #[serde(alias = "variationSku")]
    #[validate(length(max = 255))]
    pub sku: Option<String>,

    #[validate(length(max = 255))]
    pub source: Option<String>,

    pub customer_id: Option<i32>,

    /// Insert even when an id is present
    #[serde(default)]
    pub is_new: bool,

    /// Remove the variation with `id`
    #[serde(default, alias = "delete")]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMapping {
    #[validate(length(max = 255))]
    pub standard_sku: Option<String>,

    #[validate(length(max = 2000))]
    pub standard_description: Option<String>,

    #[serde(default)]
    pub variations: Vec<VariationInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMapping {
    #[validate(length(max = 255))]
    pub standard_sku: Option<String>,

    #[validate(length(max = 2000))]
    pub standard_description: Option<String>,

    pub variations: Option<Vec<VariationInput>>,

    /// Delete every existing variation before inserting `variations`
    #[serde(default)]
    pub replacement_mode: bool,
}

/// A fully specified variation ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationDraft {
    pub sku: String,
    pub source: String,
    pub customer_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDraft {
    pub standard_sku: String,
    pub standard_description: String,
    pub variations: Vec<VariationDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariationOp {
    Insert(VariationDraft),
    Patch {
        id: i32,
        sku: Option<String>,
        source: Option<String>,
        customer_id: Option<i32>,
    },
    Delete(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariationChanges {
    Keep,
    Replace(Vec<VariationDraft>),
    Reconcile(Vec<VariationOp>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingChanges {
    pub standard_sku: Option<String>,
    pub standard_description: Option<String>,
    pub variations: VariationChanges,
}

fn check(payload: &impl Validate, field: &str) -> Result<()> {
    payload
        .validate()
        .map_err(|e| AppError::validation(field, e.to_string()))
}

/// Trimmed, non-empty text or a validation error naming `field`
fn required_text(value: Option<&str>, field: &str) -> Result<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(AppError::validation(field, format!("{} is required", field))),
    }
}

fn optional_text(value: Option<&str>, field: &str) -> Result<Option<String>> {
    value
        .map(|text| required_text(Some(text), field))
        .transpose()
}

impl VariationInput {
    fn to_draft(&self, index: usize) -> Result<VariationDraft> {
        let prefix = format!("variations[{}]", index);
        check(self, &prefix)?;

        Ok(VariationDraft {
            sku: required_text(self.sku.as_deref(), &format!("{}.sku", prefix))?,
            source: required_text(self.source.as_deref(), &format!("{}.source", prefix))?,
            customer_id: self.customer_id.ok_or_else(|| {
                AppError::validation(
                    &format!("{}.customerId", prefix),
                    format!("{}.customerId is required", prefix),
                )
            })?,
        })
    }

    fn to_op(&self, index: usize) -> Result<VariationOp> {
        if self.is_deleted {
            return self.id.map(VariationOp::Delete).ok_or_else(|| {
                AppError::validation(
                    &format!("variations[{}].id", index),
                    "an id is required to delete a variation",
                )
            });
        }

        match self.id {
            Some(id) if !self.is_new => {
                let prefix = format!("variations[{}]", index);
                check(self, &prefix)?;
                Ok(VariationOp::Patch {
                    id,
                    sku: optional_text(self.sku.as_deref(), &format!("{}.sku", prefix))?,
                    source: optional_text(self.source.as_deref(), &format!("{}.source", prefix))?,
                    customer_id: self.customer_id,
                })
            }
            _ => self.to_draft(index).map(VariationOp::Insert),
        }
    }
}

/// Validate a full variation list, rejecting repeated `(customerId, sku)` pairs
fn drafts(inputs: &[VariationInput]) -> Result<Vec<VariationDraft>> {
    if inputs.is_empty() {
        return Err(AppError::validation(
            "variations",
            "at least one variation is required",
        ));
    }

    let drafts = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| input.to_draft(index))
        .collect::<Result<Vec<_>>>()?;

    {
        let mut seen = HashSet::new();
        for draft in &drafts {
            if !seen.insert((draft.customer_id, draft.sku.as_str())) {
                return Err(AppError::DuplicateVariation {
                    sku: draft.sku.clone(),
                    customer_id: draft.customer_id,
                });
            }
        }
    }

    Ok(drafts)
}

impl CreateMapping {
    pub fn into_draft(self) -> Result<MappingDraft> {
        check(&self, "mapping")?;

        Ok(MappingDraft {
            standard_sku: required_text(self.standard_sku.as_deref(), "standardSku")?,
            standard_description: self
                .standard_description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            variations: drafts(&self.variations)?,
        })
    }
}

impl UpdateMapping {
    pub fn into_changes(self) -> Result<MappingChanges> {
        check(&self, "mapping")?;

        let variations = match (&self.variations, self.replacement_mode) {
            (None, _) => VariationChanges::Keep,
            (Some(inputs), true) => VariationChanges::Replace(drafts(inputs)?),
            (Some(inputs), false) => VariationChanges::Reconcile(
                inputs
                    .iter()
                    .enumerate()
                    .map(|(index, input)| input.to_op(index))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        Ok(MappingChanges {
            standard_sku: optional_text(self.standard_sku.as_deref(), "standardSku")?,
            standard_description: self
                .standard_description
                .map(|text| text.trim().to_string()),
            variations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn variation(sku: &str, customer_id: i32) -> VariationInput {
        VariationInput {
            sku: Some(sku.to_string()),
            source: Some("Customer Provided".to_string()),
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_requires_standard_sku() {
        let payload = CreateMapping {
            standard_sku: Some("   ".to_string()),
            variations: vec![variation("HP26X", 1)],
            ..Default::default()
        };
        let err = payload.into_draft().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(err.to_string().contains("standardSku"));
    }

    #[test]
    fn test_create_rejects_variation_without_customer() {
        let mut incomplete = variation("HP26X", 1);
        incomplete.customer_id = None;
        let payload = CreateMapping {
            standard_sku: Some("CF226X".to_string()),
            variations: vec![incomplete],
            ..Default::default()
        };
        let err = payload.into_draft().unwrap_err();
        assert!(err.to_string().contains("variations[0].customerId"));
    }

    #[test]
    fn test_create_trims_and_keeps_order() {
        let payload = CreateMapping {
            standard_sku: Some(" CF226X ".to_string()),
            standard_description: Some("HP 26X High Yield Black Toner".to_string()),
            variations: vec![variation("HP26X", 1), variation("26X", 2)],
        };
        let draft = payload.into_draft().unwrap();
        assert_eq!(draft.standard_sku, "CF226X");
        assert_eq!(draft.variations[1].sku, "26X");
    }

    #[test]
    fn test_duplicate_variation_in_request_is_a_conflict() {
        let payload = CreateMapping {
            standard_sku: Some("CF226X".to_string()),
            variations: vec![variation("HP26X", 1), variation("HP26X", 1)],
            ..Default::default()
        };
        let err = payload.into_draft().unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateVariation);
    }

    #[test]
    fn test_same_sku_for_different_customers_is_allowed() {
        let payload = CreateMapping {
            standard_sku: Some("CF226X".to_string()),
            variations: vec![variation("HP26X", 1), variation("HP26X", 2)],
            ..Default::default()
        };
        assert!(payload.into_draft().is_ok());
    }

    #[test]
    fn test_update_reconcile_ops() {
        let payload = UpdateMapping {
            variations: Some(vec![
                VariationInput { id: Some(4), source: Some("Email Import".into()), ..Default::default() },
                variation("CF226XX", 3),
                VariationInput { id: Some(5), is_deleted: true, ..Default::default() },
            ]),
            ..Default::default()
        };
        let changes = payload.into_changes().unwrap();
        match changes.variations {
            VariationChanges::Reconcile(ops) => {
                assert_eq!(
                    ops[0],
                    VariationOp::Patch {
                        id: 4,
                        sku: None,
                        source: Some("Email Import".into()),
                        customer_id: None,
                    }
                );
                assert!(matches!(ops[1], VariationOp::Insert(_)));
                assert_eq!(ops[2], VariationOp::Delete(5));
            }
            other => panic!("unexpected changes: {:?}", other),
        }
    }

    #[test]
    fn test_delete_without_id_is_rejected() {
        let payload = UpdateMapping {
            variations: Some(vec![VariationInput { is_deleted: true, ..Default::default() }]),
            ..Default::default()
        };
        assert!(payload.into_changes().is_err());
    }

    #[test]
    fn test_replacement_requires_variations() {
        let payload = UpdateMapping {
            variations: Some(Vec::new()),
            replacement_mode: true,
            ..Default::default()
        };
        assert!(payload.into_changes().is_err());
    }

    #[test]
    fn test_update_without_variations_keeps_them() {
        let payload = UpdateMapping {
            standard_description: Some("New description".into()),
            ..Default::default()
        };
        let changes = payload.into_changes().unwrap();
        assert_eq!(changes.variations, VariationChanges::Keep);
        assert_eq!(changes.standard_description.as_deref(), Some("New description"));
    }
}
