//! Bulk import driver

use super::delimited::parse_import;
use super::ImportSummary;
use crate::db::Repository;
use crate::errors::Result;
use crate::metrics;
use std::time::Instant;
use tracing::{info, warn};

/// Parse `data` and upsert every mapping group, one transaction per group.
///
/// Only an unusable file fails the call. A failing group is counted in
/// `errors` and the import moves on to the next one.
pub async fn import_catalog(repo: &Repository, data: &[u8]) -> Result<ImportSummary> {
    let started = Instant::now();
    let parsed = parse_import(data)?;

    let mut summary = ImportSummary {
        rows_processed: parsed.rows_processed,
        rows_skipped: parsed.rows_skipped,
        ..Default::default()
    };

    for group in &parsed.groups {
        match repo.upsert_mapping(group).await {
            Ok(outcome) => {
                if outcome.created {
                    summary.mappings_created += 1;
                } else {
                    summary.mappings_updated += 1;
                }
                summary.variations_skipped += outcome.variations_skipped;
            }
            Err(e) => {
                summary.errors += 1;
                warn!(
                    standard_sku = %group.standard_sku,
                    error = %e,
                    "Import group failed, continuing"
                );
            }
        }
    }

    let elapsed = started.elapsed();
    summary.import_duration_ms = elapsed.as_millis() as u64;

    metrics::record_import(
        elapsed.as_secs_f64(),
        summary.rows_processed,
        summary.mappings_created,
        summary.mappings_updated,
        summary.errors,
    );

    info!(
        rows_processed = summary.rows_processed,
        rows_skipped = summary.rows_skipped,
        mappings_created = summary.mappings_created,
        mappings_updated = summary.mappings_updated,
        variations_skipped = summary.variations_skipped,
        errors = summary.errors,
        duration_ms = summary.import_duration_ms,
        "SKU mapping import finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::inputs::{CreateMapping, VariationInput};
    use crate::db::testing::{memory_repo, seed_customer};
    use crate::errors::ErrorCode;
    use crate::interchange::export_csv;
    use sea_orm::ConnectionTrait;
    use std::collections::BTreeSet;

    fn variation(sku: &str, source: &str, customer_id: i32) -> VariationInput {
        VariationInput {
            sku: Some(sku.to_string()),
            source: Some(source.to_string()),
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    async fn tuples(repo: &Repository) -> BTreeSet<(String, String, String, String, i32)> {
        repo.load_catalog()
            .await
            .unwrap()
            .into_iter()
            .flat_map(|mapping| {
                let sku = mapping.standard_sku.clone();
                let description = mapping.standard_description.clone();
                mapping.variations.into_iter().map(move |v| {
                    (sku.clone(), description.clone(), v.variation_sku, v.source, v.customer_id)
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_export_then_import_reproduces_catalog() {
        let source = memory_repo().await;
        let tech = seed_customer(&source, "Tech Solutions Inc").await;
        let acme = seed_customer(&source, "Acme, Ltd").await;

        source
            .create_mapping(CreateMapping {
                standard_sku: Some("CF226X".to_string()),
                standard_description: Some("HP 26X High Yield Black Toner, \"XL\"".to_string()),
                variations: vec![
                    variation("HP26X", "Tech Solutions Inc", tech),
                    variation("26X", "Email Import", acme),
                ],
            })
            .await
            .unwrap();
        source
            .create_mapping(CreateMapping {
                standard_sku: Some("CE285A".to_string()),
                standard_description: Some("HP 85A Black Toner".to_string()),
                variations: vec![variation("HP85A", "Manual Entry", acme)],
            })
            .await
            .unwrap();

        let exported = export_csv(&source.load_catalog().await.unwrap()).unwrap();

        let target = memory_repo().await;
        seed_customer(&target, "Tech Solutions Inc").await;
        seed_customer(&target, "Acme, Ltd").await;

        let summary = import_catalog(&target, exported.as_bytes()).await.unwrap();
        assert_eq!(summary.rows_processed, 3);
        assert_eq!(summary.mappings_created, 2);
        assert_eq!(summary.mappings_updated, 0);
        assert_eq!(summary.errors, 0);

        assert_eq!(tuples(&source).await, tuples(&target).await);
    }

    #[tokio::test]
    async fn test_reimport_is_a_no_op() {
        let repo = memory_repo().await;
        let customer = seed_customer(&repo, "Acme").await;
        let data = format!(
            "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
             CF226X,HP 26X,HP26X,Email Import,{0}\n\
             CF226X,HP 26X,26X,Email Import,{0}\n",
            customer
        );

        let first = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(first.mappings_created, 1);
        let before = repo.load_catalog().await.unwrap();

        let second = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(second.mappings_created, 0);
        assert_eq!(second.mappings_updated, 1);

        let after = repo.load_catalog().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_one_malformed_row_among_ten() {
        let repo = memory_repo().await;
        let customer = seed_customer(&repo, "Acme").await;

        let mut data = String::from("StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n");
        for n in 0..9 {
            data.push_str(&format!("SKU-{},Item {},V-{},Manual Entry,{}\n", n, n, n, customer));
        }
        data.push_str("SKU-X,Broken row,V-X,Manual Entry,\n");

        let summary = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(summary.rows_processed, 9);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.mappings_created, 9);
        assert_eq!(summary.errors, 0);
        assert!(repo.find_standard_sku_for("V-X").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_group_is_counted_and_rolled_back() {
        let repo = memory_repo().await;
        let customer = seed_customer(&repo, "Acme").await;
        repo.pool()
            .write()
            .execute_unprepared(
                "CREATE TRIGGER reject_bad_variation BEFORE INSERT ON sku_variations \
                 WHEN NEW.variation_sku = 'BAD' \
                 BEGIN SELECT RAISE(ABORT, 'variation rejected'); END",
            )
            .await
            .unwrap();

        let data = format!(
            "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
             CF226X,HP 26X,HP26X,Email Import,{0}\n\
             BROKEN,Never stored,OK-1,Email Import,{0}\n\
             BROKEN,Never stored,BAD,Email Import,{0}\n\
             CE285A,HP 85A,HP85A,Email Import,{0}\n",
            customer
        );

        let summary = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(summary.rows_processed, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.mappings_created, 2);
        assert_eq!(summary.mappings_updated, 0);

        let skus: Vec<String> = repo
            .load_catalog()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.standard_sku)
            .collect();
        assert_eq!(skus, vec!["CF226X".to_string(), "CE285A".to_string()]);
        assert!(repo.find_standard_sku_for("OK-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_customers_are_skipped_not_fatal() {
        let repo = memory_repo().await;
        let customer = seed_customer(&repo, "Acme").await;
        let data = format!(
            "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
             CF226X,HP 26X,HP26X,Email Import,{}\n\
             CF226X,HP 26X,26X,Email Import,999\n",
            customer
        );

        let summary = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(summary.mappings_created, 1);
        assert_eq!(summary.variations_skipped, 1);
        assert!(repo.find_standard_sku_for("26X").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_mapping_description_is_patched() {
        let repo = memory_repo().await;
        let customer = seed_customer(&repo, "Acme").await;
        let created = repo
            .create_mapping(CreateMapping {
                standard_sku: Some("CF226X".to_string()),
                standard_description: Some("Old".to_string()),
                variations: vec![variation("HP26X", "Manual Entry", customer)],
            })
            .await
            .unwrap();

        let data = format!(
            "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
             CF226X,HP 26X High Yield,HP26X,Manual Entry,{}\n",
            customer
        );
        let summary = import_catalog(&repo, data.as_bytes()).await.unwrap();
        assert_eq!(summary.mappings_updated, 1);

        let mapping = repo.get_mapping(created.id).await.unwrap();
        assert_eq!(mapping.standard_description, "HP 26X High Yield");
        assert_eq!(mapping.variations.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_header_fails_before_writing() {
        let repo = memory_repo().await;
        let err = import_catalog(&repo, b"sku,customer\nCF226X,1\n").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
        assert!(repo.load_catalog().await.unwrap().is_empty());
    }
}
