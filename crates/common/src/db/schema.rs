//! Schema bootstrap
//!
//! Creates the catalog tables from the entity definitions when they are
//! missing. Production deployments may manage the schema externally and
//! leave `database.auto_migrate` off.

use super::models::*;
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Schema};
use tracing::info;

/// Name of the composite unique index on `(mapping_id, customer_id, variation_sku)`
pub const VARIATION_UNIQUE_INDEX: &str = "uq_sku_variations_mapping_customer_sku";

/// Create customers, mappings and variations tables plus their indexes
pub async fn ensure_schema<C: ConnectionTrait>(conn: &C) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    // Referenced tables first so foreign keys resolve
    let mut customers = schema.create_table_from_entity(CustomerEntity);
    customers.if_not_exists();
    conn.execute(backend.build(&customers)).await?;

    let mut mappings = schema.create_table_from_entity(StandardMappingEntity);
    mappings.if_not_exists();
    conn.execute(backend.build(&mappings)).await?;

    let mut variations = schema.create_table_from_entity(SkuVariationEntity);
    variations.if_not_exists();
    conn.execute(backend.build(&variations)).await?;

    let unique_variation = Index::create()
        .name(VARIATION_UNIQUE_INDEX)
        .table(SkuVariationEntity)
        .col(SkuVariationColumn::MappingId)
        .col(SkuVariationColumn::CustomerId)
        .col(SkuVariationColumn::VariationSku)
        .unique()
        .if_not_exists()
        .to_owned();
    conn.execute(backend.build(&unique_variation)).await?;

    let by_sku = Index::create()
        .name("idx_sku_variations_variation_sku")
        .table(SkuVariationEntity)
        .col(SkuVariationColumn::VariationSku)
        .if_not_exists()
        .to_owned();
    conn.execute(backend.build(&by_sku)).await?;

    info!("Catalog schema ensured");
    Ok(())
}
