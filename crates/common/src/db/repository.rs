//! Repository pattern for catalog operations
//!
//! Provides a clean interface for all SKU mapping data access with
//! proper error handling and transaction support. Every operation that
//! touches a mapping together with its variations runs in one transaction.

use super::catalog::*;
use super::inputs::{CreateMapping, UpdateMapping, VariationChanges, VariationDraft, VariationOp};
use super::models::*;
use super::DbPool;
use crate::errors::{map_unique_violation, AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Customer lookups the catalog needs from the customer side of the system
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Whether a customer with this id exists
    async fn customer_exists(&self, id: i32) -> Result<bool>;

    /// Fetch a customer by id
    async fn find_customer(&self, id: i32) -> Result<Option<Customer>>;
}

/// Listing filter for mappings
#[derive(Debug, Clone, Default)]
pub struct MappingFilter {
    /// Case-insensitive substring of the standard SKU or its description
    pub search: Option<String>,
}

impl MappingFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self { search: Some(term.into()) }
    }

    fn condition(&self) -> Condition {
        let term = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty());

        match term {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            StandardMappingEntity,
                            StandardMappingColumn::StandardSku,
                        ))))
                        .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            StandardMappingEntity,
                            StandardMappingColumn::StandardDescription,
                        ))))
                        .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
                    )
            }
            None => Condition::all(),
        }
    }
}

const LIKE_ESCAPE: char = '\\';

/// Make `%`, `_` and the escape character match literally inside a LIKE pattern
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for catalog access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Mapping Queries
    // ========================================================================

    /// All mappings matching the filter, ordered by standard SKU
    pub async fn list_mappings(&self, filter: &MappingFilter) -> Result<Vec<MappingWithVariations>> {
        let mappings = StandardMappingEntity::find()
            .filter(filter.condition())
            .order_by_asc(StandardMappingColumn::StandardSku)
            .all(self.read_conn())
            .await?;

        with_variations(self.read_conn(), mappings).await
    }

    /// One page of mappings matching the filter. `page` is 1-indexed.
    pub async fn list_mappings_page(
        &self,
        filter: &MappingFilter,
        page: u64,
        page_size: u64,
    ) -> Result<MappingPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let paginator = StandardMappingEntity::find()
            .filter(filter.condition())
            .order_by_asc(StandardMappingColumn::StandardSku)
            .order_by_asc(StandardMappingColumn::Id)
            .paginate(self.read_conn(), page_size);

        let total = paginator.num_items().await?;
        let mappings = paginator.fetch_page(page - 1).await?;
        let items = with_variations(self.read_conn(), mappings).await?;

        Ok(MappingPage { items, total, page, page_size })
    }

    /// Find a mapping with its variations
    pub async fn find_mapping(&self, id: i32) -> Result<Option<MappingWithVariations>> {
        fetch_mapping(self.read_conn(), id).await
    }

    /// Like `find_mapping`, failing with `MappingNotFound`
    pub async fn get_mapping(&self, id: i32) -> Result<MappingWithVariations> {
        self.find_mapping(id)
            .await?
            .ok_or(AppError::MappingNotFound { id })
    }

    /// Find a single variation row
    pub async fn find_variation(&self, id: i32) -> Result<Option<SkuVariation>> {
        SkuVariationEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Exact, case-sensitive lookup of a variation SKU. The earliest created
    /// mapping wins when several mappings carry the same variation.
    pub async fn find_standard_sku_for(&self, variation_sku: &str) -> Result<Option<StandardSkuMatch>> {
        let found = SkuVariationEntity::find()
            .filter(SkuVariationColumn::VariationSku.eq(variation_sku))
            .order_by_asc(SkuVariationColumn::MappingId)
            .order_by_asc(SkuVariationColumn::Id)
            .find_also_related(StandardMappingEntity)
            .one(self.read_conn())
            .await?;

        Ok(found
            .and_then(|(_, mapping)| mapping)
            .map(|mapping| StandardSkuMatch {
                standard_sku: mapping.standard_sku,
                standard_description: mapping.standard_description,
            }))
    }

    /// Every mapping with its variations, in creation order. This is the
    /// snapshot detection and export work from.
    pub async fn load_catalog(&self) -> Result<Vec<MappingWithVariations>> {
        let conn = self.read_conn();

        let mappings = StandardMappingEntity::find()
            .order_by_asc(StandardMappingColumn::Id)
            .all(conn)
            .await?;

        let variations = SkuVariationEntity::find()
            .order_by_asc(SkuVariationColumn::Id)
            .all(conn)
            .await?;

        assemble(conn, mappings, variations).await
    }

    // ========================================================================
    // Mapping Mutations
    // ========================================================================

    /// Create a mapping and its variations atomically
    pub async fn create_mapping(&self, input: CreateMapping) -> Result<MappingWithVariations> {
        let draft = input.into_draft()?;
        let txn = self.write_conn().begin().await?;

        if find_by_standard_sku(&txn, &draft.standard_sku).await?.is_some() {
            return Err(AppError::DuplicateStandardSku { sku: draft.standard_sku });
        }

        ensure_customers(&txn, draft.variations.iter().map(|v| v.customer_id)).await?;

        let now = Utc::now();
        let sku = draft.standard_sku.clone();
        let mapping = StandardMappingActiveModel {
            id: NotSet,
            standard_sku: Set(draft.standard_sku),
            standard_description: Set(draft.standard_description),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, move || AppError::DuplicateStandardSku { sku }))?;

        for variation in &draft.variations {
            insert_variation(&txn, mapping.id, variation).await?;
        }

        txn.commit().await?;

        info!(
            mapping_id = mapping.id,
            standard_sku = %mapping.standard_sku,
            variations = draft.variations.len(),
            "SKU mapping created"
        );

        self.reload(mapping.id).await
    }

    /// Patch a mapping. Variations are either replaced wholesale
    /// (`replacementMode`) or reconciled entry by entry.
    pub async fn update_mapping(&self, id: i32, input: UpdateMapping) -> Result<MappingWithVariations> {
        let changes = input.into_changes()?;
        let txn = self.write_conn().begin().await?;

        let mapping = StandardMappingEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(AppError::MappingNotFound { id })?;

        let target_sku = changes
            .standard_sku
            .clone()
            .unwrap_or_else(|| mapping.standard_sku.clone());

        let mut active: StandardMappingActiveModel = mapping.clone().into();

        if target_sku != mapping.standard_sku {
            if find_by_standard_sku(&txn, &target_sku).await?.is_some() {
                return Err(AppError::DuplicateStandardSku { sku: target_sku });
            }
            active.standard_sku = Set(target_sku.clone());
        }

        if let Some(description) = changes.standard_description {
            active.standard_description = Set(description);
        }

        match changes.variations {
            VariationChanges::Keep => {}
            VariationChanges::Replace(drafts) => {
                ensure_customers(&txn, drafts.iter().map(|d| d.customer_id)).await?;

                let removed = SkuVariationEntity::delete_many()
                    .filter(SkuVariationColumn::MappingId.eq(id))
                    .exec(&txn)
                    .await?
                    .rows_affected;

                for draft in &drafts {
                    insert_variation(&txn, id, draft).await?;
                }

                debug!(mapping_id = id, removed, inserted = drafts.len(), "Variations replaced");
            }
            VariationChanges::Reconcile(mut ops) => {
                // Deletes release their (customer, sku) pairs before inserts and patches run
                ops.sort_by_key(|op| !matches!(op, VariationOp::Delete(_)));
                for op in ops {
                    apply_variation_op(&txn, id, op).await?;
                }
            }
        }

        active.updated_at = Set(Utc::now().into());
        active
            .update(&txn)
            .await
            .map_err(|e| map_unique_violation(e, || AppError::DuplicateStandardSku { sku: target_sku.clone() }))?;

        txn.commit().await?;

        info!(mapping_id = id, standard_sku = %target_sku, "SKU mapping updated");

        self.reload(id).await
    }

    /// Delete a mapping and, first, all of its variations
    pub async fn delete_mapping(&self, id: i32) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        if StandardMappingEntity::find_by_id(id).one(&txn).await?.is_none() {
            return Err(AppError::MappingNotFound { id });
        }

        let removed = SkuVariationEntity::delete_many()
            .filter(SkuVariationColumn::MappingId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        StandardMappingEntity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        info!(mapping_id = id, variations_removed = removed, "SKU mapping deleted");
        Ok(())
    }

    /// Remove one variation from a mapping
    pub async fn delete_variation(&self, mapping_id: i32, variation_id: i32) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        let mapping = StandardMappingEntity::find_by_id(mapping_id)
            .one(&txn)
            .await?
            .ok_or(AppError::MappingNotFound { id: mapping_id })?;

        owned_variation(&txn, mapping_id, variation_id).await?;
        SkuVariationEntity::delete_by_id(variation_id).exec(&txn).await?;
        touch(&txn, mapping).await?;

        txn.commit().await?;

        info!(mapping_id, variation_id, "SKU variation deleted");
        Ok(())
    }

    /// Bulk-import upsert of one standard SKU group, in its own transaction.
    ///
    /// The description is only rewritten when it differs, and variations are
    /// keyed on `(mapping, customer, sku)`; replaying an unchanged group
    /// writes nothing.
    pub async fn upsert_mapping(&self, group: &MappingUpsert) -> Result<UpsertOutcome> {
        let txn = self.write_conn().begin().await?;
        let mut outcome = UpsertOutcome::default();
        let now = Utc::now();

        let existing = find_by_standard_sku(&txn, &group.standard_sku).await?;
        let (mapping, touched) = match existing {
            Some(current)
                if !group.standard_description.is_empty()
                    && current.standard_description != group.standard_description =>
            {
                let mut active: StandardMappingActiveModel = current.into();
                active.standard_description = Set(group.standard_description.clone());
                active.updated_at = Set(now.into());
                (active.update(&txn).await?, true)
            }
            Some(current) => (current, false),
            None => {
                outcome.created = true;
                let sku = group.standard_sku.clone();
                let inserted = StandardMappingActiveModel {
                    id: NotSet,
                    standard_sku: Set(group.standard_sku.clone()),
                    standard_description: Set(group.standard_description.clone()),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await
                .map_err(|e| map_unique_violation(e, move || AppError::DuplicateStandardSku { sku }))?;
                (inserted, true)
            }
        };

        let mapping_id = mapping.id;
        let mut known_customers: HashMap<i32, bool> = HashMap::new();

        for variation in &group.variations {
            let customer_known = match known_customers.get(&variation.customer_id) {
                Some(&known) => known,
                None => {
                    let known = CustomerEntity::find_by_id(variation.customer_id)
                        .count(&txn)
                        .await?
                        > 0;
                    known_customers.insert(variation.customer_id, known);
                    known
                }
            };

            if !customer_known {
                warn!(
                    standard_sku = %group.standard_sku,
                    variation_sku = %variation.variation_sku,
                    customer_id = variation.customer_id,
                    "Skipping variation for unknown customer"
                );
                outcome.variations_skipped += 1;
                continue;
            }

            let current = SkuVariationEntity::find()
                .filter(SkuVariationColumn::MappingId.eq(mapping_id))
                .filter(SkuVariationColumn::CustomerId.eq(variation.customer_id))
                .filter(SkuVariationColumn::VariationSku.eq(variation.variation_sku.as_str()))
                .one(&txn)
                .await?;

            match current {
                Some(current) if current.source == variation.source => {}
                Some(current) => {
                    let mut active: SkuVariationActiveModel = current.into();
                    active.source = Set(variation.source.clone());
                    active.updated_at = Set(now.into());
                    active.update(&txn).await?;
                    outcome.variations_written += 1;
                }
                None => {
                    let draft = VariationDraft {
                        sku: variation.variation_sku.clone(),
                        source: variation.source.clone(),
                        customer_id: variation.customer_id,
                    };
                    insert_variation(&txn, mapping_id, &draft).await?;
                    outcome.variations_written += 1;
                }
            }
        }

        if outcome.variations_written > 0 && !touched {
            touch(&txn, mapping).await?;
        }

        txn.commit().await?;

        debug!(
            standard_sku = %group.standard_sku,
            created = outcome.created,
            written = outcome.variations_written,
            skipped = outcome.variations_skipped,
            "Mapping group upserted"
        );

        Ok(outcome)
    }

    /// Re-read a mapping from the primary after a write
    async fn reload(&self, id: i32) -> Result<MappingWithVariations> {
        fetch_mapping(self.write_conn(), id)
            .await?
            .ok_or(AppError::MappingNotFound { id })
    }
}

#[async_trait]
impl CustomerDirectory for Repository {
    async fn customer_exists(&self, id: i32) -> Result<bool> {
        Ok(CustomerEntity::find_by_id(id).count(self.read_conn()).await? > 0)
    }

    async fn find_customer(&self, id: i32) -> Result<Option<Customer>> {
        CustomerEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

// ============================================================================
// Connection-generic helpers (usable on a pool or inside a transaction)
// ============================================================================

async fn find_by_standard_sku<C: ConnectionTrait>(conn: &C, sku: &str) -> Result<Option<StandardMapping>> {
    StandardMappingEntity::find()
        .filter(StandardMappingColumn::StandardSku.eq(sku))
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn fetch_mapping<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Option<MappingWithVariations>> {
    let Some(mapping) = StandardMappingEntity::find_by_id(id).one(conn).await? else {
        return Ok(None);
    };

    Ok(with_variations(conn, vec![mapping]).await?.pop())
}

/// Attach variations to an already loaded set of mappings
async fn with_variations<C: ConnectionTrait>(
    conn: &C,
    mappings: Vec<StandardMapping>,
) -> Result<Vec<MappingWithVariations>> {
    if mappings.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = mappings.iter().map(|m| m.id).collect();
    let variations = SkuVariationEntity::find()
        .filter(SkuVariationColumn::MappingId.is_in(ids))
        .order_by_asc(SkuVariationColumn::Id)
        .all(conn)
        .await?;

    assemble(conn, mappings, variations).await
}

/// Group variations under their mappings, resolving customer names.
/// Mapping order is preserved; variations keep id order.
async fn assemble<C: ConnectionTrait>(
    conn: &C,
    mappings: Vec<StandardMapping>,
    variations: Vec<SkuVariation>,
) -> Result<Vec<MappingWithVariations>> {
    let customer_ids: BTreeSet<i32> = variations.iter().map(|v| v.customer_id).collect();

    let names: HashMap<i32, String> = if customer_ids.is_empty() {
        HashMap::new()
    } else {
        CustomerEntity::find()
            .filter(CustomerColumn::Id.is_in(customer_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|customer| (customer.id, customer.name))
            .collect()
    };

    let mut grouped: HashMap<i32, Vec<VariationView>> = HashMap::new();
    for variation in variations {
        let name = names.get(&variation.customer_id).cloned();
        grouped
            .entry(variation.mapping_id)
            .or_default()
            .push(VariationView::from_model(variation, name));
    }

    Ok(mappings
        .into_iter()
        .map(|mapping| {
            let variations = grouped.remove(&mapping.id).unwrap_or_default();
            MappingWithVariations::from_parts(mapping, variations)
        })
        .collect())
}

/// Fail with a validation error naming the first customer id that does not exist
async fn ensure_customers<C, I>(conn: &C, ids: I) -> Result<()>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i32>,
{
    let wanted: BTreeSet<i32> = ids.into_iter().collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let found: BTreeSet<i32> = CustomerEntity::find()
        .filter(CustomerColumn::Id.is_in(wanted.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|customer| customer.id)
        .collect();

    match wanted.difference(&found).next() {
        Some(missing) => Err(AppError::validation(
            "customerId",
            format!("customer {} does not exist", missing),
        )),
        None => Ok(()),
    }
}

async fn variation_exists<C: ConnectionTrait>(
    conn: &C,
    mapping_id: i32,
    customer_id: i32,
    sku: &str,
    exclude: Option<i32>,
) -> Result<bool> {
    let mut query = SkuVariationEntity::find()
        .filter(SkuVariationColumn::MappingId.eq(mapping_id))
        .filter(SkuVariationColumn::CustomerId.eq(customer_id))
        .filter(SkuVariationColumn::VariationSku.eq(sku));

    if let Some(id) = exclude {
        query = query.filter(SkuVariationColumn::Id.ne(id));
    }

    Ok(query.count(conn).await? > 0)
}

async fn insert_variation<C: ConnectionTrait>(
    conn: &C,
    mapping_id: i32,
    draft: &VariationDraft,
) -> Result<SkuVariation> {
    let duplicate = || AppError::DuplicateVariation {
        sku: draft.sku.clone(),
        customer_id: draft.customer_id,
    };

    if variation_exists(conn, mapping_id, draft.customer_id, &draft.sku, None).await? {
        return Err(duplicate());
    }

    let now = Utc::now();
    SkuVariationActiveModel {
        id: NotSet,
        mapping_id: Set(mapping_id),
        customer_id: Set(draft.customer_id),
        variation_sku: Set(draft.sku.clone()),
        source: Set(draft.source.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .map_err(|e| map_unique_violation(e, duplicate))
}

/// A variation that must belong to `mapping_id`
async fn owned_variation<C: ConnectionTrait>(
    conn: &C,
    mapping_id: i32,
    variation_id: i32,
) -> Result<SkuVariation> {
    SkuVariationEntity::find_by_id(variation_id)
        .filter(SkuVariationColumn::MappingId.eq(mapping_id))
        .one(conn)
        .await?
        .ok_or(AppError::VariationNotFound { id: variation_id })
}

async fn apply_variation_op<C: ConnectionTrait>(conn: &C, mapping_id: i32, op: VariationOp) -> Result<()> {
    match op {
        VariationOp::Insert(draft) => {
            ensure_customers(conn, [draft.customer_id]).await?;
            insert_variation(conn, mapping_id, &draft).await?;
        }
        VariationOp::Delete(variation_id) => {
            let removed = SkuVariationEntity::delete_many()
                .filter(SkuVariationColumn::Id.eq(variation_id))
                .filter(SkuVariationColumn::MappingId.eq(mapping_id))
                .exec(conn)
                .await?
                .rows_affected;

            if removed == 0 {
                return Err(AppError::VariationNotFound { id: variation_id });
            }
        }
        VariationOp::Patch { id: variation_id, sku, source, customer_id } => {
            let current = owned_variation(conn, mapping_id, variation_id).await?;

            if let Some(customer_id) = customer_id {
                ensure_customers(conn, [customer_id]).await?;
            }

            let next_sku = sku.clone().unwrap_or_else(|| current.variation_sku.clone());
            let next_customer = customer_id.unwrap_or(current.customer_id);
            let duplicate = || AppError::DuplicateVariation {
                sku: next_sku.clone(),
                customer_id: next_customer,
            };

            if variation_exists(conn, mapping_id, next_customer, &next_sku, Some(variation_id)).await? {
                return Err(duplicate());
            }

            let mut active: SkuVariationActiveModel = current.into();
            if let Some(sku) = sku {
                active.variation_sku = Set(sku);
            }
            if let Some(source) = source {
                active.source = Set(source);
            }
            if let Some(customer_id) = customer_id {
                active.customer_id = Set(customer_id);
            }
            active.updated_at = Set(Utc::now().into());
            active
                .update(conn)
                .await
                .map_err(|e| map_unique_violation(e, duplicate))?;
        }
    }

    Ok(())
}

/// Refresh a mapping's `updated_at`
async fn touch<C: ConnectionTrait>(conn: &C, mapping: StandardMapping) -> Result<()> {
    let mut active: StandardMappingActiveModel = mapping.into();
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}
