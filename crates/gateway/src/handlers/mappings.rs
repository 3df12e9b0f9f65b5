//! SKU mapping management handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::AppState;
use skumap_common::{
    auth::AuthContext,
    config::InterchangeConfig,
    db::inputs::{CreateMapping, UpdateMapping},
    db::{MappingFilter, MappingWithVariations, StandardSkuMatch},
    errors::{AppError, Result},
    metrics,
};

/// Listing query string
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct MappingListResponse {
    pub data: Vec<MappingWithVariations>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub sku: Option<String>,
}

impl ListQuery {
    /// 1-indexed page and a page size within `[1, max_page_size]`
    fn bounds(&self, limits: &InterchangeConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size);
        (page, page_size)
    }
}

/// List mappings, optionally filtered by a case-insensitive search term
pub async fn list_mappings(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<MappingListResponse>> {
    let (page, page_size) = query.bounds(&state.config.interchange);

    let filter = MappingFilter { search: query.search };
    let result = state.repo.list_mappings_page(&filter, page, page_size).await?;
    let total_pages = result.total_pages();

    Ok(Json(MappingListResponse {
        data: result.items,
        pagination: Pagination {
            page: result.page,
            page_size: result.page_size,
            total: result.total,
            total_pages,
        },
    }))
}

/// Create a mapping with its variations
pub async fn create_mapping(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: std::result::Result<Json<CreateMapping>, JsonRejection>,
) -> Result<(StatusCode, Json<MappingWithVariations>)> {
    auth.require_write()?;
    let input = json_body(payload)?;

    let mapping = state.repo.create_mapping(input).await?;
    metrics::record_mutation("create");

    info!(
        user_id = auth.user_id,
        mapping_id = mapping.id,
        standard_sku = %mapping.standard_sku,
        "Mapping created via API"
    );

    Ok((StatusCode::CREATED, Json(mapping)))
}

/// Get a mapping with its variations
pub async fn get_mapping(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<MappingWithVariations>> {
    state.repo.get_mapping(id).await.map(Json)
}

/// Patch a mapping, or replace its variations with `replacementMode`
pub async fn update_mapping(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    payload: std::result::Result<Json<UpdateMapping>, JsonRejection>,
) -> Result<Json<MappingWithVariations>> {
    auth.require_write()?;
    let input = json_body(payload)?;
    let replacement = input.replacement_mode;

    let mapping = state.repo.update_mapping(id, input).await?;
    metrics::record_mutation("update");

    info!(
        user_id = auth.user_id,
        mapping_id = id,
        replacement_mode = replacement,
        variations = mapping.variations.len(),
        "Mapping updated via API"
    );

    Ok(Json(mapping))
}

/// Delete a mapping and all of its variations
pub async fn delete_mapping(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    auth.require_write()?;

    state.repo.delete_mapping(id).await?;
    metrics::record_mutation("delete");

    info!(user_id = auth.user_id, mapping_id = id, "Mapping deleted via API");

    Ok(StatusCode::NO_CONTENT)
}

/// Remove one variation from a mapping
pub async fn delete_variation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, variation_id)): Path<(i32, i32)>,
) -> Result<StatusCode> {
    auth.require_write()?;

    state.repo.delete_variation(id, variation_id).await?;
    metrics::record_mutation("delete_variation");

    Ok(StatusCode::NO_CONTENT)
}

/// Exact lookup of the standard SKU a variation belongs to
pub async fn lookup(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<LookupQuery>,
) -> Result<Json<StandardSkuMatch>> {
    let sku = query
        .sku
        .filter(|sku| !sku.trim().is_empty())
        .ok_or_else(|| AppError::MissingField {
            field: "sku".to_string(),
        })?;

    state
        .repo
        .find_standard_sku_for(&sku)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound {
            resource_type: "SKU variation".to_string(),
            id: sku,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skumap_common::AppConfig;

    fn query(page: Option<u64>, page_size: Option<u64>) -> ListQuery {
        ListQuery { search: None, page, page_size }
    }

    #[test]
    fn test_page_bounds() {
        let limits = AppConfig::default().interchange;

        assert_eq!(query(None, None).bounds(&limits), (1, 20));
        assert_eq!(query(Some(0), Some(0)).bounds(&limits), (1, 1));
        assert_eq!(query(Some(3), Some(500)).bounds(&limits), (3, 100));
    }
}
