//! SKU detection handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use std::time::Instant;
use tracing::info;
use validator::Validate;

use super::json_body;
use crate::AppState;
use skumap_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    matching::{DetectionResult, MatchType},
    metrics,
};

/// Largest batch accepted in one call
pub const MAX_DETECTION_BATCH: usize = 1000;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 1000))]
    pub skus: Vec<String>,

    /// Prefer this customer's variation among equal exact matches
    pub customer_id: Option<i32>,
}

/// Resolve a batch of raw SKUs, one result per input in input order
pub async fn detect(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: std::result::Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<Vec<DetectionResult>>> {
    let request = json_body(payload)?;
    request.validate().map_err(|_| {
        AppError::validation(
            "skus",
            format!("skus must contain between 1 and {} entries", MAX_DETECTION_BATCH),
        )
    })?;

    let started = Instant::now();
    let catalog = state.repo.load_catalog().await?;
    let detector = state.detector;
    let DetectRequest { skus, customer_id } = request;

    // Scoring is CPU-bound and linear in the catalog size
    let results = tokio::task::spawn_blocking(move || detector.detect(&skus, &catalog, customer_id))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Detection task failed: {}", e),
        })?;

    let count = |kind: MatchType| results.iter().filter(|r| r.match_type == kind).count();
    let (exact, fuzzy, undetected) = (count(MatchType::Exact), count(MatchType::Fuzzy), count(MatchType::None));

    metrics::record_detection(started.elapsed().as_secs_f64(), exact, fuzzy, undetected);

    info!(
        user_id = auth.user_id,
        skus = results.len(),
        exact,
        fuzzy,
        undetected,
        duration_ms = started.elapsed().as_millis() as u64,
        "Detection batch complete"
    );

    Ok(Json(results))
}
