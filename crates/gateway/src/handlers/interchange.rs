//! Catalog import and export handlers

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::SuccessEnvelope;
use crate::AppState;
use skumap_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    interchange::{export_csv, export_filename, import_catalog, ExportFormat, ImportSummary},
};

/// Multipart field carrying the uploaded file
const UPLOAD_FIELD: &str = "file";

const SPREADSHEET_EXTENSIONS: &[&str] = &[".xlsx", ".xls"];

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub results: ImportSummary,
}

fn upload_error(limit: usize) -> impl Fn(MultipartError) -> AppError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { size: limit + 1, limit }
        } else {
            AppError::InvalidFormat {
                message: format!("Malformed upload: {}", e.body_text()),
            }
        }
    }
}

/// Export every mapping as CSV (default) or nested JSON
pub async fn export(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let format = query
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?
        .unwrap_or_default();

    let catalog = state.repo.load_catalog().await?;

    info!(format = ?format, mappings = catalog.len(), "Exporting SKU mappings");

    match format {
        ExportFormat::Csv => {
            let body = export_csv(&catalog)?;
            let filename = export_filename(Utc::now().date_naive());

            Ok((
                [
                    (CONTENT_TYPE, "text/csv".to_string()),
                    (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
                ],
                body,
            )
                .into_response())
        }
        ExportFormat::Json => Ok(Json(SuccessEnvelope::new(catalog)).into_response()),
    }
}

/// Import a delimited-text upload sent as multipart field `file`
pub async fn import(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>> {
    auth.require_write()?;

    let limit = state.config.interchange.max_upload_bytes;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(upload_error(limit))? {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await.map_err(upload_error(limit))?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (file_name, data) = upload.ok_or_else(|| AppError::MissingField {
        field: UPLOAD_FIELD.to_string(),
    })?;

    if data.len() > limit {
        return Err(AppError::PayloadTooLarge { size: data.len(), limit });
    }

    if let Some(name) = file_name.as_deref() {
        let lower = name.to_lowercase();
        if SPREADSHEET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Err(AppError::InvalidFormat {
                message: format!("'{}' is a spreadsheet; upload it as CSV", name),
            });
        }
    }

    let results = import_catalog(&state.repo, &data).await?;

    info!(
        user_id = auth.user_id,
        file = file_name.as_deref().unwrap_or("<unnamed>"),
        bytes = data.len(),
        rows_processed = results.rows_processed,
        errors = results.errors,
        "Import request handled"
    );

    Ok(Json(ImportResponse {
        message: format!(
            "Import completed: {} rows processed, {} mappings created, {} updated",
            results.rows_processed, results.mappings_created, results.mappings_updated
        ),
        results,
    }))
}
