//! API handlers module

pub mod detection;
pub mod health;
pub mod interchange;
pub mod mappings;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;
use skumap_common::errors::{AppError, Result};

/// Generic `{ success, data }` envelope
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Unwrap a JSON body, reporting malformed payloads in the API error format
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidFormat {
            message: rejection.body_text(),
        })
}
