//! Bulk interchange of the catalog
//!
//! - Delimited-text export (one row per mapping/variation pair) and JSON export
//! - Import with per-mapping transactions and an aggregate summary

mod delimited;
mod import;

pub use delimited::{export_csv, export_filename, parse_import, ParsedImport, DEFAULT_IMPORT_SOURCE, EXPORT_HEADER};
pub use import::import_catalog;

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Export representation selected by the `format` query parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(AppError::validation(
                "format",
                format!("unsupported export format '{}', expected csv or json", other),
            )),
        }
    }
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Well-formed data rows
    pub rows_processed: usize,
    pub mappings_created: usize,
    pub mappings_updated: usize,
    /// Mapping groups whose transaction failed
    pub errors: usize,
    pub import_duration_ms: u64,
    /// Malformed rows dropped before grouping
    pub rows_skipped: usize,
    /// Variations dropped because their customer does not exist
    pub variations_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" json ".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::default(), ExportFormat::Csv);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = ImportSummary { rows_processed: 9, ..Default::default() };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["rowsProcessed"], 9);
        assert_eq!(json["importDurationMs"], 0);
        assert_eq!(json["mappingsUpdated"], 0);
    }
}
