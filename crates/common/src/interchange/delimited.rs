//! Delimited-text reading and writing for the catalog interchange format

use crate::db::{MappingUpsert, MappingWithVariations, VariationUpsert};
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashMap;
use tracing::debug;

/// Export header. The trailing `CustomerID` column lets an import resolve
/// customers by id rather than by display name.
pub const EXPORT_HEADER: [&str; 6] = [
    "StandardSKU",
    "StandardDescription",
    "VariationSKU",
    "VariationSource",
    "CustomerName",
    "CustomerID",
];

/// Source recorded for imported variations whose source field is blank
pub const DEFAULT_IMPORT_SOURCE: &str = "CSV Import";

/// Minimum fields: standard SKU, description, variation SKU, source, customer id
const MIN_FIELDS: usize = 5;

/// Field holding the customer id when the header does not name one
const DEFAULT_CUSTOMER_COLUMN: usize = 4;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Render the catalog. Mappings without variations produce no rows.
pub fn export_csv(catalog: &[MappingWithVariations]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADER)?;

    for mapping in catalog {
        for variation in &mapping.variations {
            let customer_id = variation.customer_id.to_string();
            writer.write_record([
                mapping.standard_sku.as_str(),
                mapping.standard_description.as_str(),
                variation.variation_sku.as_str(),
                variation.source.as_str(),
                variation.customer_name.as_deref().unwrap_or(""),
                customer_id.as_str(),
            ])?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| AppError::Internal {
        message: format!("Failed to flush CSV export: {}", e),
    })?;

    String::from_utf8(bytes).map_err(|e| AppError::Internal {
        message: format!("CSV export is not valid UTF-8: {}", e),
    })
}

/// Download name for an export taken on `date`
pub fn export_filename(date: NaiveDate) -> String {
    format!("sku_mappings_{}.csv", date.format("%Y-%m-%d"))
}

/// Import rows grouped by standard SKU, in first-encounter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedImport {
    pub groups: Vec<MappingUpsert>,
    pub rows_processed: usize,
    pub rows_skipped: usize,
}

struct ImportRow {
    standard_sku: String,
    standard_description: String,
    variation: VariationUpsert,
}

impl ImportRow {
    /// `None` for rows that are short, have blank keys or a non-integer customer id
    fn from_record(record: &StringRecord, customer_column: usize) -> Option<Self> {
        if record.len() < MIN_FIELDS {
            return None;
        }

        let required = |index: usize| record.get(index).filter(|field| !field.is_empty());

        let standard_sku = required(0)?.to_string();
        let variation_sku = required(2)?.to_string();
        let customer_id = required(customer_column)?.parse::<i32>().ok()?;

        Some(Self {
            standard_sku,
            standard_description: record.get(1).unwrap_or_default().to_string(),
            variation: VariationUpsert {
                variation_sku,
                source: required(3).unwrap_or(DEFAULT_IMPORT_SOURCE).to_string(),
                customer_id,
            },
        })
    }
}

/// Tab when the header line has tabs and no commas
fn sniff_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|byte| *byte == b'\n').next().unwrap_or_default();
    if header.contains(&b'\t') && !header.contains(&b',') {
        b'\t'
    } else {
        b','
    }
}

/// Parse an uploaded file. Header problems fail the whole file; bad data
/// rows are counted and skipped.
pub fn parse_import(data: &[u8]) -> Result<ParsedImport> {
    if data.starts_with(ZIP_MAGIC) {
        return Err(AppError::InvalidFormat {
            message: "Spreadsheet uploads are not supported; save the sheet as CSV".to_string(),
        });
    }

    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(sniff_delimiter(data))
        .from_reader(data);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::InvalidFormat {
            message: format!("Unreadable header: {}", e),
        })?
        .iter()
        .map(|name| name.to_lowercase())
        .collect();

    let joined = header.join(",");
    if !joined.contains("standardsku") || !joined.contains("variationsku") {
        return Err(AppError::InvalidFormat {
            message: "Header must include StandardSKU and VariationSKU columns".to_string(),
        });
    }

    let customer_column = header
        .iter()
        .position(|name| name.replace([' ', '_'], "") == "customerid")
        .unwrap_or(DEFAULT_CUSTOMER_COLUMN);

    let mut parsed = ParsedImport::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, record) in reader.records().enumerate() {
        let Some(row) = record
            .ok()
            .and_then(|record| ImportRow::from_record(&record, customer_column))
        else {
            // header is line 1
            debug!(line = index + 2, "Skipping malformed import row");
            parsed.rows_skipped += 1;
            continue;
        };

        parsed.rows_processed += 1;

        let groups = &mut parsed.groups;
        let position = *positions.entry(row.standard_sku.clone()).or_insert_with(|| {
            groups.push(MappingUpsert {
                standard_sku: row.standard_sku.clone(),
                standard_description: String::new(),
                variations: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        if group.standard_description.is_empty() {
            group.standard_description = row.standard_description;
        }
        group.variations.push(row.variation);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::VariationView;
    use crate::errors::ErrorCode;
    use chrono::{DateTime, FixedOffset, Utc};

    fn catalog() -> Vec<MappingWithVariations> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let variation = |id: i32, mapping_id: i32, sku: &str, customer_id: i32, name: &str| VariationView {
            id,
            mapping_id,
            customer_id,
            customer_name: Some(name.to_string()),
            variation_sku: sku.to_string(),
            source: "Email Import".to_string(),
            created_at: now,
            updated_at: now,
        };

        vec![
            MappingWithVariations {
                id: 1,
                standard_sku: "CF226X".to_string(),
                standard_description: "HP 26X Toner, \"High Yield\"".to_string(),
                variations: vec![
                    variation(1, 1, "HP26X", 1, "Tech Solutions Inc"),
                    variation(2, 1, "26X", 2, "Acme, Ltd"),
                ],
                created_at: now,
                updated_at: now,
            },
            MappingWithVariations {
                id: 2,
                standard_sku: "EMPTY".to_string(),
                standard_description: "No variations".to_string(),
                variations: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        ]
    }

    #[test]
    fn test_export_rows_and_quoting() {
        let csv = export_csv(&catalog()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerName,CustomerID"
        );
        assert_eq!(
            lines[1],
            "CF226X,\"HP 26X Toner, \"\"High Yield\"\"\",HP26X,Email Import,Tech Solutions Inc,1"
        );
        assert_eq!(
            lines[2],
            "CF226X,\"HP 26X Toner, \"\"High Yield\"\"\",26X,Email Import,\"Acme, Ltd\",2"
        );
        // Mapping without variations is omitted
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date), "sku_mappings_2024-03-09.csv");
    }

    #[test]
    fn test_exported_file_parses_back() {
        let csv = export_csv(&catalog()).unwrap();
        let parsed = parse_import(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows_processed, 2);
        assert_eq!(parsed.groups.len(), 1);
        let group = &parsed.groups[0];
        assert_eq!(group.standard_description, "HP 26X Toner, \"High Yield\"");
        assert_eq!(group.variations[1].customer_id, 2);
        assert_eq!(group.variations[1].variation_sku, "26X");
    }

    #[test]
    fn test_five_column_file_reads_customer_id_from_fifth_field() {
        let data = "standardSku,standardDescription,variationSku,variationSource,customerId\n\
                    CF226X,HP 26X,HP26X,Manual Entry,3\n";
        let parsed = parse_import(data.as_bytes()).unwrap();
        assert_eq!(parsed.groups[0].variations[0].customer_id, 3);
    }

    #[test]
    fn test_missing_header_columns_fail_the_file() {
        let data = "sku,description\nCF226X,HP 26X\n";
        let err = parse_import(data.as_bytes()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);

        let err = parse_import(b"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let data = "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
                    CF226X,HP 26X,HP26X,Manual Entry,1\n\
                    CF226X,HP 26X,26X,Manual Entry\n\
                    CF226X,HP 26X,,Manual Entry,1\n\
                    ,HP 26X,HP26X,Manual Entry,1\n\
                    CF226X,HP 26X,HP-26X,Manual Entry,abc\n\
                    CE285A,HP 85A,85A,,2\n";
        let parsed = parse_import(data.as_bytes()).unwrap();

        assert_eq!(parsed.rows_processed, 2);
        assert_eq!(parsed.rows_skipped, 4);
        assert_eq!(parsed.groups.len(), 2);
        assert_eq!(parsed.groups[1].variations[0].source, DEFAULT_IMPORT_SOURCE);
    }

    #[test]
    fn test_groups_keep_encounter_order() {
        let data = "StandardSKU,StandardDescription,VariationSKU,VariationSource,CustomerID\n\
                    B,,b1,Manual Entry,1\n\
                    A,Alpha,a1,Manual Entry,1\n\
                    B,Bravo,b2,Manual Entry,1\n";
        let parsed = parse_import(data.as_bytes()).unwrap();

        let order: Vec<&str> = parsed.groups.iter().map(|g| g.standard_sku.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(parsed.groups[0].variations.len(), 2);
        // First non-empty description wins
        assert_eq!(parsed.groups[0].standard_description, "Bravo");
    }

    #[test]
    fn test_tab_delimited_with_bom() {
        let data = "\u{feff}StandardSKU\tStandardDescription\tVariationSKU\tVariationSource\tCustomerID\n\
                    CF226X\tHP 26X, black\tHP26X\tManual Entry\t1\n";
        let parsed = parse_import(data.as_bytes()).unwrap();

        assert_eq!(parsed.rows_processed, 1);
        assert_eq!(parsed.groups[0].standard_description, "HP 26X, black");
    }

    #[test]
    fn test_spreadsheet_upload_is_rejected() {
        let err = parse_import(b"PK\x03\x04\x14\x00rest-of-zip").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }
}
