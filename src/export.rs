use crate::error::{InventoryError, InventoryResult};
use crate::record::InventoryRecord;

pub const EXPORT_COLUMNS: [&str; 9] = [
    "name",
    "sku",
    "category",
    "unit",
    "qty",
    "threshold",
    "location",
    "supplier",
    "status",
];

/// Renders `records` as CSV with a header row.
pub fn rows_to_csv<'a>(
    records: impl IntoIterator<Item = &'a InventoryRecord>,
) -> InventoryResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|err| InventoryError::backend(err.to_string()))?;
    for record in records {
        let cells = [
            record.name.clone(),
            record.sku.clone(),
            record.category.clone(),
            record.unit.clone(),
            record.qty.to_string(),
            record.threshold.to_string(),
            record.location.clone(),
            record.supplier.clone(),
            record.status.as_str().to_string(),
        ];
        writer
            .write_record(cells.iter().map(|cell| neutralize_csv_formula(cell)))
            .map_err(|err| InventoryError::backend(err.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| InventoryError::backend(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| InventoryError::backend(err.to_string()))
}

const MAX_FILENAME_CHARS: usize = 255;

pub fn sanitize_export_filename(value: &str) -> String {
    let clamped: String = value.trim().chars().take(MAX_FILENAME_CHARS).collect();
    let safe = sanitize_filename(clamped.as_str());
    if safe.to_lowercase().ends_with(".csv") {
        safe
    } else {
        format!("{safe}.csv")
    }
}

fn sanitize_filename(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "inventory-export.csv".to_string()
    } else {
        trimmed.to_string()
    }
}

fn should_neutralize_csv(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('\'') {
        return false;
    }
    matches!(
        trimmed.chars().next(),
        Some('=') | Some('+') | Some('-') | Some('@')
    )
}

fn neutralize_csv_formula(value: &str) -> String {
    if should_neutralize_csv(value) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}
