//! Pure projections over a record slice: filtering, dashboard counters,
//! category options and the per-category report.

use serde::{Deserialize, Serialize};

use crate::record::{InventoryRecord, UNCATEGORIZED};

/// Table filter. Empty fields disable their filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryQuery {
    pub category: String,
    pub text: String,
}

impl InventoryQuery {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub total: usize,
    pub low_stock: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub items: usize,
    pub total_qty: f64,
    pub low_stock: usize,
}

/// Records matching `query`, in collection order.
pub fn project<'a>(
    records: &'a [InventoryRecord],
    query: &InventoryQuery,
) -> Vec<&'a InventoryRecord> {
    let needle = query.text.trim().to_lowercase();
    records
        .iter()
        .filter(|record| query.category.is_empty() || record.category_matches(&query.category))
        .filter(|record| needle.is_empty() || record.text_matches(&needle))
        .collect()
}

/// Counters always cover the whole collection, never a filtered view.
pub fn counters(records: &[InventoryRecord]) -> Counters {
    Counters {
        total: records.len(),
        low_stock: records.iter().filter(|record| record.is_low_stock()).count(),
        pending: records.iter().filter(|record| record.is_pending()).count(),
    }
}

pub fn distinct_categories(records: &[InventoryRecord]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for record in records {
        if record.category.is_empty() || out.iter().any(|seen| seen == &record.category) {
            continue;
        }
        out.push(record.category.clone());
    }
    out
}

pub fn category_report(records: &[InventoryRecord]) -> Vec<CategorySummary> {
    let mut rows: Vec<CategorySummary> = Vec::new();
    for record in records {
        let label = if record.category.is_empty() {
            UNCATEGORIZED
        } else {
            record.category.as_str()
        };
        let index = match rows.iter().position(|row| row.category == label) {
            Some(index) => index,
            None => {
                rows.push(CategorySummary {
                    category: label.to_string(),
                    items: 0,
                    total_qty: 0.0,
                    low_stock: 0,
                });
                rows.len() - 1
            }
        };
        let row = &mut rows[index];
        row.items += 1;
        row.total_qty += record.qty;
        if record.is_low_stock() {
            row.low_stock += 1;
        }
    }
    rows
}
