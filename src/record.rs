use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{InventoryError, InventoryResult};

/// Field map for a single record as a backend stores it (no id).
pub type RawFields = Map<String, Value>;

/// Full backend snapshot: id -> record fields, in insertion order.
pub type RawSnapshot = Map<String, Value>;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RecordStatus {
    Pending,
    #[default]
    Active,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Rejected => "Rejected",
        }
    }

    /// Case-insensitive parse of a status label. Surrounding whitespace is not
    /// ignored, so `" Pending "` is not a pending label.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    fn from_raw(value: Option<&Value>) -> Self {
        let text = nonempty_string(value).unwrap_or_default();
        if text.trim().is_empty() {
            return Self::default();
        }
        match Self::parse(text.as_str()) {
            Some(status) => status,
            None => {
                tracing::warn!(status = %text, "unrecognized item status, treating as Active");
                Self::default()
            }
        }
    }
}

impl TryFrom<String> for RecordStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str()).ok_or_else(|| format!("unknown item status `{value}`"))
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, fully-defaulted inventory item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub location: String,
    pub supplier: String,
    pub sku: String,
    pub qty: f64,
    pub threshold: f64,
    pub status: RecordStatus,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// Builds a record from whatever a backend holds under `id`.
    ///
    /// Missing or malformed fields fall back to their defaults; this never fails.
    pub fn from_raw(id: &str, value: &Value) -> Self {
        let empty = Map::new();
        let fields = value.as_object().unwrap_or(&empty);
        Self {
            id: id.to_string(),
            name: raw_string(fields, "name"),
            category: raw_string(fields, "category"),
            unit: raw_string(fields, "unit"),
            location: raw_string(fields, "location"),
            supplier: raw_string(fields, "supplier"),
            sku: raw_string(fields, "sku"),
            qty: parse_nonnegative_number(fields.get("qty")),
            threshold: parse_nonnegative_number(fields.get("threshold")),
            status: RecordStatus::from_raw(fields.get("status")),
            created_at: parse_timestamp(fields.get("createdAt")),
            updated_at: parse_timestamp(fields.get("updatedAt")),
        }
    }

    /// Backend representation of this record, without the id.
    pub fn to_fields(&self) -> RawFields {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(self.name));
        fields.insert("category".to_string(), json!(self.category));
        fields.insert("unit".to_string(), json!(self.unit));
        fields.insert("qty".to_string(), number_value(self.qty));
        fields.insert("threshold".to_string(), number_value(self.threshold));
        fields.insert("location".to_string(), json!(self.location));
        fields.insert("supplier".to_string(), json!(self.supplier));
        fields.insert("sku".to_string(), json!(self.sku));
        fields.insert("status".to_string(), json!(self.status.as_str()));
        if let Some(created) = self.created_at {
            fields.insert("createdAt".to_string(), json!(created.timestamp_millis()));
        }
        if let Some(updated) = self.updated_at {
            fields.insert("updatedAt".to_string(), json!(updated.timestamp_millis()));
        }
        fields
    }

    pub fn is_low_stock(&self) -> bool {
        self.threshold > 0.0 && self.qty < self.threshold
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    pub(crate) fn category_matches(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }

    /// `needle` must already be lowercased.
    pub(crate) fn text_matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.sku.to_lowercase().contains(needle)
    }
}

/// Item fields as entered in a form. Every field is optional so the same shape
/// serves creation and partial edits.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFields {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
    pub qty: Option<Value>,
    pub threshold: Option<Value>,
}

impl RecordFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_qty(mut self, qty: impl Into<Value>) -> Self {
        self.qty = Some(qty.into());
        self
    }

    pub fn with_threshold(mut self, threshold: impl Into<Value>) -> Self {
        self.threshold = Some(threshold.into());
        self
    }

    /// Trimmed name, or a validation error when it is missing or blank.
    pub(crate) fn required_name(&self) -> InventoryResult<String> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(InventoryError::validation("Name required"));
        }
        Ok(name.to_string())
    }

    pub(crate) fn normalized_qty(&self) -> f64 {
        parse_nonnegative_number(self.qty.as_ref())
    }

    /// Builds a brand-new record; the caller has already validated the name.
    pub(crate) fn into_record(
        self,
        id: String,
        name: String,
        status: RecordStatus,
        now: DateTime<Utc>,
    ) -> InventoryRecord {
        InventoryRecord {
            id,
            name,
            category: trimmed(self.category),
            unit: trimmed(self.unit),
            location: trimmed(self.location),
            supplier: trimmed(self.supplier),
            sku: trimmed(self.sku),
            qty: parse_nonnegative_number(self.qty.as_ref()),
            threshold: parse_nonnegative_number(self.threshold.as_ref()),
            status,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Rejects a patch that would blank out the name.
    pub(crate) fn validate_patch(&self) -> InventoryResult<()> {
        if self.name.is_some() {
            self.required_name()?;
        }
        Ok(())
    }

    /// Overwrites the provided fields of `record`, leaving the rest alone.
    pub(crate) fn apply_to(&self, record: &mut InventoryRecord) {
        if let Some(name) = &self.name {
            record.name = name.trim().to_string();
        }
        if let Some(category) = &self.category {
            record.category = category.trim().to_string();
        }
        if let Some(unit) = &self.unit {
            record.unit = unit.trim().to_string();
        }
        if let Some(location) = &self.location {
            record.location = location.trim().to_string();
        }
        if let Some(supplier) = &self.supplier {
            record.supplier = supplier.trim().to_string();
        }
        if let Some(sku) = &self.sku {
            record.sku = sku.trim().to_string();
        }
        if let Some(qty) = &self.qty {
            record.qty = parse_nonnegative_number(Some(qty));
        }
        if let Some(threshold) = &self.threshold {
            record.threshold = parse_nonnegative_number(Some(threshold));
        }
    }

    /// Normalized backend fields for the provided keys only.
    pub(crate) fn to_patch(&self) -> RawFields {
        let mut patch = Map::new();
        let texts = [
            ("name", &self.name),
            ("category", &self.category),
            ("unit", &self.unit),
            ("location", &self.location),
            ("supplier", &self.supplier),
            ("sku", &self.sku),
        ];
        for (key, value) in texts {
            if let Some(text) = value {
                patch.insert(key.to_string(), json!(text.trim()));
            }
        }
        if let Some(qty) = &self.qty {
            patch.insert(
                "qty".to_string(),
                number_value(parse_nonnegative_number(Some(qty))),
            );
        }
        if let Some(threshold) = &self.threshold {
            patch.insert(
                "threshold".to_string(),
                number_value(parse_nonnegative_number(Some(threshold))),
            );
        }
        patch
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    let mut bytes = [0_u8; 10];
    OsRng.fill_bytes(&mut bytes);
    let mut hex = String::new();
    for b in bytes {
        hex.push_str(format!("{:02x}", b).as_str());
    }
    format!("id-{}-{hex}", now_millis())
}

/// Status update stamped with `now`, as sent to a backend on approve/deny.
pub(crate) fn status_patch(status: RecordStatus, now: DateTime<Utc>) -> RawFields {
    let mut patch = Map::new();
    patch.insert("status".to_string(), json!(status.as_str()));
    patch.insert("updatedAt".to_string(), json!(now.timestamp_millis()));
    patch
}

fn trimmed(value: Option<String>) -> String {
    value.map(|text| text.trim().to_string()).unwrap_or_default()
}

fn raw_string(fields: &RawFields, key: &str) -> String {
    nonempty_string(fields.get(key)).unwrap_or_default()
}

fn nonempty_string(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    if let Some(number) = value.as_i64() {
        return Some(number.to_string());
    }
    if let Some(number) = value.as_u64() {
        return Some(number.to_string());
    }
    if let Some(number) = value.as_f64() {
        return Some(number.to_string());
    }
    if let Some(boolean) = value.as_bool() {
        return Some(boolean.to_string());
    }
    None
}

/// Numbers and numeric strings pass through; anything else, negatives and
/// non-finite values become 0.
pub(crate) fn parse_nonnegative_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(v) => {
            if let Some(number) = v.as_f64() {
                Some(number)
            } else if let Some(text) = v.as_str() {
                text.trim().parse::<f64>().ok()
            } else {
                None
            }
        }
        None => None,
    };
    match parsed {
        Some(number) if number.is_finite() && number > 0.0 => number,
        _ => 0.0,
    }
}

/// Whole quantities stay integers on disk.
fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        json!(number as i64)
    } else {
        json!(number)
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Some(ms) = value.as_i64() {
        return DateTime::from_timestamp_millis(ms);
    }
    if let Some(ms) = value.as_f64() {
        return DateTime::from_timestamp_millis(ms.round() as i64);
    }
    let text = value.as_str()?.trim();
    if let Ok(ms) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let record = InventoryRecord::from_raw("a", &json!({ "name": "Bolt" }));
        assert_eq!(record.name, "Bolt");
        assert_eq!(record.category, "");
        assert_eq!(record.qty, 0.0);
        assert_eq!(record.threshold, 0.0);
        assert_eq!(record.status, RecordStatus::Active);
        assert!(record.created_at.is_none());
    }

    #[test]
    fn non_object_fields_normalize_to_defaults() {
        let record = InventoryRecord::from_raw("x", &json!("garbage"));
        assert_eq!(record.id, "x");
        assert_eq!(record.name, "");
        assert_eq!(record.status, RecordStatus::Active);
    }

    #[test]
    fn quantities_coerce_to_non_negative_numbers() {
        assert_eq!(parse_nonnegative_number(Some(&json!("12"))), 12.0);
        assert_eq!(parse_nonnegative_number(Some(&json!(" 3.5 "))), 3.5);
        assert_eq!(parse_nonnegative_number(Some(&json!("-"))), 0.0);
        assert_eq!(parse_nonnegative_number(Some(&json!("abc"))), 0.0);
        assert_eq!(parse_nonnegative_number(Some(&json!(-4))), 0.0);
        assert_eq!(parse_nonnegative_number(Some(&json!("NaN"))), 0.0);
        assert_eq!(parse_nonnegative_number(Some(&json!(true))), 0.0);
        assert_eq!(parse_nonnegative_number(None), 0.0);
    }

    #[test]
    fn status_parses_case_insensitively() {
        let record = InventoryRecord::from_raw("a", &json!({ "name": "A", "status": "pending" }));
        assert!(record.is_pending());
        assert_eq!(RecordStatus::parse("REJECTED"), Some(RecordStatus::Rejected));
        assert_eq!(RecordStatus::parse("archived"), None);
    }

    #[test]
    fn padded_status_is_not_pending() {
        assert_eq!(RecordStatus::parse(" Pending "), None);
        let record = InventoryRecord::from_raw("a", &json!({ "name": "A", "status": " Pending " }));
        assert!(!record.is_pending());
        assert_eq!(record.status, RecordStatus::Active);
    }

    #[test]
    fn low_stock_requires_positive_threshold() {
        let mut record = InventoryRecord::from_raw("a", &json!({ "name": "A", "qty": 2 }));
        assert!(!record.is_low_stock());
        record.threshold = 5.0;
        assert!(record.is_low_stock());
        record.qty = 5.0;
        assert!(!record.is_low_stock());
    }

    #[test]
    fn timestamps_accept_millis_and_rfc3339() {
        let record = InventoryRecord::from_raw(
            "a",
            &json!({
                "name": "A",
                "createdAt": 1_700_000_000_000_i64,
                "updatedAt": "2024-01-02T03:04:05Z",
            }),
        );
        assert_eq!(
            record.created_at.map(|at| at.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn fields_survive_a_backend_round_trip() {
        let record = InventoryRecord::from_raw(
            "a",
            &json!({
                "name": "Flour",
                "category": "Food",
                "qty": 2.5,
                "threshold": 4,
                "status": "Rejected",
                "createdAt": 1_700_000_000_000_i64,
            }),
        );
        let again = InventoryRecord::from_raw("a", &Value::Object(record.to_fields()));
        assert_eq!(again, record);
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut record = InventoryRecord::from_raw(
            "a",
            &json!({ "name": "A", "category": "Tools", "qty": 1 }),
        );
        let patch = RecordFields {
            qty: Some(json!("7")),
            ..RecordFields::default()
        };
        patch.apply_to(&mut record);
        assert_eq!(record.qty, 7.0);
        assert_eq!(record.category, "Tools");
        assert_eq!(patch.to_patch().len(), 1);
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(RecordFields::named("   ").required_name().is_err());
        assert!(RecordFields::default().required_name().is_err());
        assert_eq!(
            RecordFields::named(" Widget ").required_name(),
            Ok("Widget".to_string())
        );
    }

    #[test]
    fn generated_ids_are_distinct() {
        let first = new_id();
        let second = new_id();
        assert!(first.starts_with("id-"));
        assert_ne!(first, second);
    }
}
