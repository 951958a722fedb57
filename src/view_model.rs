use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{InventoryError, InventoryResult};
use crate::query::{self, CategorySummary, Counters, InventoryQuery};
use crate::record::{new_id, InventoryRecord, RecordFields, RecordStatus, RawSnapshot};
use crate::settings::InventorySettings;

/// Which form an item was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Direct add from the admin table; status comes from settings.
    Admin,
    /// User-submitted request; always Pending and needs a positive quantity.
    Request,
}

/// Sole owner of the canonical item list. Readers only ever see derived
/// projections or shared references.
#[derive(Debug, Clone)]
pub struct InventoryViewModel {
    records: Vec<InventoryRecord>,
    admin_initial_status: RecordStatus,
}

impl Default for InventoryViewModel {
    fn default() -> Self {
        Self::new(InventorySettings::default().admin_initial_status)
    }
}

impl InventoryViewModel {
    pub fn new(admin_initial_status: RecordStatus) -> Self {
        Self {
            records: Vec::new(),
            admin_initial_status,
        }
    }

    pub fn from_settings(settings: &InventorySettings) -> Self {
        Self::new(settings.admin_initial_status)
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&InventoryRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replaces the whole collection with `snapshot`. Returns whether anything changed.
    pub fn reconcile(&mut self, snapshot: &RawSnapshot) -> bool {
        let next: Vec<InventoryRecord> = snapshot
            .iter()
            .map(|(id, fields)| InventoryRecord::from_raw(id, fields))
            .collect();
        if next == self.records {
            return false;
        }
        tracing::debug!(
            before = self.records.len(),
            after = next.len(),
            "reconciled inventory snapshot"
        );
        self.records = next;
        true
    }

    /// Validates `fields` for `entry` and builds the record without inserting it.
    pub fn prepare_record(
        &self,
        fields: RecordFields,
        entry: EntryPoint,
    ) -> InventoryResult<InventoryRecord> {
        self.prepare_record_at(fields, entry, Utc::now())
    }

    pub(crate) fn prepare_record_at(
        &self,
        fields: RecordFields,
        entry: EntryPoint,
        now: DateTime<Utc>,
    ) -> InventoryResult<InventoryRecord> {
        let name = fields.required_name()?;
        let status = match entry {
            EntryPoint::Admin => self.admin_initial_status,
            EntryPoint::Request => {
                if fields.normalized_qty() <= 0.0 {
                    return Err(InventoryError::validation(
                        "Quantity must be greater than zero",
                    ));
                }
                RecordStatus::Pending
            }
        };
        Ok(fields.into_record(new_id(), name, status, now))
    }

    pub fn add_record(&mut self, fields: RecordFields) -> InventoryResult<&InventoryRecord> {
        let record = self.prepare_record(fields, EntryPoint::Admin)?;
        self.insert_record(record)
    }

    pub fn submit_request(&mut self, fields: RecordFields) -> InventoryResult<&InventoryRecord> {
        let record = self.prepare_record(fields, EntryPoint::Request)?;
        self.insert_record(record)
    }

    /// Appends a record whose id was assigned elsewhere.
    pub fn insert_record(&mut self, record: InventoryRecord) -> InventoryResult<&InventoryRecord> {
        if self.contains(&record.id) {
            return Err(InventoryError::validation(format!(
                "duplicate item id {}",
                record.id
            )));
        }
        let index = self.records.len();
        self.records.push(record);
        Ok(&self.records[index])
    }

    pub fn edit_record(
        &mut self,
        id: &str,
        fields: &RecordFields,
    ) -> InventoryResult<&InventoryRecord> {
        self.edit_record_at(id, fields, Utc::now())
    }

    pub(crate) fn edit_record_at(
        &mut self,
        id: &str,
        fields: &RecordFields,
        now: DateTime<Utc>,
    ) -> InventoryResult<&InventoryRecord> {
        let index = self.require(id)?;
        fields.validate_patch()?;
        let record = &mut self.records[index];
        fields.apply_to(record);
        record.updated_at = Some(now);
        Ok(&self.records[index])
    }

    /// Unknown ids are an error rather than a silent no-op.
    pub fn delete_record(&mut self, id: &str) -> InventoryResult<InventoryRecord> {
        let index = self.require(id)?;
        Ok(self.records.remove(index))
    }

    /// Re-approving an Active item is allowed and only re-stamps `updated_at`.
    pub fn approve(&mut self, id: &str) -> InventoryResult<&InventoryRecord> {
        self.set_status_at(id, RecordStatus::Active, Utc::now())
    }

    pub fn deny(&mut self, id: &str) -> InventoryResult<&InventoryRecord> {
        self.set_status_at(id, RecordStatus::Rejected, Utc::now())
    }

    pub(crate) fn set_status_at(
        &mut self,
        id: &str,
        status: RecordStatus,
        now: DateTime<Utc>,
    ) -> InventoryResult<&InventoryRecord> {
        let index = self.require(id)?;
        let record = &mut self.records[index];
        record.status = status;
        record.updated_at = Some(now);
        Ok(&self.records[index])
    }

    pub fn project(&self, query: &InventoryQuery) -> Vec<&InventoryRecord> {
        query::project(&self.records, query)
    }

    pub fn counters(&self) -> Counters {
        query::counters(&self.records)
    }

    pub fn distinct_categories(&self) -> Vec<String> {
        query::distinct_categories(&self.records)
    }

    pub fn category_report(&self) -> Vec<CategorySummary> {
        query::category_report(&self.records)
    }

    /// Content digest of the canonical list; equal lists give equal revisions.
    pub fn revision(&self) -> String {
        let bytes = serde_json::to_vec(&self.records).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_slice());
        let digest = hasher.finalize();
        B64.encode(&digest[..12])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn require(&self, id: &str) -> InventoryResult<usize> {
        self.position(id).ok_or_else(|| InventoryError::not_found(id))
    }
}
