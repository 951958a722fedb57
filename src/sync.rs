use chrono::Utc;
use serde::Serialize;

use crate::backend::{PersistenceBackend, Subscription};
use crate::error::InventoryResult;
use crate::query::{CategorySummary, Counters, InventoryQuery};
use crate::record::{status_patch, InventoryRecord, RecordFields, RecordStatus};
use crate::settings::InventorySettings;
use crate::view_model::{EntryPoint, InventoryViewModel};

/// Everything the table screen renders, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryView {
    pub rows: Vec<InventoryRecord>,
    pub counters: Counters,
    pub categories: Vec<String>,
    pub revision: String,
}

/// Keeps an [`InventoryViewModel`] in step with a [`PersistenceBackend`].
///
/// Intents are checked locally, sent to the backend, and applied to the
/// view-model once the backend accepts them. The next snapshot from the
/// backend then replaces that optimistic state.
pub struct InventorySync<B: PersistenceBackend> {
    backend: B,
    subscription: Subscription,
    view_model: InventoryViewModel,
}

impl<B: PersistenceBackend> InventorySync<B> {
    pub fn new(mut backend: B, settings: &InventorySettings) -> InventoryResult<Self> {
        let subscription = backend.subscribe()?;
        let mut sync = Self {
            backend,
            subscription,
            view_model: InventoryViewModel::from_settings(settings),
        };
        sync.pump();
        Ok(sync)
    }

    pub fn view_model(&self) -> &InventoryViewModel {
        &self.view_model
    }

    /// Reconciles the newest queued snapshot, if any. Returns whether state changed.
    pub fn pump(&mut self) -> bool {
        match self.subscription.latest() {
            Some(snapshot) => self.view_model.reconcile(&snapshot),
            None => false,
        }
    }

    pub fn view(&self, query: &InventoryQuery) -> InventoryView {
        InventoryView {
            rows: self
                .view_model
                .project(query)
                .into_iter()
                .cloned()
                .collect(),
            counters: self.view_model.counters(),
            categories: self.view_model.distinct_categories(),
            revision: self.view_model.revision(),
        }
    }

    pub fn category_report(&self) -> Vec<CategorySummary> {
        self.view_model.category_report()
    }

    /// Admin add. Returns the backend-assigned id.
    pub fn add(&mut self, fields: RecordFields) -> InventoryResult<String> {
        self.create(fields, EntryPoint::Admin)
    }

    /// User request. Returns the backend-assigned id.
    pub fn submit_request(&mut self, fields: RecordFields) -> InventoryResult<String> {
        self.create(fields, EntryPoint::Request)
    }

    pub fn edit(&mut self, id: &str, fields: RecordFields) -> InventoryResult<()> {
        let now = Utc::now();
        let mut scratch = self.view_model.clone();
        scratch.edit_record_at(id, &fields, now)?;

        let mut patch = fields.to_patch();
        patch.insert(
            "updatedAt".to_string(),
            serde_json::json!(now.timestamp_millis()),
        );
        self.backend.update(id, patch)?;
        self.view_model = scratch;
        self.pump();
        tracing::info!(%id, "edited inventory item");
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> InventoryResult<()> {
        let mut scratch = self.view_model.clone();
        scratch.delete_record(id)?;
        self.backend.remove(id)?;
        self.view_model = scratch;
        self.pump();
        tracing::info!(%id, "deleted inventory item");
        Ok(())
    }

    pub fn approve(&mut self, id: &str) -> InventoryResult<()> {
        self.set_status(id, RecordStatus::Active)
    }

    pub fn deny(&mut self, id: &str) -> InventoryResult<()> {
        self.set_status(id, RecordStatus::Rejected)
    }

    fn set_status(&mut self, id: &str, status: RecordStatus) -> InventoryResult<()> {
        let now = Utc::now();
        let mut scratch = self.view_model.clone();
        scratch.set_status_at(id, status, now)?;
        self.backend.update(id, status_patch(status, now))?;
        self.view_model = scratch;
        self.pump();
        tracing::info!(%id, %status, "changed inventory item status");
        Ok(())
    }

    fn create(&mut self, fields: RecordFields, entry: EntryPoint) -> InventoryResult<String> {
        let mut record = self.view_model.prepare_record(fields, entry)?;
        let id = self.backend.create(record.to_fields())?;
        record.id = id.clone();
        if !self.view_model.contains(&id) {
            self.view_model.insert_record(record)?;
        }
        self.pump();
        tracing::info!(%id, ?entry, "created inventory item");
        Ok(id)
    }
}
