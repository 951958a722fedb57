//! JSON-file persistence backend.
//!
//! The file holds one object mapping item id to item fields. Files written by
//! the old request form hold a bare array of items instead; those are adopted on
//! open and get fresh ids.

use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::backend::{PersistenceBackend, Subscribers, Subscription};
use crate::error::{InventoryError, InventoryResult};
use crate::record::{new_id, RawFields, RawSnapshot};

#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    records: RawSnapshot,
    subscribers: Subscribers,
}

impl LocalStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Map::new(),
            subscribers: Subscribers::new(),
        }
    }

    /// Loads `path`, starting empty when the file is missing or blank.
    pub fn open(path: impl Into<PathBuf>) -> InventoryResult<Self> {
        let path = path.into();
        let raw = if path.exists() {
            fs::read_to_string(path.as_path())?
        } else {
            String::new()
        };
        let records = if raw.trim().is_empty() {
            Map::new()
        } else {
            let parsed: Value = serde_json::from_str(raw.as_str()).map_err(|err| {
                InventoryError::backend(format!(
                    "{} is not valid JSON: {err}",
                    path.to_string_lossy()
                ))
            })?;
            ensure_store_shape(parsed)?
        };
        tracing::info!(
            path = %path.to_string_lossy(),
            items = records.len(),
            "opened inventory store"
        );
        Ok(Self {
            path: Some(path),
            records,
            subscribers: Subscribers::new(),
        })
    }

    pub fn snapshot(&self) -> &RawSnapshot {
        &self.records
    }

    /// Runs `change` against the records, then persists and notifies.
    /// On any failure the previous records are restored.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut RawSnapshot) -> InventoryResult<T>,
    ) -> InventoryResult<T> {
        let previous = self.records.clone();
        let out = match change(&mut self.records) {
            Ok(value) => value,
            Err(err) => {
                self.records = previous;
                return Err(err);
            }
        };
        if let Err(err) = self.persist() {
            tracing::error!(error = %err, "failed to persist inventory store");
            self.records = previous;
            return Err(err);
        }
        self.subscribers.broadcast(&self.records);
        Ok(out)
    }

    fn persist(&self) -> InventoryResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&Value::Object(self.records.clone()))?;
        write_text_file(path, content.as_str())
    }
}

impl PersistenceBackend for LocalStore {
    fn subscribe(&mut self) -> InventoryResult<Subscription> {
        Ok(self.subscribers.open(&self.records))
    }

    fn create(&mut self, fields: RawFields) -> InventoryResult<String> {
        self.commit(|records| {
            let mut id = new_id();
            while records.contains_key(&id) {
                id = new_id();
            }
            records.insert(id.clone(), Value::Object(fields));
            tracing::debug!(%id, "created inventory item");
            Ok(id)
        })
    }

    fn update(&mut self, id: &str, fields: RawFields) -> InventoryResult<()> {
        self.commit(|records| {
            let Some(existing) = records.get_mut(id) else {
                return Err(InventoryError::not_found(id));
            };
            match existing {
                Value::Object(stored) => stored.extend(fields),
                other => *other = Value::Object(fields),
            }
            tracing::debug!(%id, "updated inventory item");
            Ok(())
        })
    }

    fn remove(&mut self, id: &str) -> InventoryResult<()> {
        self.commit(|records| {
            if records.shift_remove(id).is_none() {
                return Err(InventoryError::not_found(id));
            }
            tracing::debug!(%id, "removed inventory item");
            Ok(())
        })
    }
}

/// Accepts the keyed object layout or the legacy array layout.
fn ensure_store_shape(value: Value) -> InventoryResult<RawSnapshot> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            let mut map = Map::new();
            for item in items {
                let mut id = new_id();
                while map.contains_key(&id) {
                    id = new_id();
                }
                map.insert(id, item);
            }
            tracing::info!(items = map.len(), "adopted legacy inventory array");
            Ok(map)
        }
        Value::Null => Ok(Map::new()),
        _ => Err(InventoryError::backend(
            "inventory file must hold an object or an array",
        )),
    }
}

/// Rejects absolute paths and `..` so a configured file name stays inside the storage root.
pub fn sanitize_relative_path(value: &str) -> InventoryResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in PathBuf::from(value).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(InventoryError::validation("Invalid storage path.")),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(InventoryError::validation("Invalid storage path."));
    }
    Ok(out)
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// see either the old content or the new content.
pub fn write_text_file(path: &Path, content: &str) -> InventoryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let written = fs::File::create(tmp.as_path()).and_then(|mut file| {
        file.write_all(content.as_bytes())?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(tmp.as_path(), path)) {
        let _ = fs::remove_file(tmp.as_path());
        return Err(err.into());
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "inventory".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: Value) -> RawFields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("inventory.json")).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn legacy_array_gets_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        fs::write(
            &path,
            r#"[{"name":"Gloves","qty":"2","threshold":"-","status":"pending"},{"name":"Tape","qty":"1"}]"#,
        )
        .unwrap();
        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.snapshot().len(), 2);
        assert!(store.snapshot().keys().all(|id| id.starts_with("id-")));
        let first = store.snapshot().values().next().unwrap();
        assert_eq!(first["name"], json!("Gloves"));
    }

    #[test]
    fn blank_file_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        for content in ["", "  \n"] {
            fs::write(&path, content).unwrap();
            let mut store = LocalStore::open(&path).unwrap();
            assert!(store.snapshot().is_empty());
            let id = store.create(fields(json!({ "name": "Rope" }))).unwrap();
            assert!(LocalStore::open(&path).unwrap().snapshot().contains_key(&id));
        }
    }

    #[test]
    fn writes_replace_the_file_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        write_text_file(&path, r#"{"a":{"name":"Rope","qty":3}}"#).unwrap();
        write_text_file(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("inventory.json")]);
    }

    #[test]
    fn failed_write_keeps_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        write_text_file(&path, "{}").unwrap();
        // A directory squatting on the temp name makes the write fail.
        fs::create_dir(dir.path().join(".inventory.json.tmp")).unwrap();
        assert!(write_text_file(&path, r#"{"a":{}}"#).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn corrupt_file_is_a_backend_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            LocalStore::open(&path),
            Err(InventoryError::Backend(_))
        ));
        fs::write(&path, "42").unwrap();
        assert!(matches!(
            LocalStore::open(&path),
            Err(InventoryError::Backend(_))
        ));
    }

    #[test]
    fn mutations_persist_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.json");
        let mut store = LocalStore::open(&path).unwrap();
        let id = store.create(fields(json!({ "name": "Rope", "qty": 3 }))).unwrap();
        store
            .update(&id, fields(json!({ "status": "Active" })))
            .unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        let stored = &reopened.snapshot()[&id];
        assert_eq!(stored["name"], json!("Rope"));
        assert_eq!(stored["qty"], json!(3));
        assert_eq!(stored["status"], json!("Active"));
    }

    #[test]
    fn unknown_ids_are_not_found_and_leave_state_alone() {
        let mut store = LocalStore::in_memory();
        let id = store.create(fields(json!({ "name": "Rope" }))).unwrap();
        let before = store.snapshot().clone();
        assert!(matches!(
            store.update("nope", fields(json!({ "qty": 1 }))),
            Err(InventoryError::NotFound(_))
        ));
        assert!(matches!(
            store.remove("nope"),
            Err(InventoryError::NotFound(_))
        ));
        assert_eq!(store.snapshot(), &before);
        store.remove(&id).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn subscribers_receive_full_snapshots() {
        let mut store = LocalStore::in_memory();
        let feed = store.subscribe().unwrap();
        assert_eq!(feed.latest(), Some(Map::new()));
        let a = store.create(fields(json!({ "name": "A" }))).unwrap();
        let b = store.create(fields(json!({ "name": "B" }))).unwrap();
        let latest = feed.latest().unwrap();
        let ids: Vec<&String> = latest.keys().collect();
        assert_eq!(ids, vec![&a, &b]);
    }

    #[test]
    fn removal_keeps_remaining_order() {
        let mut store = LocalStore::in_memory();
        let a = store.create(fields(json!({ "name": "A" }))).unwrap();
        let b = store.create(fields(json!({ "name": "B" }))).unwrap();
        let c = store.create(fields(json!({ "name": "C" }))).unwrap();
        store.remove(&b).unwrap();
        let ids: Vec<&String> = store.snapshot().keys().collect();
        assert_eq!(ids, vec![&a, &c]);
    }

    #[test]
    fn relative_paths_stay_inside_root() {
        assert!(sanitize_relative_path("../etc/passwd").is_err());
        assert!(sanitize_relative_path("/abs.json").is_err());
        assert!(sanitize_relative_path("").is_err());
        assert_eq!(
            sanitize_relative_path("./data/inventory.json").unwrap(),
            PathBuf::from("data/inventory.json")
        );
    }
}
