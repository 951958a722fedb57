#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use inventory_tauri::export::{rows_to_csv, sanitize_export_filename};
use inventory_tauri::store::{sanitize_relative_path, write_text_file};
use inventory_tauri::{
    CategorySummary, InventoryQuery, InventorySettings, InventorySync, InventoryView,
    LocalStore, RecordFields,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tauri::{AppHandle, Emitter, Manager, State};
use tracing_subscriber::EnvFilter;

const CHANGED_EVENT: &str = "inventory://changed";
const STORAGE_FOLDER: &str = "Inventory";

struct AppState {
    sync: Mutex<InventorySync<LocalStore>>,
}

#[derive(Deserialize)]
struct InventoryViewRequest {
    #[serde(default)]
    query: InventoryQuery,
}

#[derive(Deserialize)]
struct InventoryFieldsRequest {
    fields: RecordFields,
}

#[derive(Deserialize)]
struct InventoryEditRequest {
    id: String,
    fields: RecordFields,
}

#[derive(Deserialize)]
struct InventoryIdRequest {
    id: String,
}

#[derive(Deserialize)]
struct InventoryExportRequest {
    #[serde(default)]
    query: InventoryQuery,
    filename: String,
}

#[derive(Serialize)]
struct SaveCsvResult {
    ok: bool,
    canceled: bool,
    filename: String,
    path: Option<String>,
}

#[tauri::command]
fn app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
fn inventory_view(
    state: State<'_, AppState>,
    payload: InventoryViewRequest,
) -> Result<InventoryView, String> {
    let mut sync = lock_sync(&state)?;
    sync.pump();
    Ok(sync.view(&payload.query))
}

#[tauri::command]
fn inventory_category_report(state: State<'_, AppState>) -> Result<Vec<CategorySummary>, String> {
    let sync = lock_sync(&state)?;
    Ok(sync.category_report())
}

#[tauri::command]
fn inventory_add(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryFieldsRequest,
) -> Result<String, String> {
    let mut sync = lock_sync(&state)?;
    let id = sync.add(payload.fields).map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(id)
}

#[tauri::command]
fn inventory_submit_request(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryFieldsRequest,
) -> Result<String, String> {
    let mut sync = lock_sync(&state)?;
    let id = sync
        .submit_request(payload.fields)
        .map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(id)
}

#[tauri::command]
fn inventory_edit(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryEditRequest,
) -> Result<bool, String> {
    let mut sync = lock_sync(&state)?;
    sync.edit(payload.id.as_str(), payload.fields)
        .map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(true)
}

#[tauri::command]
fn inventory_delete(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryIdRequest,
) -> Result<bool, String> {
    let mut sync = lock_sync(&state)?;
    sync.delete(payload.id.as_str())
        .map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(true)
}

#[tauri::command]
fn inventory_approve(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryIdRequest,
) -> Result<bool, String> {
    let mut sync = lock_sync(&state)?;
    sync.approve(payload.id.as_str())
        .map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(true)
}

#[tauri::command]
fn inventory_deny(
    app: AppHandle,
    state: State<'_, AppState>,
    payload: InventoryIdRequest,
) -> Result<bool, String> {
    let mut sync = lock_sync(&state)?;
    sync.deny(payload.id.as_str())
        .map_err(|err| err.to_string())?;
    notify_changed(&app, &sync);
    Ok(true)
}

#[tauri::command]
fn inventory_export_csv(
    state: State<'_, AppState>,
    payload: InventoryExportRequest,
) -> Result<SaveCsvResult, String> {
    let content = {
        let sync = lock_sync(&state)?;
        rows_to_csv(sync.view_model().project(&payload.query)).map_err(|err| err.to_string())?
    };
    let default_name = sanitize_export_filename(payload.filename.as_str());
    let path = rfd::FileDialog::new()
        .set_file_name(default_name.as_str())
        .save_file();

    let Some(path) = path else {
        return Ok(SaveCsvResult {
            ok: false,
            canceled: true,
            filename: default_name,
            path: None,
        });
    };

    write_text_file(path.as_path(), content.as_str()).map_err(|err| err.to_string())?;
    tracing::info!(path = %path.to_string_lossy(), "exported inventory csv");
    Ok(SaveCsvResult {
        ok: true,
        canceled: false,
        filename: default_name,
        path: Some(path.to_string_lossy().to_string()),
    })
}

fn lock_sync<'a>(
    state: &'a State<'_, AppState>,
) -> Result<MutexGuard<'a, InventorySync<LocalStore>>, String> {
    state
        .sync
        .lock()
        .map_err(|_| "Inventory state is unavailable.".to_string())
}

fn notify_changed(app: &AppHandle, sync: &InventorySync<LocalStore>) {
    let payload = json!({
        "revision": sync.view_model().revision(),
        "counters": sync.view_model().counters(),
    });
    if let Err(err) = app.emit(CHANGED_EVENT, payload) {
        tracing::warn!(error = %err, "failed to emit inventory change event");
    }
}

fn storage_file_path(app: &AppHandle, settings: &InventorySettings) -> Result<PathBuf, String> {
    let root = match settings.storage_dir.clone() {
        Some(dir) => dir,
        None => app
            .path()
            .app_data_dir()
            .map_err(|err| err.to_string())?
            .join(STORAGE_FOLDER),
    };
    let rel = sanitize_relative_path(settings.data_file.as_str()).map_err(|err| err.to_string())?;
    Ok(root.join(rel))
}

fn init_tracing(filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

fn main() {
    let (settings, config_error) = match InventorySettings::load() {
        Ok(settings) => (settings, None),
        Err(err) => (InventorySettings::default(), Some(err)),
    };
    init_tracing(settings.log_filter.as_str());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "invalid configuration, using defaults");
    }

    tauri::Builder::default()
        .setup(move |app| {
            let path = storage_file_path(app.handle(), &settings)?;
            let store = LocalStore::open(path)?;
            let sync = InventorySync::new(store, &settings)?;
            tracing::info!(items = sync.view_model().len(), "inventory ready");
            app.manage(AppState {
                sync: Mutex::new(sync),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            app_version,
            inventory_view,
            inventory_category_report,
            inventory_add,
            inventory_submit_request,
            inventory_edit,
            inventory_delete,
            inventory_approve,
            inventory_deny,
            inventory_export_csv
        ])
        .run(tauri::generate_context!())
        .expect("failed to run Inventory Tracker");
}
