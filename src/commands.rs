use serde_json::Value;
use tauri::State;

use crate::config::{presets, CustomServerInput, ServerConfig, ServerKind};
use crate::error::FhirError;
use crate::node::DisplayNode;
use crate::state::AppState;
use crate::types::{Bundle, ResourceType, SearchParams};

#[tauri::command]
pub fn list_servers() -> Vec<ServerConfig> {
    presets()
}

#[tauri::command]
pub fn current_server(state: State<'_, AppState>) -> ServerConfig {
    state.client.server_config()
}

#[tauri::command]
pub fn select_server(kind: ServerKind, state: State<'_, AppState>) -> Result<ServerConfig, String> {
    if kind == ServerKind::Custom {
        return Err("Custom servers are set up with configure_server".into());
    }
    let config = ServerConfig::preset(kind);
    state.client.set_server(config.clone());
    Ok(config)
}

#[tauri::command]
pub fn configure_server(
    input: CustomServerInput,
    state: State<'_, AppState>,
) -> Result<ServerConfig, String> {
    let config = input
        .into_config(&state.client.server_config())
        .map_err(|e| e.to_string())?;
    state.client.set_server(config.clone());
    Ok(config)
}

#[tauri::command]
pub async fn test_connection(state: State<'_, AppState>) -> Result<bool, FhirError> {
    Ok(state.client.test_connection().await)
}

#[tauri::command]
pub async fn capability_statement(state: State<'_, AppState>) -> Result<Value, FhirError> {
    state.client.capability_statement().await
}

#[tauri::command]
pub async fn get_resource(
    resource_type: ResourceType,
    id: String,
    state: State<'_, AppState>,
) -> Result<Value, FhirError> {
    state.client.get_resource(resource_type, &id).await
}

#[tauri::command]
pub async fn get_resource_by_url(url: String, state: State<'_, AppState>) -> Result<Value, FhirError> {
    state.client.get_resource_by_url(&url).await
}

#[tauri::command]
pub async fn search_resources(
    resource_type: ResourceType,
    params: Option<SearchParams>,
    term: Option<String>,
    state: State<'_, AppState>,
) -> Result<Bundle, FhirError> {
    state
        .search(resource_type, params.unwrap_or_default(), term.as_deref())
        .await
}

#[tauri::command]
pub async fn create_resource(resource: Value, state: State<'_, AppState>) -> Result<Value, FhirError> {
    state.client.create_resource(&resource).await
}

#[tauri::command]
pub async fn update_resource(resource: Value, state: State<'_, AppState>) -> Result<Value, FhirError> {
    state.client.update_resource(&resource).await
}

#[tauri::command]
pub async fn delete_resource(
    resource_type: ResourceType,
    id: String,
    state: State<'_, AppState>,
) -> Result<(), FhirError> {
    state.client.delete_resource(resource_type, &id).await
}

#[tauri::command]
pub async fn execute_batch(bundle: Bundle, state: State<'_, AppState>) -> Result<Value, FhirError> {
    state.client.execute_batch(&bundle).await
}

// Display tree

#[tauri::command]
pub fn open_record(
    record: Value,
    default_expanded: Option<bool>,
    state: State<'_, AppState>,
) -> Option<DisplayNode> {
    state.open_record(record, default_expanded.unwrap_or(true))
}

#[tauri::command]
pub async fn view_resource(
    resource_type: ResourceType,
    id: String,
    state: State<'_, AppState>,
) -> Result<Option<DisplayNode>, FhirError> {
    state.view_resource(resource_type, &id).await
}

#[tauri::command]
pub async fn follow_reference(
    reference: String,
    state: State<'_, AppState>,
) -> Result<Option<DisplayNode>, FhirError> {
    state.follow_reference(&reference).await
}

#[tauri::command]
pub fn render_record(state: State<'_, AppState>) -> Option<DisplayNode> {
    state.render()
}

#[tauri::command]
pub fn toggle_node(path: String, state: State<'_, AppState>) -> Option<DisplayNode> {
    state.toggle(&path)
}

#[tauri::command]
pub fn close_record(state: State<'_, AppState>) {
    state.close_record();
}
