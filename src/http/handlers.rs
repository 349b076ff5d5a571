//! Request handlers: decode, call the registry, encode.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::http::request::{ApiJson, ApiPath, ApiQuery};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::model::{Config, ConfigGroup, GroupEntry, Versioned};

/// `?labels=k:v;k:v` query string. Absent means no filter.
#[derive(Debug, Default, Deserialize)]
pub struct LabelParams {
    #[serde(default)]
    pub labels: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupVersions {
    pub name: String,
    pub versions: Vec<u64>,
}

type ApiResult<T> = Result<T, ApiError>;

fn require_identity(name: &str, version: u64) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    if version == 0 {
        return Err(ApiError::BadRequest("version is required".into()));
    }
    Ok(())
}

fn sorted<T: Versioned>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(|a, b| (a.name(), a.version()).cmp(&(b.name(), b.version())));
    items
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// GET /configs
pub async fn list_configs(State(state): State<AppState>) -> Json<Vec<Config>> {
    Json(sorted(state.registry.configs.get_all()))
}

// POST /configs
pub async fn create_config(
    State(state): State<AppState>,
    ApiJson(config): ApiJson<Config>,
) -> ApiResult<(StatusCode, Json<Config>)> {
    require_identity(&config.name, config.version)?;
    state.registry.configs.add(config.clone())?;
    tracing::info!(name = %config.name, version = config.version, "Config created");
    Ok((StatusCode::CREATED, Json(config)))
}

// GET /configs/{name}/{version}
pub async fn get_config(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
) -> ApiResult<Json<Config>> {
    Ok(Json(state.registry.configs.get(&name, version)?))
}

// DELETE /configs/{name}/{version}
pub async fn delete_config(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
) -> ApiResult<StatusCode> {
    state.registry.configs.delete(&name, version)?;
    tracing::info!(name = %name, version, "Config deleted");
    Ok(StatusCode::NO_CONTENT)
}

// GET /groups
pub async fn list_groups(State(state): State<AppState>) -> Json<Vec<ConfigGroup>> {
    Json(sorted(state.registry.groups.get_all()))
}

// POST /groups
pub async fn create_group(
    State(state): State<AppState>,
    ApiJson(group): ApiJson<ConfigGroup>,
) -> ApiResult<(StatusCode, Json<ConfigGroup>)> {
    require_identity(&group.name, group.version)?;
    state.registry.groups.add(group.clone())?;
    tracing::info!(
        name = %group.name,
        version = group.version,
        entries = group.entry_count(),
        "Config group created"
    );
    Ok((StatusCode::CREATED, Json(group)))
}

// GET /groups/{name}
pub async fn list_group_versions(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Json<GroupVersions> {
    let versions = state.registry.groups.versions(&name);
    Json(GroupVersions { name, versions })
}

// GET /groups/{name}/{version}
pub async fn get_group(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
) -> ApiResult<Json<ConfigGroup>> {
    Ok(Json(state.registry.groups.get(&name, version)?))
}

// DELETE /groups/{name}/{version}
pub async fn delete_group(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
) -> ApiResult<StatusCode> {
    state.registry.groups.delete(&name, version)?;
    tracing::info!(name = %name, version, "Config group deleted");
    Ok(StatusCode::NO_CONTENT)
}

// POST /groups/{name}/{version}/configs
pub async fn add_group_entry(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
    ApiJson(entry): ApiJson<GroupEntry>,
) -> ApiResult<(StatusCode, Json<ConfigGroup>)> {
    if entry.name.trim().is_empty() {
        return Err(ApiError::BadRequest("config name is required".into()));
    }
    let group = state.registry.engine.create_with_entry(&name, version, entry)?;
    Ok((StatusCode::CREATED, Json(group)))
}

// GET /groups/{name}/{version}/configs?labels=k1:v1;k2:v2
pub async fn filter_group_entries(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
    ApiQuery(params): ApiQuery<LabelParams>,
) -> ApiResult<Json<Vec<GroupEntry>>> {
    let entries = state
        .registry
        .engine
        .filter_by_labels(&name, version, &params.labels)?;
    Ok(Json(entries))
}

// DELETE /groups/{name}/{version}/configs?labels=k1:v1;k2:v2
pub async fn remove_group_entries_by_labels(
    State(state): State<AppState>,
    ApiPath((name, version)): ApiPath<(String, u64)>,
    ApiQuery(params): ApiQuery<LabelParams>,
) -> ApiResult<(StatusCode, Json<ConfigGroup>)> {
    let group = state
        .registry
        .engine
        .create_without_entries_by_labels(&name, version, &params.labels)?;
    Ok((StatusCode::CREATED, Json(group)))
}

// GET /groups/{name}/{version}/configs/{config}
pub async fn get_group_entry(
    State(state): State<AppState>,
    ApiPath((name, version, entry)): ApiPath<(String, u64, String)>,
) -> ApiResult<Json<GroupEntry>> {
    Ok(Json(state.registry.engine.entry(&name, version, &entry)?))
}

// DELETE /groups/{name}/{version}/configs/{config}
pub async fn remove_group_entry(
    State(state): State<AppState>,
    ApiPath((name, version, entry)): ApiPath<(String, u64, String)>,
) -> ApiResult<(StatusCode, Json<ConfigGroup>)> {
    let group = state
        .registry
        .engine
        .create_without_entry(&name, version, &entry)?;
    Ok((StatusCode::CREATED, Json(group)))
}
