// File: src/handlers/entities.rs
// Purpose: Handlers shared by every catalog entity; the entity comes from a router-level Extension

use axum::{extract::State, Extension, Json};
use lectern::entity::{self, EntityConfig};
use lectern::request::SINCE_REQUIRED;
use lectern::{AppError, AppResult, PageParams, SinceParams};
use lectern_sync::cache::{self, CacheRequest, CacheValidation};
use serde_json::Value;

use crate::extract::{ApiPath, ApiQuery, JsonBody};
use crate::state::AppState;

/// Handler for POST /{entity}/validate-cache
pub async fn validate_cache(
    State(state): State<AppState>,
    Extension(cfg): Extension<&'static EntityConfig>,
    ApiQuery(query): ApiQuery<SinceParams>,
    JsonBody(body): JsonBody<CacheRequest>,
) -> AppResult<Json<CacheValidation>> {
    let since = query.require(SINCE_REQUIRED)?;
    let ids = body.ids.ok_or_else(|| AppError::bad_request(cfg.ids_required()))?;

    let result = cache::validate_cache(&state.stores.catalog, cfg, &ids, since).await?;
    Ok(Json(result))
}

/// Handler for GET /{entity}?limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Extension(cfg): Extension<&'static EntityConfig>,
    ApiQuery(query): ApiQuery<PageParams>,
) -> AppResult<Json<Vec<Value>>> {
    let page = query.require()?;
    Ok(Json(entity::list(&state.stores.catalog, cfg, page).await?))
}

/// Handler for GET /subscriptions, which is not paginated
pub async fn list_all(
    State(state): State<AppState>,
    Extension(cfg): Extension<&'static EntityConfig>,
) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(entity::list_all(&state.stores.catalog, cfg).await?))
}

/// Handler for GET /{entity}/:id
pub async fn get_one(
    State(state): State<AppState>,
    Extension(cfg): Extension<&'static EntityConfig>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    entity::get_by_id(&state.stores.catalog, cfg, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(cfg.not_found()))
}

/// Handler for GET /{entity}/:id/books?limit=&offset=
pub async fn books(
    State(state): State<AppState>,
    Extension(cfg): Extension<&'static EntityConfig>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageParams>,
) -> AppResult<Json<Vec<Value>>> {
    let page = query.require()?;
    Ok(Json(entity::books_for(&state.stores.catalog, cfg, id, page).await?))
}
