// File: src/handlers/annotations.rs
// Purpose: HTTP API endpoints for annotation reads and sync

use axum::{extract::State, http::StatusCode, Extension, Json};
use lectern::request::SINCE_REQUIRED;
use lectern::{AppResult, SinceParams};
use lectern_sync::annotation::{self, AnnotationKind, SyncRequest, SyncResult};
use serde::Serialize;
use serde_json::Value;

use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody};
use crate::state::AppState;

/// Response for GET /books/:id/annotations
#[derive(Debug, Serialize)]
pub struct AnnotationsResponse {
    pub notes: Vec<Value>,
    pub highlights: Vec<Value>,
    pub bookmarks: Vec<Value>,
}

/// Handler for GET /books/:id/annotations?since=
///
/// Every kind changed after the watermark, deleted items included.
pub async fn all(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(book_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<SinceParams>,
) -> AppResult<Json<AnnotationsResponse>> {
    let since = query.require(SINCE_REQUIRED)?;
    let pool = &state.stores.library;

    let notes = annotation::changed_since(pool, AnnotationKind::Note, user_id, book_id, since).await?;
    let highlights =
        annotation::changed_since(pool, AnnotationKind::Highlight, user_id, book_id, since).await?;
    let bookmarks =
        annotation::changed_since(pool, AnnotationKind::Bookmark, user_id, book_id, since).await?;

    Ok(Json(AnnotationsResponse {
        notes,
        highlights,
        bookmarks,
    }))
}

/// Handler for GET /books/:id/annotations/{highlights|bookmarks|notes}?since=
pub async fn of_kind(
    State(state): State<AppState>,
    Extension(kind): Extension<AnnotationKind>,
    AuthUser(user_id): AuthUser,
    ApiPath(book_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<SinceParams>,
) -> AppResult<Json<Vec<Value>>> {
    let since = query.require(SINCE_REQUIRED)?;
    let rows = annotation::changed_since(&state.stores.library, kind, user_id, book_id, since).await?;
    Ok(Json(rows))
}

/// Handler for POST /books/:id/annotations/sync-{highlights|bookmarks|notes}
pub async fn sync(
    State(state): State<AppState>,
    Extension(kind): Extension<AnnotationKind>,
    AuthUser(user_id): AuthUser,
    ApiPath(book_id): ApiPath<i64>,
    JsonBody(body): JsonBody<SyncRequest>,
) -> AppResult<(StatusCode, Json<SyncResult>)> {
    let items = body.into_items()?;
    let result = annotation::sync(&state.stores.library, kind, user_id, book_id, items).await?;
    Ok((StatusCode::CREATED, Json(result)))
}
