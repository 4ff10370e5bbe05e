// File: src/handlers/books.rs
// Purpose: Book search, book sub-resources, content upload and reading progress

use axum::{extract::State, Json};
use lectern::catalog::{self, BookFilters, BookSearch, BookUpload, Rating};
use lectern::entity::{self, EntityConfig, AUTHOR, BOOK, CATEGORY, TAG, TRANSLATOR};
use lectern::{AppError, AppResult, PageParams};
use serde::Deserialize;
use serde_json::Value;

use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody};
use crate::handlers::message;
use crate::state::AppState;

/// Body of POST /books/:id/reading-progress
#[derive(Debug, Deserialize)]
pub struct ProgressBody {
    pub reading_progress: Option<Value>,
}

/// Handler for POST /books?limit=&offset=
pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageParams>,
    JsonBody(body): JsonBody<BookSearch>,
) -> AppResult<Json<Vec<Value>>> {
    let page = query.require()?;
    let mode = body.mode()?;
    Ok(Json(catalog::search_books(&state.stores.catalog, mode, page).await?))
}

/// Handler for POST /books/filters
pub async fn filter(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BookFilters>,
) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(catalog::filter_books(&state.stores.catalog, &body).await?))
}

/// Handler for GET /books/:id
pub async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    entity::get_by_id(&state.stores.catalog, &BOOK, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(BOOK.not_found()))
}

async fn related(state: &AppState, cfg: &EntityConfig, book_id: i64) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(entity::related_to_book(&state.stores.catalog, cfg, book_id).await?))
}

pub async fn categories(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    related(&state, &CATEGORY, id).await
}

pub async fn tags(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    related(&state, &TAG, id).await
}

pub async fn authors(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    related(&state, &AUTHOR, id).await
}

pub async fn translators(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    related(&state, &TRANSLATOR, id).await
}

pub async fn reviewers(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(catalog::book_reviews(&state.stores.catalog, id).await?))
}

pub async fn rating(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Rating>> {
    Ok(Json(catalog::book_rating(&state.stores.catalog, id).await?))
}

pub async fn metadata(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Value>> {
    Ok(Json(catalog::book_metadata(&state.stores.library, id).await?))
}

/// Handler for GET /books/:id/tokens/:sequence
pub async fn token(
    State(state): State<AppState>,
    ApiPath((id, sequence)): ApiPath<(i64, i32)>,
) -> AppResult<Json<Value>> {
    Ok(Json(catalog::book_token(&state.stores.library, id, sequence).await?))
}

/// Handler for GET /books/:id/download
pub async fn download(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(catalog::book_tokens(&state.stores.library, id).await?))
}

/// Handler for POST /books/:id
pub async fn upload(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    JsonBody(body): JsonBody<BookUpload>,
) -> AppResult<Json<Value>> {
    let tokens = catalog::upload_book(&state.stores.library, id, body).await?;
    tracing::info!(book_id = id, tokens, "book uploaded");
    Ok(message("Book uploaded successfully"))
}

/// Handler for POST /books/:id/reading-progress
pub async fn reading_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
    JsonBody(body): JsonBody<ProgressBody>,
) -> AppResult<Json<Value>> {
    let progress = body
        .reading_progress
        .filter(|p| !p.is_null())
        .ok_or_else(|| AppError::bad_request("Book ID and reading_progress are required"))?;

    let saved = catalog::save_reading_progress(&state.stores.library, user_id, id, progress).await?;
    if !saved {
        return Err(AppError::not_found("Book not found or reading progress not updated"));
    }
    Ok(message("Reading progress updated successfully"))
}
