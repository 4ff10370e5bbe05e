// File: src/handlers/changes.rs
// Purpose: Change-feed endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use lectern::changes::{self, Feed, BOOK_ID_MISSING, SINCE_MISSING};
use lectern::{AppError, AppResult, SinceParams};
use serde::Deserialize;
use serde_json::Value;

use crate::extract::{ApiQuery, AuthUser};
use crate::state::AppState;

/// Query parameters for the change feeds
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    pub since: Option<String>,
    pub book_id: Option<String>,
}

impl ChangesQuery {
    fn since(&self) -> AppResult<DateTime<Utc>> {
        SinceParams {
            since: self.since.clone(),
        }
        .require(SINCE_MISSING)
    }

    fn book_id(&self) -> AppResult<i64> {
        let raw = self
            .book_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::bad_request(BOOK_ID_MISSING))?;
        raw.parse()
            .map_err(|_| AppError::bad_request("book_id must be an integer"))
    }
}

async fn read(state: &AppState, feed: Feed, since: DateTime<Utc>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(changes::changes_since(&state.stores.library, feed, since).await?))
}

/// Handler for GET /changes/general?since=
pub async fn general(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChangesQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let since = query.since()?;
    read(&state, Feed::General, since).await
}

/// Handler for GET /changes/book-tables?since=&book_id=
pub async fn book_tables(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChangesQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let since = query.since()?;
    let book_id = query.book_id()?;
    read(&state, Feed::Book { book_id }, since).await
}

/// Handler for GET /changes/user-tables?since=
pub async fn user_tables(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<ChangesQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let since = query.since()?;
    read(&state, Feed::User { user_id }, since).await
}

/// Handler for GET /changes/user-book-tables?since=&book_id=
pub async fn user_book_tables(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<ChangesQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let since = query.since()?;
    let book_id = query.book_id()?;
    read(&state, Feed::UserBook { user_id, book_id }, since).await
}
