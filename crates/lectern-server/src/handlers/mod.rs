// File: src/handlers/mod.rs
// Purpose: HTTP handlers, one module per resource family

pub mod annotations;
pub mod auth;
pub mod books;
pub mod changes;
pub mod entities;

use axum::Json;
use lectern::AppError;
use serde_json::{json, Value};

/// `{"message": ...}` body used by acknowledgement responses
pub fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

pub async fn welcome() -> &'static str {
    "Welcome"
}

pub async fn route_not_found() -> AppError {
    AppError::not_found("Route not found")
}
