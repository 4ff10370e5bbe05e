// File: src/lib.rs
// Purpose: Core library of the lectern reading platform backend

pub mod auth;
pub mod catalog;
pub mod changes;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod request;

pub use config::Config;
pub use db::Stores;
pub use entity::EntityConfig;
pub use error::{AppError, AppResult, ErrorDetail};
pub use request::{Page, PageParams, SinceParams};
