// File: src/db.rs
// Purpose: The two PostgreSQL store handles and the JSON row helpers shared by all queries
//
// Architecture: pools are built once at startup, passed explicitly through
// application state, and closed at shutdown.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Executor;

use crate::config::DatabaseConfig;

/// Schema of the catalog store (books, authors, users...)
pub const CATALOG_SCHEMA: &str = include_str!("../schema/catalog.sql");

/// Schema of the library store (annotations, tokens, OTP codes...)
pub const LIBRARY_SCHEMA: &str = include_str!("../schema/library.sql");

// ============================================================================
// STORE HANDLES
// ============================================================================

/// Handles to both backing stores.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Books, catalog entities, reviews, confirmed users
    pub catalog: PgPool,
    /// Annotations, tokens, metadata, progress, OTP codes, change logs
    pub library: PgPool,
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(Some(config.idle_timeout()))
}

impl Stores {
    /// Connect both pools eagerly, failing fast on a bad URL or unreachable server
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let catalog = pool_options(config)
            .connect(&config.catalog_url)
            .await
            .context("Failed to connect to the catalog database")?;
        let library = pool_options(config)
            .connect(&config.library_url)
            .await
            .context("Failed to connect to the library database")?;

        tracing::info!(
            max_connections = config.max_connections,
            "connected to catalog and library stores"
        );
        Ok(Self { catalog, library })
    }

    /// Pools that open connections on first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let catalog = pool_options(config)
            .connect_lazy(&config.catalog_url)
            .context("Invalid catalog database URL")?;
        let library = pool_options(config)
            .connect_lazy(&config.library_url)
            .context("Invalid library database URL")?;
        Ok(Self { catalog, library })
    }

    /// Apply the bundled schemas to both stores
    pub async fn bootstrap(&self) -> Result<()> {
        bootstrap_schema(&self.catalog, CATALOG_SCHEMA)
            .await
            .context("Failed to apply catalog schema")?;
        bootstrap_schema(&self.library, LIBRARY_SCHEMA)
            .await
            .context("Failed to apply library schema")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.catalog.close().await;
        self.library.close().await;
        tracing::info!("database pools closed");
    }
}

/// Run a multi-statement schema script
pub async fn bootstrap_schema(pool: &PgPool, sql: &str) -> Result<(), sqlx::Error> {
    pool.execute(sql).await?;
    Ok(())
}

// ============================================================================
// PURE FUNCTIONS - query text
// ============================================================================

/// Wrap a row query so each row comes back as one JSON object
pub fn as_json_rows(inner: &str) -> String {
    format!("SELECT row_to_json(t) FROM ({inner}) t")
}

/// Predicate matching rows whose soft-delete flag is not set
pub fn live_predicate(column: &str) -> String {
    format!("NOT COALESCE({column}, FALSE)")
}

/// Placeholder tuples for a multi-row VALUES list, numbered from `first`.
///
/// `multi_row_values(2, 3, 1)` gives `($1, $2, $3), ($4, $5, $6)`.
pub fn multi_row_values(rows: usize, columns: usize, first: usize) -> String {
    (0..rows)
        .map(|row| {
            let params: Vec<String> = (0..columns)
                .map(|col| format!("${}", first + row * columns + col))
                .collect();
            format!("({})", params.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters and wrap the term for a substring match
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Unwrap `row_to_json` results
pub fn unwrap_rows(rows: Vec<Json<Value>>) -> Vec<Value> {
    rows.into_iter().map(|Json(value)| value).collect()
}
