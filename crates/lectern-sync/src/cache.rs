// File: src/cache.rs
// Purpose: Cache validation: tell a client which of its cached entities changed or disappeared

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use lectern::entity::{self, EntityConfig};
use lectern::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

pub const VALIDATION_FAILED: &str = "Cache validation failed";

/// Body of `POST /{entity}/validate-cache`
#[derive(Debug, Clone, Deserialize)]
pub struct CacheRequest {
    pub ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheValidation {
    /// Full records modified after the watermark
    pub updated_items: Vec<Value>,
    /// Candidate ids with no live row
    pub deleted_items: Vec<i64>,
}

fn row_id(row: &Value, id_column: &str) -> Option<i64> {
    match row.get(id_column)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Combine the two query results.
///
/// `updated_items` keeps only modified rows whose id is a candidate;
/// `deleted_items` lists each candidate absent from `live_ids` once, in
/// candidate order.
pub fn reconcile(candidates: &[i64], modified: Vec<Value>, id_column: &str, live_ids: &[i64]) -> CacheValidation {
    let wanted: HashSet<i64> = candidates.iter().copied().collect();
    let live: HashSet<i64> = live_ids.iter().copied().collect();

    let updated_items = modified
        .into_iter()
        .filter(|row| row_id(row, id_column).is_some_and(|id| wanted.contains(&id)))
        .collect();

    let mut seen = HashSet::new();
    let deleted_items = candidates
        .iter()
        .copied()
        .filter(|id| !live.contains(id) && seen.insert(*id))
        .collect();

    CacheValidation {
        updated_items,
        deleted_items,
    }
}

/// Run the query pair for `cfg` and reconcile the results.
///
/// Any data-access fault fails the whole call; no partial result is returned.
pub async fn validate_cache(
    pool: &PgPool,
    cfg: &EntityConfig,
    candidates: &[i64],
    since: DateTime<Utc>,
) -> AppResult<CacheValidation> {
    if candidates.is_empty() {
        return Ok(CacheValidation::default());
    }

    let modified = entity::modified_since(pool, cfg, since, candidates)
        .await
        .map_err(AppError::from_db(VALIDATION_FAILED))?;
    let live = entity::live_ids(pool, cfg, candidates)
        .await
        .map_err(AppError::from_db(VALIDATION_FAILED))?;

    let result = reconcile(candidates, modified, cfg.id_column, &live);
    tracing::debug!(
        entity = cfg.name,
        candidates = candidates.len(),
        updated = result.updated_items.len(),
        deleted = result.deleted_items.len(),
        "cache validated"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_reconcile_scenario() {
        // rows 2 and 3 changed after the watermark, row 4 is gone
        let modified = vec![json!({"id": 2, "name": "b"}), json!({"id": 3, "name": "c"})];
        let result = reconcile(&[1, 2, 3, 4], modified, "id", &[1, 2, 3]);
        assert_eq!(
            result,
            CacheValidation {
                updated_items: vec![json!({"id": 2, "name": "b"}), json!({"id": 3, "name": "c"})],
                deleted_items: vec![4],
            }
        );
    }

    #[test]
    fn test_reconcile_ignores_non_candidates() {
        let modified = vec![json!({"id": 9}), json!({"id": 1})];
        let result = reconcile(&[1], modified, "id", &[1]);
        assert_eq!(result.updated_items, vec![json!({"id": 1})]);
        assert!(result.deleted_items.is_empty());
    }

    #[test]
    fn test_reconcile_deleted_is_a_subset_of_candidates_disjoint_from_live() {
        let candidates = [5, 7, 5, 11, 13];
        let live = [7, 13, 99];
        let result = reconcile(&candidates, vec![], "id", &live);
        assert_eq!(result.deleted_items, vec![5, 11]);
        assert!(result.deleted_items.iter().all(|id| candidates.contains(id)));
        assert!(result.deleted_items.iter().all(|id| !live.contains(id)));
    }

    #[test]
    fn test_reconcile_empty_candidates() {
        let result = reconcile(&[], vec![json!({"id": 1})], "id", &[]);
        assert_eq!(result, CacheValidation::default());
    }

    #[test]
    fn test_reconcile_reads_the_configured_id_column() {
        let modified = vec![json!({"book_id": "8"})];
        let result = reconcile(&[8], modified, "book_id", &[8]);
        assert_eq!(result.updated_items.len(), 1);
    }

    #[test]
    fn test_response_shape_is_camel_case() {
        let json = serde_json::to_value(CacheValidation::default()).unwrap();
        assert_eq!(json, json!({"updatedItems": [], "deletedItems": []}));
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_the_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let since = Utc::now();
        let result = validate_cache(&pool, &entity::BOOK, &[], since).await.unwrap();
        assert_eq!(result, CacheValidation::default());
    }
}
