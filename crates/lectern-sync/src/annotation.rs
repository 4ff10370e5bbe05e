// File: src/annotation.rs
// Purpose: Annotation sync: reconcile client highlights, bookmarks and notes with the library store
//
// Architecture: classification and statement text are pure; `sync` applies the
// three buckets in order new -> updated -> deleted, each as one statement.
// The buckets are not wrapped in a transaction, so a failure in a later bucket
// leaves earlier buckets committed.

use chrono::{DateTime, Utc};
use lectern::db::unwrap_rows;
use lectern::error::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::statements;

pub const ITEMS_REQUIRED: &str = "items are required";

// ============================================================================
// KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Bookmark,
    Note,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [Self::Highlight, Self::Bookmark, Self::Note];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Highlight => "highlight",
            Self::Bookmark => "bookmark",
            Self::Note => "note",
        }
    }

    /// The single field a sync may change on an existing item
    pub fn content_column(&self) -> &'static str {
        match self {
            Self::Highlight => "text",
            Self::Bookmark => "title",
            Self::Note => "content",
        }
    }

    /// Columns written when an item is created, in bind order
    pub fn insert_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Highlight => &[
                "annotation_id",
                "start_index",
                "end_index",
                "text",
                "page_number",
                "chapter_number",
                "color",
            ],
            Self::Bookmark => &[
                "annotation_id",
                "start_index",
                "end_index",
                "title",
                "page_number",
                "chapter_number",
            ],
            Self::Note => &[
                "annotation_id",
                "start_index",
                "end_index",
                "content",
                "page_number",
                "chapter_number",
            ],
        }
    }

    /// Plural used in routes and response keys
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Highlight => "highlights",
            Self::Bookmark => "bookmarks",
            Self::Note => "notes",
        }
    }
}

// ============================================================================
// ITEMS
// ============================================================================

/// One client-submitted annotation item
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemPatch {
    /// Client-local id, echoed back untouched for new items
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "serverId", deserialize_with = "server_id")]
    pub server_id: Option<i64>,
    #[serde(default, deserialize_with = "literal_true")]
    pub is_deleted: bool,
    pub start_index: Option<i32>,
    pub end_index: Option<i32>,
    pub page_number: Option<i32>,
    pub chapter_number: Option<i32>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
}

/// Accepts a number or a numeric string; null and "" mean absent
fn server_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("serverId must be an integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom("serverId must be an integer")),
        Some(_) => Err(D::Error::custom("serverId must be an integer")),
    }
}

/// Only the JSON literal `true` marks an item as deleted
fn literal_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Option::<Value>::deserialize(deserializer)?, Some(Value::Bool(true))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    New,
    Updated,
    Deleted,
}

impl ItemPatch {
    /// Deletion wins over a server id; a server id makes it an update
    pub fn bucket(&self) -> Bucket {
        if self.is_deleted {
            Bucket::Deleted
        } else if self.server_id.is_some() {
            Bucket::Updated
        } else {
            Bucket::New
        }
    }

    pub fn content(&self, kind: AnnotationKind) -> Option<&str> {
        match kind {
            AnnotationKind::Highlight => self.text.as_deref(),
            AnnotationKind::Bookmark => self.title.as_deref(),
            AnnotationKind::Note => self.content.as_deref(),
        }
    }
}

/// A bind value for one insert column
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Id(i64),
    Int(Option<i32>),
    Text(Option<String>),
}

impl ItemPatch {
    pub fn cell(&self, column: &str, grouping_id: i64) -> Cell {
        match column {
            "annotation_id" => Cell::Id(grouping_id),
            "start_index" => Cell::Int(self.start_index),
            "end_index" => Cell::Int(self.end_index),
            "page_number" => Cell::Int(self.page_number),
            "chapter_number" => Cell::Int(self.chapter_number),
            "text" => Cell::Text(self.text.clone()),
            "title" => Cell::Text(self.title.clone()),
            "content" => Cell::Text(self.content.clone()),
            "color" => Cell::Text(self.color.clone()),
            _ => Cell::Text(None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub new: Vec<ItemPatch>,
    pub updated: Vec<ItemPatch>,
    pub deleted: Vec<ItemPatch>,
}

/// Split a batch into exactly one bucket per item, keeping submission order
pub fn classify(items: Vec<ItemPatch>) -> Classified {
    let mut out = Classified::default();
    for item in items {
        match item.bucket() {
            Bucket::New => out.new.push(item),
            Bucket::Updated => out.updated.push(item),
            Bucket::Deleted => out.deleted.push(item),
        }
    }
    out
}

/// Body of `POST /books/:id/annotations/sync-*`; items stay raw until checked
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub items: Option<Value>,
}

impl SyncRequest {
    pub fn into_items(self) -> AppResult<Vec<ItemPatch>> {
        parse_items(self.items)
    }
}

/// Parse the `items` field of a sync body
pub fn parse_items(items: Option<Value>) -> AppResult<Vec<ItemPatch>> {
    match items {
        Some(value @ Value::Array(_)) => serde_json::from_value(value)
            .map_err(|e| AppError::bad_request(format!("Invalid items: {e}"))),
        _ => Err(AppError::bad_request(ITEMS_REQUIRED)),
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdPair {
    pub local_id: Value,
    pub server_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub ids: Vec<IdPair>,
    pub is_updated: bool,
    pub is_deleted: bool,
}

/// Pair created items with their new ids, which must match one to one
pub fn pair_ids(new_items: &[ItemPatch], mut server_ids: Vec<i64>) -> AppResult<Vec<IdPair>> {
    if server_ids.len() != new_items.len() {
        return Err(AppError::internal(
            "Annotation sync failed",
            format!(
                "inserted {} rows for {} new items",
                server_ids.len(),
                new_items.len()
            ),
        ));
    }
    // ids come from a sequence, so ascending order is insertion order
    server_ids.sort_unstable();
    Ok(new_items
        .iter()
        .zip(server_ids)
        .map(|(item, server_id)| IdPair {
            local_id: item.id.clone().unwrap_or(Value::Null),
            server_id,
        })
        .collect())
}

// ============================================================================
// I/O FUNCTIONS
// ============================================================================

/// Id of the (user, book) grouping row, creating it when absent
pub async fn get_or_create_grouping(pool: &PgPool, user_id: i64, book_id: i64) -> AppResult<i64> {
    let created = sqlx::query_scalar::<_, i64>(&statements::grouping_upsert())
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = created {
        return Ok(id);
    }

    let existing = sqlx::query_scalar::<_, i64>(&statements::grouping_lookup())
        .bind(user_id)
        .bind(book_id)
        .fetch_one(pool)
        .await?;
    Ok(existing)
}

async fn insert_items(
    pool: &PgPool,
    kind: AnnotationKind,
    grouping_id: i64,
    items: &[ItemPatch],
) -> AppResult<Vec<IdPair>> {
    let columns = kind.insert_columns();
    let sql = statements::batched_insert(kind.table(), columns, items.len());

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for item in items {
        for column in columns {
            query = match item.cell(column, grouping_id) {
                Cell::Id(v) => query.bind(v),
                Cell::Int(v) => query.bind(v),
                Cell::Text(v) => query.bind(v),
            };
        }
    }
    let server_ids = query.fetch_all(pool).await?;
    pair_ids(items, server_ids)
}

async fn update_items(
    pool: &PgPool,
    kind: AnnotationKind,
    user_id: i64,
    book_id: i64,
    items: &[ItemPatch],
) -> AppResult<bool> {
    let (ids, values): (Vec<i64>, Vec<String>) = items
        .iter()
        .filter_map(|item| Some((item.server_id?, item.content(kind)?.to_string())))
        .unzip();
    if ids.is_empty() {
        return Ok(false);
    }

    let result = sqlx::query(&statements::batched_update(kind.table(), kind.content_column()))
        .bind(ids)
        .bind(values)
        .bind(user_id)
        .bind(book_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn delete_items(
    pool: &PgPool,
    kind: AnnotationKind,
    user_id: i64,
    book_id: i64,
    items: &[ItemPatch],
) -> AppResult<bool> {
    // never persisted, nothing to flag
    let ids: Vec<i64> = items.iter().filter_map(|item| item.server_id).collect();
    if ids.is_empty() {
        return Ok(false);
    }

    let result = sqlx::query(&statements::batched_soft_delete(kind.table()))
        .bind(ids)
        .bind(user_id)
        .bind(book_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Apply a batch of client items for one (user, book)
pub async fn sync(
    pool: &PgPool,
    kind: AnnotationKind,
    user_id: i64,
    book_id: i64,
    items: Vec<ItemPatch>,
) -> AppResult<SyncResult> {
    let batch = classify(items);
    let mut result = SyncResult::default();

    if !batch.new.is_empty() {
        let grouping_id = get_or_create_grouping(pool, user_id, book_id).await?;
        result.ids = insert_items(pool, kind, grouping_id, &batch.new).await?;
    }
    if !batch.updated.is_empty() {
        result.is_updated = update_items(pool, kind, user_id, book_id, &batch.updated).await?;
    }
    if !batch.deleted.is_empty() {
        result.is_deleted = delete_items(pool, kind, user_id, book_id, &batch.deleted).await?;
    }

    tracing::debug!(
        kind = kind.table(),
        user_id,
        book_id,
        created = result.ids.len(),
        updated = batch.updated.len(),
        deleted = batch.deleted.len(),
        "annotations synced"
    );
    Ok(result)
}

/// Items of the caller's grouping changed after `since`, soft-deleted ones included
pub async fn changed_since(
    pool: &PgPool,
    kind: AnnotationKind,
    user_id: i64,
    book_id: i64,
    since: DateTime<Utc>,
) -> AppResult<Vec<Value>> {
    let rows = sqlx::query_scalar::<_, Json<Value>>(&statements::changed_since(kind.table()))
        .bind(user_id)
        .bind(book_id)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn items(value: Value) -> Vec<ItemPatch> {
        parse_items(Some(value)).unwrap()
    }

    #[test]
    fn test_highlight_scenario_classification() {
        let batch = classify(items(json!([
            {"id": "local1", "start_index": 0, "end_index": 10, "text": "a", "is_deleted": false},
            {"serverId": "5", "text": "b", "is_deleted": false},
            {"serverId": "6", "is_deleted": true}
        ])));

        assert_eq!(batch.new.len(), 1);
        assert_eq!(batch.new[0].id, Some(json!("local1")));
        assert_eq!(batch.updated.len(), 1);
        assert_eq!(batch.updated[0].server_id, Some(5));
        assert_eq!(batch.updated[0].content(AnnotationKind::Highlight), Some("b"));
        assert_eq!(batch.deleted.len(), 1);
        assert_eq!(batch.deleted[0].server_id, Some(6));
    }

    #[rstest]
    #[case(json!({"is_deleted": true, "serverId": 3}), Bucket::Deleted)]
    #[case(json!({"is_deleted": true}), Bucket::Deleted)]
    #[case(json!({"is_deleted": false, "serverId": 3}), Bucket::Updated)]
    #[case(json!({"serverId": "12"}), Bucket::Updated)]
    #[case(json!({"serverId": ""}), Bucket::New)]
    #[case(json!({"serverId": null, "id": 4}), Bucket::New)]
    #[case(json!({"is_deleted": "true", "id": "x"}), Bucket::New)]
    #[case(json!({}), Bucket::New)]
    fn test_bucket(#[case] raw: Value, #[case] expected: Bucket) {
        let item: ItemPatch = serde_json::from_value(raw).unwrap();
        assert_eq!(item.bucket(), expected);
    }

    #[test]
    fn test_classification_is_exhaustive_and_exclusive() {
        let raw = json!([
            {"id": 1}, {"serverId": 2}, {"serverId": 3, "is_deleted": true},
            {"is_deleted": true}, {"id": 5, "serverId": ""}, {"serverId": 6, "is_deleted": false}
        ]);
        let total = raw.as_array().unwrap().len();
        let batch = classify(items(raw));
        assert_eq!(batch.new.len() + batch.updated.len() + batch.deleted.len(), total);
        assert_eq!(batch.new.len(), 2);
        assert_eq!(batch.updated.len(), 2);
        assert_eq!(batch.deleted.len(), 2);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(json!({"id": 1})))]
    #[case(Some(json!("items")))]
    fn test_items_must_be_an_array(#[case] raw: Option<Value>) {
        assert_eq!(parse_items(raw).unwrap_err().to_string(), ITEMS_REQUIRED);
    }

    #[test]
    fn test_non_numeric_server_id_is_a_bad_request() {
        let err = parse_items(Some(json!([{"serverId": "abc"}]))).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_pair_ids_keeps_submission_order() {
        let new = items(json!([{"id": "a"}, {"id": "b"}, {"id": 3}]));
        let pairs = pair_ids(&new, vec![42, 40, 41]).unwrap();
        let rendered = serde_json::to_value(&pairs).unwrap();
        assert_eq!(
            rendered,
            json!([
                {"localId": "a", "serverId": 40},
                {"localId": "b", "serverId": 41},
                {"localId": 3, "serverId": 42}
            ])
        );
    }

    #[test]
    fn test_pair_ids_count_mismatch_is_an_error() {
        let new = items(json!([{"id": "a"}, {"id": "b"}]));
        let err = pair_ids(&new, vec![1]).unwrap_err();
        assert_eq!(err.status().as_u16(), 500);
        assert!(err.detail().unwrap().contains("1 rows for 2"));
    }

    #[test]
    fn test_cells_follow_insert_columns() {
        let item: ItemPatch = serde_json::from_value(json!({
            "start_index": 1, "end_index": 9, "text": "quote", "page_number": 3,
            "chapter_number": 1, "color": "yellow"
        }))
        .unwrap();
        let cells: Vec<Cell> = AnnotationKind::Highlight
            .insert_columns()
            .iter()
            .map(|c| item.cell(c, 77))
            .collect();
        assert_eq!(
            cells,
            vec![
                Cell::Id(77),
                Cell::Int(Some(1)),
                Cell::Int(Some(9)),
                Cell::Text(Some("quote".into())),
                Cell::Int(Some(3)),
                Cell::Int(Some(1)),
                Cell::Text(Some("yellow".into())),
            ]
        );
    }

    #[rstest]
    #[case(AnnotationKind::Highlight, "highlight", "text", 7)]
    #[case(AnnotationKind::Bookmark, "bookmark", "title", 6)]
    #[case(AnnotationKind::Note, "note", "content", 6)]
    fn test_kind_tables(
        #[case] kind: AnnotationKind,
        #[case] table: &str,
        #[case] column: &str,
        #[case] insert_len: usize,
    ) {
        assert_eq!(kind.table(), table);
        assert_eq!(kind.content_column(), column);
        assert_eq!(kind.insert_columns().len(), insert_len);
        assert!(kind.insert_columns().contains(&column));
    }

    #[test]
    fn test_sync_result_shape() {
        let json = serde_json::to_value(SyncResult::default()).unwrap();
        assert_eq!(json, json!({"ids": [], "isUpdated": false, "isDeleted": false}));
    }
}
