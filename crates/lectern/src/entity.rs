// File: src/entity.rs
// Purpose: Generic entity store over the catalog tables, driven by static per-entity configuration
//
// Architecture: SQL text is produced by pure builders (unit tested); the async
// functions below only bind parameters and run them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::{as_json_rows, live_predicate, unwrap_rows};
use crate::error::AppResult;
use crate::request::Page;

// ============================================================================
// CONFIGURATION RECORDS
// ============================================================================

/// Join table between books and another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationConfig {
    pub table: &'static str,
    pub book_column: &'static str,
    pub entity_column: &'static str,
    pub deleted_column: &'static str,
}

/// How an entity is linked to books
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookLink {
    /// Many-to-many through a join table
    Relation(RelationConfig),
    /// Foreign key column on the book table
    Column(&'static str),
    /// The entity is the book itself
    None,
}

/// Table and column names of one entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityConfig {
    /// Route segment, e.g. "authors"
    pub name: &'static str,
    /// Human label used in messages, e.g. "Author"
    pub label: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    pub updated_column: &'static str,
    pub deleted_column: &'static str,
    pub books: BookLink,
}

const fn relation(table: &'static str, entity_column: &'static str) -> BookLink {
    BookLink::Relation(book_relation(table, entity_column))
}

const fn book_relation(table: &'static str, entity_column: &'static str) -> RelationConfig {
    RelationConfig {
        table,
        book_column: "product_template_id",
        entity_column,
        deleted_column: "is_deleted",
    }
}

/// Book to author join, also used by the author-name search
pub const AUTHOR_BOOKS: RelationConfig = book_relation("author_product_template_rel", "author_id");

pub const BOOK: EntityConfig = EntityConfig {
    name: "books",
    label: "Book",
    table: "product_template",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: BookLink::None,
};

pub const AUTHOR: EntityConfig = EntityConfig {
    name: "authors",
    label: "Author",
    table: "author",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: BookLink::Relation(AUTHOR_BOOKS),
};

pub const CATEGORY: EntityConfig = EntityConfig {
    name: "categories",
    label: "Category",
    table: "category",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: relation("category_product_template_rel", "category_id"),
};

pub const TAG: EntityConfig = EntityConfig {
    name: "tags",
    label: "Tag",
    table: "product_tag",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: relation("product_tag_product_template_rel", "product_tag_id"),
};

pub const PUBLISHER: EntityConfig = EntityConfig {
    name: "publishers",
    label: "Publisher",
    table: "publisher",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: BookLink::Column("publisher_id"),
};

pub const TRANSLATOR: EntityConfig = EntityConfig {
    name: "translators",
    label: "Translator",
    table: "translator",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: relation("product_template_translator_rel", "translator_id"),
};

pub const SUBSCRIPTION: EntityConfig = EntityConfig {
    name: "subscriptions",
    label: "Subscription",
    table: "stock_warehouse",
    id_column: "id",
    updated_column: "write_date",
    deleted_column: "is_deleted",
    books: relation("product_template_stock_warehouse_rel", "stock_warehouse_id"),
};

/// Every entity type served by the catalog
pub const ALL: [&EntityConfig; 7] = [
    &BOOK,
    &AUTHOR,
    &CATEGORY,
    &TAG,
    &PUBLISHER,
    &TRANSLATOR,
    &SUBSCRIPTION,
];

impl EntityConfig {
    pub fn not_found(&self) -> String {
        format!("{} not found", self.label)
    }

    pub fn ids_required(&self) -> String {
        format!("{} IDs are required", self.label)
    }
}

// ============================================================================
// PURE FUNCTIONS - SQL builders
// ============================================================================

pub fn by_id_sql(cfg: &EntityConfig) -> String {
    as_json_rows(&format!(
        "SELECT * FROM {} WHERE {} = $1",
        cfg.table, cfg.id_column
    ))
}

pub fn by_ids_sql(cfg: &EntityConfig) -> String {
    as_json_rows(&format!(
        "SELECT * FROM {t} WHERE {id} = ANY($1) AND {live} ORDER BY {id}",
        t = cfg.table,
        id = cfg.id_column,
        live = live_predicate(cfg.deleted_column),
    ))
}

pub fn list_sql(cfg: &EntityConfig) -> String {
    as_json_rows(&format!(
        "SELECT * FROM {t} WHERE {live} ORDER BY {id} LIMIT $1 OFFSET $2",
        t = cfg.table,
        id = cfg.id_column,
        live = live_predicate(cfg.deleted_column),
    ))
}

/// Every live row, for the small entity tables served unpaginated
pub fn list_all_sql(cfg: &EntityConfig) -> String {
    as_json_rows(&format!(
        "SELECT * FROM {t} WHERE {live} ORDER BY {id}",
        t = cfg.table,
        id = cfg.id_column,
        live = live_predicate(cfg.deleted_column),
    ))
}

/// Live rows of `cfg` linked to the book bound as `$1`
pub fn related_to_book_sql(cfg: &EntityConfig) -> Option<String> {
    let inner = match cfg.books {
        BookLink::Relation(rel) => format!(
            "SELECT e.* FROM {t} e JOIN {r} r ON e.{id} = r.{ec} \
             WHERE r.{bc} = $1 AND {rel_live} AND {live} ORDER BY e.{id}",
            t = cfg.table,
            id = cfg.id_column,
            r = rel.table,
            ec = rel.entity_column,
            bc = rel.book_column,
            rel_live = live_predicate(&format!("r.{}", rel.deleted_column)),
            live = live_predicate(&format!("e.{}", cfg.deleted_column)),
        ),
        BookLink::Column(column) => format!(
            "SELECT e.* FROM {t} e JOIN {b} b ON b.{column} = e.{id} \
             WHERE b.{bid} = $1 AND {live}",
            t = cfg.table,
            id = cfg.id_column,
            b = BOOK.table,
            bid = BOOK.id_column,
            live = live_predicate(&format!("e.{}", cfg.deleted_column)),
        ),
        BookLink::None => return None,
    };
    Some(as_json_rows(&inner))
}

/// Paginated live books linked to the entity bound as `$1`
pub fn books_for_sql(cfg: &EntityConfig) -> Option<String> {
    let book_live = live_predicate(&format!("b.{}", BOOK.deleted_column));
    let inner = match cfg.books {
        BookLink::Relation(rel) => format!(
            "SELECT b.* FROM {bt} b JOIN {r} r ON b.{bid} = r.{bc} \
             WHERE r.{ec} = $1 AND {rel_live} AND {book_live} \
             ORDER BY b.{bid} LIMIT $2 OFFSET $3",
            bt = BOOK.table,
            bid = BOOK.id_column,
            r = rel.table,
            bc = rel.book_column,
            ec = rel.entity_column,
            rel_live = live_predicate(&format!("r.{}", rel.deleted_column)),
        ),
        BookLink::Column(column) => format!(
            "SELECT b.* FROM {bt} b WHERE b.{column} = $1 AND {book_live} \
             ORDER BY b.{bid} LIMIT $2 OFFSET $3",
            bt = BOOK.table,
            bid = BOOK.id_column,
        ),
        BookLink::None => return None,
    };
    Some(as_json_rows(&inner))
}

/// Live candidates modified strictly after `$1`, restricted to the ids in `$2`
pub fn modified_since_sql(cfg: &EntityConfig) -> String {
    as_json_rows(&format!(
        "SELECT * FROM {t} WHERE {upd} > $1 AND {id} = ANY($2) AND {live} ORDER BY {id}",
        t = cfg.table,
        id = cfg.id_column,
        upd = cfg.updated_column,
        live = live_predicate(cfg.deleted_column),
    ))
}

/// Candidates in `$1` that are still live rows
pub fn live_ids_sql(cfg: &EntityConfig) -> String {
    format!(
        "SELECT {id} FROM {t} WHERE {id} = ANY($1) AND {live}",
        t = cfg.table,
        id = cfg.id_column,
        live = live_predicate(cfg.deleted_column),
    )
}

// ============================================================================
// I/O FUNCTIONS
// ============================================================================

/// Fetch one row, soft-deleted or not
pub async fn get_by_id(pool: &PgPool, cfg: &EntityConfig, id: i64) -> AppResult<Option<Value>> {
    let row = sqlx::query_scalar::<_, Json<Value>>(&by_id_sql(cfg))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|Json(value)| value))
}

pub async fn get_by_ids(pool: &PgPool, cfg: &EntityConfig, ids: &[i64]) -> AppResult<Vec<Value>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_scalar::<_, Json<Value>>(&by_ids_sql(cfg))
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

pub async fn list(pool: &PgPool, cfg: &EntityConfig, page: Page) -> AppResult<Vec<Value>> {
    let rows = sqlx::query_scalar::<_, Json<Value>>(&list_sql(cfg))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

pub async fn list_all(pool: &PgPool, cfg: &EntityConfig) -> AppResult<Vec<Value>> {
    let rows = sqlx::query_scalar::<_, Json<Value>>(&list_all_sql(cfg))
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

pub async fn related_to_book(pool: &PgPool, cfg: &EntityConfig, book_id: i64) -> AppResult<Vec<Value>> {
    let Some(sql) = related_to_book_sql(cfg) else {
        return Ok(Vec::new());
    };
    let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(book_id)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

pub async fn books_for(pool: &PgPool, cfg: &EntityConfig, entity_id: i64, page: Page) -> AppResult<Vec<Value>> {
    let Some(sql) = books_for_sql(cfg) else {
        return Ok(Vec::new());
    };
    let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(entity_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

/// First half of the cache-validation query pair
pub async fn modified_since(
    pool: &PgPool,
    cfg: &EntityConfig,
    since: DateTime<Utc>,
    ids: &[i64],
) -> Result<Vec<Value>, sqlx::Error> {
    let rows = sqlx::query_scalar::<_, Json<Value>>(&modified_since_sql(cfg))
        .bind(since)
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

/// Second half of the cache-validation query pair
pub async fn live_ids(pool: &PgPool, cfg: &EntityConfig, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(&live_ids_sql(cfg))
        .bind(ids)
        .fetch_all(pool)
        .await
}
