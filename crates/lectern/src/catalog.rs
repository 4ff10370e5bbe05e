// File: src/catalog.rs
// Purpose: Book-specific reads and writes: search, filters, reviews, content tokens, metadata, progress

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::{as_json_rows, like_pattern, live_predicate, multi_row_values, unwrap_rows};
use crate::entity::{self, BookLink, EntityConfig, AUTHOR, AUTHOR_BOOKS, BOOK, CATEGORY, PUBLISHER, TAG, TRANSLATOR};
use crate::error::{AppError, AppResult};
use crate::request::Page;

pub const NAME_AND_AUTHOR: &str = "You can only search by book name or author name, not both";
pub const FILTER_REQUIRED: &str = "At least one filter must be provided";

// ============================================================================
// SEARCH
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

/// Body of `POST /books`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookSearch {
    pub book_ids: Option<Vec<IdRef>>,
    pub book_name: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    ByIds(Vec<i64>),
    All,
    ByName(String),
    ByAuthor(String),
}

impl BookSearch {
    /// Decide which search the body asks for
    pub fn mode(&self) -> AppResult<SearchMode> {
        if let Some(refs) = &self.book_ids {
            return Ok(SearchMode::ByIds(refs.iter().map(|r| r.id).collect()));
        }
        let name = self.book_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let author = self.author_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (name, author) {
            (None, None) => Ok(SearchMode::All),
            (Some(name), None) => Ok(SearchMode::ByName(name.to_string())),
            (None, Some(author)) => Ok(SearchMode::ByAuthor(author.to_string())),
            (Some(_), Some(_)) => Err(AppError::bad_request(NAME_AND_AUTHOR)),
        }
    }
}

fn book_live(alias: &str) -> String {
    live_predicate(&format!("{alias}.{}", BOOK.deleted_column))
}

pub fn all_book_ids_sql() -> String {
    as_json_rows(&format!(
        "SELECT b.id FROM {} b WHERE {} ORDER BY b.id LIMIT $1 OFFSET $2",
        BOOK.table,
        book_live("b")
    ))
}

/// Substring match over every translation stored in the JSON `name` column
pub fn book_name_sql() -> String {
    as_json_rows(&format!(
        "SELECT b.id FROM {} b WHERE {} AND EXISTS (\
         SELECT 1 FROM jsonb_each_text(b.name) AS j(key, value) WHERE j.value LIKE $1) \
         ORDER BY b.id LIMIT $2 OFFSET $3",
        BOOK.table,
        book_live("b")
    ))
}

pub fn author_name_sql() -> String {
    let rel = AUTHOR_BOOKS;
    as_json_rows(&format!(
        "SELECT DISTINCT b.id FROM {bt} b \
         JOIN {r} r ON b.id = r.{bc} \
         JOIN {at} a ON a.id = r.{ec} \
         WHERE a.name LIKE $1 AND {b_live} AND {r_live} AND {a_live} \
         ORDER BY b.id LIMIT $2 OFFSET $3",
        bt = BOOK.table,
        r = rel.table,
        bc = rel.book_column,
        ec = rel.entity_column,
        at = AUTHOR.table,
        b_live = book_live("b"),
        r_live = live_predicate(&format!("r.{}", rel.deleted_column)),
        a_live = live_predicate(&format!("a.{}", AUTHOR.deleted_column)),
    ))
}

pub async fn search_books(pool: &PgPool, mode: SearchMode, page: Page) -> AppResult<Vec<Value>> {
    let rows = match mode {
        SearchMode::ByIds(ids) => return entity::get_by_ids(pool, &BOOK, &ids).await,
        SearchMode::All => {
            sqlx::query_scalar::<_, Json<Value>>(&all_book_ids_sql())
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(pool)
                .await?
        }
        SearchMode::ByName(name) => {
            sqlx::query_scalar::<_, Json<Value>>(&book_name_sql())
                .bind(like_pattern(&name))
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(pool)
                .await?
        }
        SearchMode::ByAuthor(author) => {
            sqlx::query_scalar::<_, Json<Value>>(&author_name_sql())
                .bind(like_pattern(&author))
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(unwrap_rows(rows))
}

// ============================================================================
// FILTERS
// ============================================================================

/// Body of `POST /books/filters`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookFilters {
    pub category_ids: Option<Vec<i64>>,
    pub tag_ids: Option<Vec<i64>>,
    pub author_ids: Option<Vec<i64>>,
    pub translator_ids: Option<Vec<i64>>,
    pub publisher_ids: Option<Vec<i64>>,
}

impl BookFilters {
    /// Provided non-empty filters, paired with the entity they select on
    pub fn provided(&self) -> Vec<(&'static EntityConfig, Vec<i64>)> {
        [
            (&CATEGORY, &self.category_ids),
            (&TAG, &self.tag_ids),
            (&AUTHOR, &self.author_ids),
            (&TRANSLATOR, &self.translator_ids),
            (&PUBLISHER, &self.publisher_ids),
        ]
        .into_iter()
        .filter_map(|(cfg, ids)| match ids {
            Some(ids) if !ids.is_empty() => Some((cfg, ids.clone())),
            _ => None,
        })
        .collect()
    }
}

fn filter_clause(cfg: &EntityConfig, param: usize) -> Option<String> {
    match cfg.books {
        BookLink::Relation(rel) => Some(format!(
            "b.id IN (SELECT r.{bc} FROM {r} r WHERE r.{ec} = ANY(${param}) AND {live})",
            bc = rel.book_column,
            r = rel.table,
            ec = rel.entity_column,
            live = live_predicate(&format!("r.{}", rel.deleted_column)),
        )),
        BookLink::Column(column) => Some(format!("b.{column} = ANY(${param})")),
        BookLink::None => None,
    }
}

/// Union of the books matched by each filter, one bind parameter per filter
pub fn filter_sql(filters: &[&EntityConfig]) -> AppResult<String> {
    let clauses: Vec<String> = filters
        .iter()
        .enumerate()
        .filter_map(|(i, cfg)| filter_clause(cfg, i + 1))
        .collect();
    if clauses.is_empty() {
        return Err(AppError::bad_request(FILTER_REQUIRED));
    }
    Ok(as_json_rows(&format!(
        "SELECT b.id FROM {} b WHERE {} AND ({}) ORDER BY b.id",
        BOOK.table,
        book_live("b"),
        clauses.join(" OR ")
    )))
}

pub async fn filter_books(pool: &PgPool, filters: &BookFilters) -> AppResult<Vec<Value>> {
    let provided = filters.provided();
    let configs: Vec<&EntityConfig> = provided.iter().map(|(cfg, _)| *cfg).collect();
    let sql = filter_sql(&configs)?;

    let mut query = sqlx::query_scalar::<_, Json<Value>>(&sql);
    for (_, ids) in provided {
        query = query.bind(ids);
    }
    Ok(unwrap_rows(query.fetch_all(pool).await?))
}

// ============================================================================
// REVIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub average_rating: f64,
    pub total_reviews: i64,
}

pub async fn book_reviews(pool: &PgPool, book_id: i64) -> AppResult<Vec<Value>> {
    let sql = as_json_rows(&format!(
        "SELECT * FROM review WHERE book_id = $1 AND {} ORDER BY id",
        live_predicate("is_deleted")
    ));
    let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(book_id)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

pub async fn book_rating(pool: &PgPool, book_id: i64) -> AppResult<Rating> {
    let sql = format!(
        "SELECT COALESCE(AVG(rating), 0)::float8 AS average_rating, COUNT(*) AS total_reviews \
         FROM review WHERE book_id = $1 AND {}",
        live_predicate("is_deleted")
    );
    let rating = sqlx::query_as::<_, Rating>(&sql)
        .bind(book_id)
        .fetch_one(pool)
        .await?;
    Ok(rating)
}

// ============================================================================
// CONTENT (library store)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookMetadata {
    pub page_count: Option<i32>,
    pub chapter_count: Option<i32>,
    pub book_encoding: Option<String>,
    pub book_index: Option<Value>,
    pub target_links: Option<Value>,
    pub text_direction: Option<String>,
}

/// One content chunk of a book
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInput {
    pub content: String,
    pub sequence: i32,
    pub size: Option<i32>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub start_chapter: Option<i32>,
    pub end_chapter: Option<i32>,
}

/// Body of `POST /books/:id`
#[derive(Debug, Clone, Deserialize)]
pub struct BookUpload {
    pub metadata: BookMetadata,
    #[serde(default)]
    pub tokens: Vec<TokenInput>,
}

const TOKEN_COLUMNS: [&str; 8] = [
    "book_id",
    "content",
    "sequence",
    "size",
    "start_page",
    "end_page",
    "start_chapter",
    "end_chapter",
];

pub fn token_insert_sql(rows: usize) -> String {
    format!(
        "INSERT INTO token ({}) VALUES {}",
        TOKEN_COLUMNS.join(", "),
        multi_row_values(rows, TOKEN_COLUMNS.len(), 1)
    )
}

pub async fn book_metadata(pool: &PgPool, book_id: i64) -> AppResult<Value> {
    let sql = as_json_rows("SELECT * FROM book_metadata WHERE book_id = $1");
    let row = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(book_id)
        .fetch_optional(pool)
        .await?;
    row.map(|Json(value)| value)
        .ok_or_else(|| AppError::not_found("Book metadata not found"))
}

pub async fn book_token(pool: &PgPool, book_id: i64, sequence: i32) -> AppResult<Value> {
    let sql = as_json_rows(&format!(
        "SELECT * FROM token WHERE book_id = $1 AND sequence = $2 AND {}",
        live_predicate("is_deleted")
    ));
    let row = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(book_id)
        .bind(sequence)
        .fetch_optional(pool)
        .await?;
    row.map(|Json(value)| value).ok_or_else(|| {
        AppError::not_found(format!(
            "Token with sequence {sequence} not found for book ID {book_id}"
        ))
    })
}

/// Every live token of a book, in reading order
pub async fn book_tokens(pool: &PgPool, book_id: i64) -> AppResult<Vec<Value>> {
    let sql = as_json_rows(&format!(
        "SELECT * FROM token WHERE book_id = $1 AND {} ORDER BY sequence",
        live_predicate("is_deleted")
    ));
    let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
        .bind(book_id)
        .fetch_all(pool)
        .await?;
    Ok(unwrap_rows(rows))
}

/// Store a book's tokens (one statement) and then its metadata row
pub async fn upload_book(pool: &PgPool, book_id: i64, upload: BookUpload) -> AppResult<u64> {
    let mut inserted = 0;
    if !upload.tokens.is_empty() {
        let sql = token_insert_sql(upload.tokens.len());
        let mut query = sqlx::query(&sql);
        for token in upload.tokens {
            query = query
                .bind(book_id)
                .bind(token.content)
                .bind(token.sequence)
                .bind(token.size)
                .bind(token.start_page)
                .bind(token.end_page)
                .bind(token.start_chapter)
                .bind(token.end_chapter);
        }
        inserted = query.execute(pool).await?.rows_affected();
    }

    let meta = upload.metadata;
    sqlx::query(
        "INSERT INTO book_metadata \
         (book_id, page_count, chapter_count, book_encoding, book_index, target_links, text_direction) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(book_id)
    .bind(meta.page_count)
    .bind(meta.chapter_count)
    .bind(meta.book_encoding)
    .bind(meta.book_index.map(Json))
    .bind(meta.target_links.map(Json))
    .bind(meta.text_direction)
    .execute(pool)
    .await?;

    tracing::debug!(book_id, tokens = inserted, "book content stored");
    Ok(inserted)
}

pub async fn save_reading_progress(
    pool: &PgPool,
    user_id: i64,
    book_id: i64,
    progress: Value,
) -> AppResult<bool> {
    let result = sqlx::query(
        "INSERT INTO reading_progress (user_id, book_id, progress, updated_at) \
         VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (user_id, book_id) DO UPDATE SET progress = EXCLUDED.progress, updated_at = NOW()",
    )
    .bind(user_id)
    .bind(book_id)
    .bind(Json(progress))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn search(name: Option<&str>, author: Option<&str>) -> BookSearch {
        BookSearch {
            book_ids: None,
            book_name: name.map(String::from),
            author_name: author.map(String::from),
        }
    }

    #[rstest]
    #[case(None, None, SearchMode::All)]
    #[case(Some(""), Some("  "), SearchMode::All)]
    #[case(Some("Dune"), None, SearchMode::ByName("Dune".into()))]
    #[case(None, Some("Herbert"), SearchMode::ByAuthor("Herbert".into()))]
    fn test_search_mode(#[case] name: Option<&str>, #[case] author: Option<&str>, #[case] expected: SearchMode) {
        assert_eq!(search(name, author).mode().unwrap(), expected);
    }

    #[test]
    fn test_search_by_name_and_author_is_rejected() {
        let err = search(Some("Dune"), Some("Herbert")).mode().unwrap_err();
        assert_eq!(err.to_string(), NAME_AND_AUTHOR);
    }

    #[test]
    fn test_book_ids_win_over_names() {
        let body: BookSearch =
            serde_json::from_str(r#"{"book_ids":[{"id":3},{"id":1}],"book_name":"x","author_name":"y"}"#).unwrap();
        assert_eq!(body.mode().unwrap(), SearchMode::ByIds(vec![3, 1]));
    }

    #[test]
    fn test_book_name_sql_searches_json_translations() {
        let sql = book_name_sql();
        assert!(sql.contains("jsonb_each_text(b.name)"));
        assert!(sql.contains("j.value LIKE $1"));
        assert!(sql.contains("LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn test_author_name_sql_joins_through_relation() {
        let sql = author_name_sql();
        assert!(sql.contains("JOIN author_product_template_rel r ON b.id = r.product_template_id"));
        assert!(sql.contains("JOIN author a ON a.id = r.author_id"));
    }

    #[test]
    fn test_filters_keep_only_provided_non_empty() {
        let filters: BookFilters =
            serde_json::from_str(r#"{"category_ids":[1,2],"tag_ids":[],"publisher_ids":[9]}"#).unwrap();
        let provided = filters.provided();
        let names: Vec<_> = provided.iter().map(|(cfg, _)| cfg.name).collect();
        assert_eq!(names, vec!["categories", "publishers"]);
        assert_eq!(provided[1].1, vec![9]);
    }

    #[test]
    fn test_filter_sql_is_a_union_of_provided_clauses() {
        let sql = filter_sql(&[&CATEGORY, &PUBLISHER]).unwrap();
        assert_eq!(
            sql,
            "SELECT row_to_json(t) FROM (SELECT b.id FROM product_template b \
             WHERE NOT COALESCE(b.is_deleted, FALSE) AND (\
             b.id IN (SELECT r.product_template_id FROM category_product_template_rel r \
             WHERE r.category_id = ANY($1) AND NOT COALESCE(r.is_deleted, FALSE)) \
             OR b.publisher_id = ANY($2)) ORDER BY b.id) t"
        );
    }

    #[test]
    fn test_filter_sql_requires_a_filter() {
        let err = filter_sql(&[]).unwrap_err();
        assert_eq!(err.to_string(), FILTER_REQUIRED);

        assert!(BookFilters::default().provided().is_empty());
    }

    #[test]
    fn test_token_insert_sql() {
        assert_eq!(
            token_insert_sql(2),
            "INSERT INTO token (book_id, content, sequence, size, start_page, end_page, start_chapter, end_chapter) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8), ($9, $10, $11, $12, $13, $14, $15, $16)"
        );
    }

    #[test]
    fn test_upload_body_defaults_tokens() {
        let upload: BookUpload = serde_json::from_str(r#"{"metadata":{"page_count":120}}"#).unwrap();
        assert!(upload.tokens.is_empty());
        assert_eq!(upload.metadata.page_count, Some(120));
    }
}
