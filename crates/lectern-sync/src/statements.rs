// File: src/statements.rs
// Purpose: Pure SQL builders shared by every annotation kind
//
// Each kind composes these with its own table and column names; nothing here
// touches the database.

use lectern::db::multi_row_values;

/// Parent table owning one row per (user, book)
pub const GROUPING_TABLE: &str = "annotation";

/// Restricts item statements to the caller's grouping; user and book are
/// bound at `$user_param` and `$user_param + 1`.
pub fn grouping_scope(user_param: usize) -> String {
    format!(
        "annotation_id IN (SELECT id FROM {GROUPING_TABLE} WHERE user_id = ${} AND book_id = ${})",
        user_param,
        user_param + 1
    )
}

/// Create the grouping row if absent; returns its id only when it was created
pub fn grouping_upsert() -> String {
    format!(
        "INSERT INTO {GROUPING_TABLE} (user_id, book_id) VALUES ($1, $2) \
         ON CONFLICT (user_id, book_id) DO NOTHING RETURNING id"
    )
}

pub fn grouping_lookup() -> String {
    format!("SELECT id FROM {GROUPING_TABLE} WHERE user_id = $1 AND book_id = $2")
}

/// Multi-row insert of `rows` items returning their new ids
pub fn batched_insert(table: &str, columns: &[&str], rows: usize) -> String {
    format!(
        "INSERT INTO {table} ({}) VALUES {} RETURNING id",
        columns.join(", "),
        multi_row_values(rows, columns.len(), 1)
    )
}

/// Set `column` for many rows at once.
///
/// `$1` is the array of item ids and `$2` the array of new values, paired by
/// position; `$3`/`$4` are the owning user and book.
pub fn batched_update(table: &str, column: &str) -> String {
    format!(
        "UPDATE {table} AS t SET {column} = v.value, updated_at = NOW() \
         FROM UNNEST($1::bigint[], $2::text[]) AS v(id, value) \
         WHERE t.id = v.id AND t.{scope}",
        scope = grouping_scope(3)
    )
}

/// Flag many rows as deleted; `$1` is the id array, `$2`/`$3` user and book
pub fn batched_soft_delete(table: &str) -> String {
    format!(
        "UPDATE {table} SET is_deleted = TRUE, updated_at = NOW() \
         WHERE id = ANY($1) AND {scope}",
        scope = grouping_scope(2)
    )
}

/// Items of one (user, book) grouping changed after `$3`, deleted ones included
pub fn changed_since(table: &str) -> String {
    lectern::db::as_json_rows(&format!(
        "SELECT i.* FROM {table} i JOIN {GROUPING_TABLE} a ON i.annotation_id = a.id \
         WHERE a.user_id = $1 AND a.book_id = $2 AND i.updated_at > $3 \
         ORDER BY i.updated_at, i.id"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grouping_upsert_is_conflict_tolerant() {
        assert_eq!(
            grouping_upsert(),
            "INSERT INTO annotation (user_id, book_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, book_id) DO NOTHING RETURNING id"
        );
    }

    #[test]
    fn test_batched_insert() {
        let sql = batched_insert("bookmark", &["annotation_id", "start_index", "title"], 2);
        assert_eq!(
            sql,
            "INSERT INTO bookmark (annotation_id, start_index, title) \
             VALUES ($1, $2, $3), ($4, $5, $6) RETURNING id"
        );
    }

    #[test]
    fn test_batched_update_is_scoped_to_the_owner() {
        assert_eq!(
            batched_update("highlight", "text"),
            "UPDATE highlight AS t SET text = v.value, updated_at = NOW() \
             FROM UNNEST($1::bigint[], $2::text[]) AS v(id, value) \
             WHERE t.id = v.id AND t.annotation_id IN \
             (SELECT id FROM annotation WHERE user_id = $3 AND book_id = $4)"
        );
    }

    #[test]
    fn test_batched_soft_delete() {
        assert_eq!(
            batched_soft_delete("note"),
            "UPDATE note SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = ANY($1) AND annotation_id IN \
             (SELECT id FROM annotation WHERE user_id = $2 AND book_id = $3)"
        );
    }

    #[test]
    fn test_changed_since_selects_item_columns_only() {
        let sql = changed_since("highlight");
        assert!(sql.contains("SELECT i.* FROM highlight i JOIN annotation a"));
        assert!(sql.contains("i.updated_at > $3"));
        assert!(!sql.contains("is_deleted"));
    }
}
