//! SQL definitions for the document store.
//!
//! A database is one SQLite file (`<database>.db`) inside the store directory.
//! Each collection is one table holding a JSON object per row. Table names are
//! interpolated, so callers must validate them with [`crate::core::store`]'s
//! name rules before rendering any of these templates.

pub const DATABASE_FILE_EXTENSION: &str = "db";

pub const COLLECTION_SCHEMA_TEMPLATE: &str = "
    CREATE TABLE IF NOT EXISTS {collection} (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        doc TEXT NOT NULL
    )
";

pub const COLLECTION_EXISTS_QUERY: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// First match wins: rows are scanned in insertion order. JSON booleans
/// extract as 0/1, so only number and string fields take part in the match.
pub const FETCH_ONE_TEMPLATE: &str = "
    SELECT id, doc FROM {collection}
    WHERE json_type(doc, '$.{field}') IN ('integer', 'real', 'text')
      AND json_extract(doc, '$.{field}') = ?1
    ORDER BY seq LIMIT 1
";

pub const INSERT_ONE_TEMPLATE: &str = "INSERT INTO {collection} (id, doc) VALUES (?1, ?2)";

pub fn render(template: &str, collection: &str, field: Option<&str>) -> String {
    let sql = template.replace("{collection}", collection);
    match field {
        Some(field) => sql.replace("{field}", field),
        None => sql,
    }
}
