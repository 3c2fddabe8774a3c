//! Document store client.
//!
//! Records live in a SQLite-backed document store: a store directory holds one
//! `<database>.db` file per database, and each collection is a table of JSON
//! objects. The client exposes a single lookup, [`StoreClient::fetch_one`],
//! plus [`StoreClient::insert_one`] and the all-or-nothing
//! [`StoreClient::insert_many`] for loading records.
//!
//! Every fetched [`Record`] carries the store-internal identity under
//! [`IDENTITY_FIELD`], placed first. That field is store bookkeeping and is
//! never part of an encoded payload.

use crate::core::db::{self, OpenMode};
use crate::core::error::QrtagError;
use crate::core::schemas;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use ulid::Ulid;

pub const IDENTITY_FIELD: &str = "_id";
pub const DEFAULT_KEY_FIELD: &str = "Code";
pub const URI_SCHEME: &str = "sqlite://";

/// A fetched document: identity field plus whatever the store holds, in
/// stored field order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub key_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: String::new(),
            collection: String::new(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
        }
    }
}

/// Opaque scalar used for the equality match on the key field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    Int(i64),
    Text(String),
}

impl LookupKey {
    /// CLI keys that parse as integers match integer fields; anything else
    /// matches string fields.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => LookupKey::Int(n),
            Err(_) => LookupKey::Text(raw.to_string()),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(LookupKey::Int),
            Value::String(s) => Some(LookupKey::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            LookupKey::Int(n) => Value::from(*n),
            LookupKey::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Int(n) => write!(f, "{}", n),
            LookupKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LookupKey {
    fn from(n: i64) -> Self {
        LookupKey::Int(n)
    }
}

impl From<&str> for LookupKey {
    fn from(s: &str) -> Self {
        LookupKey::Text(s.to_string())
    }
}

impl ToSql for LookupKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            LookupKey::Int(n) => ToSqlOutput::from(*n),
            LookupKey::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

fn collection_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid collection regex"))
}

fn database_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("valid database regex")
    })
}

/// Resolve a store URI to its directory. Accepts `sqlite://<dir>` or a plain
/// path; any other scheme is malformed.
pub fn resolve_store_dir(uri: &str) -> Result<PathBuf, QrtagError> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(QrtagError::ConnectionError("store URI is empty".to_string()));
    }
    let raw = match trimmed.strip_prefix(URI_SCHEME) {
        Some(rest) => rest,
        None if trimmed.contains("://") => {
            return Err(QrtagError::ConnectionError(format!(
                "unsupported store URI scheme: {}",
                trimmed
            )));
        }
        None => trimmed,
    };
    if raw.is_empty() {
        return Err(QrtagError::ConnectionError(format!(
            "store URI has no path: {}",
            trimmed
        )));
    }
    let dir = PathBuf::from(raw);
    if !dir.is_dir() {
        return Err(QrtagError::ConnectionError(format!(
            "store directory is unreachable: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

fn check_name(kind: &str, name: &str, re: &Regex) -> Result<(), QrtagError> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(QrtagError::ConnectionError(format!(
            "invalid {} name: {:?}",
            kind, name
        )))
    }
}

pub fn database_path(store_dir: &Path, database: &str) -> PathBuf {
    store_dir.join(format!("{}.{}", database, schemas::DATABASE_FILE_EXTENSION))
}

fn insert_document(
    conn: &Connection,
    collection: &str,
    document: &Value,
) -> Result<String, QrtagError> {
    let Value::Object(fields) = document else {
        return Err(QrtagError::ValidationError(
            "a record must be a JSON object".to_string(),
        ));
    };
    let id = match fields.get(IDENTITY_FIELD) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(QrtagError::ValidationError(format!(
                "{} must be a string, got {}",
                IDENTITY_FIELD, other
            )));
        }
        None => Ulid::new().to_string(),
    };
    let body: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != IDENTITY_FIELD)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let sql = schemas::render(schemas::INSERT_ONE_TEMPLATE, collection, None);
    conn.execute(&sql, params![id, serde_json::to_string(&body)?])?;
    Ok(id)
}

/// Connection to one collection of one database.
pub struct StoreClient {
    conn: Connection,
    database: String,
    collection: String,
    key_field: String,
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("key_field", &self.key_field)
            .finish()
    }
}

impl StoreClient {
    /// Open for lookups. Fails with `ConnectionError` when the URI is
    /// malformed or unreachable, or the database does not exist.
    pub fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, QrtagError> {
        Self::open(uri, database, collection, OpenMode::ReadOnly)
    }

    /// Open for loading records, creating the database and collection when
    /// missing.
    pub fn connect_writable(
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, QrtagError> {
        let client = Self::open(uri, database, collection, OpenMode::ReadWrite)?;
        client.conn.execute(
            &schemas::render(schemas::COLLECTION_SCHEMA_TEMPLATE, &client.collection, None),
            [],
        )?;
        Ok(client)
    }

    pub fn from_config(config: &StoreConfig, mode: OpenMode) -> Result<Self, QrtagError> {
        let client = match mode {
            OpenMode::ReadOnly => Self::connect(&config.uri, &config.database, &config.collection)?,
            OpenMode::ReadWrite => {
                Self::connect_writable(&config.uri, &config.database, &config.collection)?
            }
        };
        client.with_key_field(&config.key_field)
    }

    fn open(
        uri: &str,
        database: &str,
        collection: &str,
        mode: OpenMode,
    ) -> Result<Self, QrtagError> {
        check_name("database", database, database_name_re())?;
        check_name("collection", collection, collection_name_re())?;
        let dir = resolve_store_dir(uri)?;
        let path = database_path(&dir, database);
        if mode == OpenMode::ReadOnly && !path.is_file() {
            return Err(QrtagError::ConnectionError(format!(
                "database {:?} not found in {}",
                database,
                dir.display()
            )));
        }
        let conn = db::db_connect(&path, mode)?;
        tracing::debug!(db = %path.display(), collection, ?mode, "store connected");
        Ok(Self {
            conn,
            database: database.to_string(),
            collection: collection.to_string(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
        })
    }

    /// Select the field `fetch_one` matches on (`Code` by default).
    pub fn with_key_field(mut self, field: &str) -> Result<Self, QrtagError> {
        if !collection_name_re().is_match(field) {
            return Err(QrtagError::ValidationError(format!(
                "invalid key field name: {:?}",
                field
            )));
        }
        self.key_field = field.to_string();
        Ok(self)
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_exists(&self) -> Result<bool, QrtagError> {
        let count: i64 = self.conn.query_row(
            schemas::COLLECTION_EXISTS_QUERY,
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// First record whose key field equals `key`, or `None`. An absent
    /// collection holds no records.
    pub fn fetch_one(&self, key: &LookupKey) -> Result<Option<Record>, QrtagError> {
        if !self.collection_exists()? {
            return Ok(None);
        }
        let sql = schemas::render(
            schemas::FETCH_ONE_TEMPLATE,
            &self.collection,
            Some(&self.key_field),
        );
        let row = self
            .conn
            .query_row(&sql, params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;

        let Some((id, doc)) = row else {
            return Ok(None);
        };
        let fields: Map<String, Value> = serde_json::from_str(&doc)?;
        let mut record = Record::new();
        record.insert(IDENTITY_FIELD.to_string(), Value::String(id));
        record.extend(fields);
        Ok(Some(record))
    }

    /// Insert one JSON object and return its identity. A string `_id` in the
    /// document is kept as the identity; otherwise a ULID is assigned.
    pub fn insert_one(&self, document: &Value) -> Result<String, QrtagError> {
        let id = insert_document(&self.conn, &self.collection, document)?;
        tracing::info!(collection = %self.collection, %id, "record inserted");
        Ok(id)
    }

    /// Insert a batch inside one transaction: either every document lands or
    /// none does. Identities come back in input order.
    pub fn insert_many(&mut self, documents: &[Value]) -> Result<Vec<String>, QrtagError> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let id = insert_document(&tx, &self.collection, document).map_err(|e| match e {
                QrtagError::ValidationError(msg) => {
                    QrtagError::ValidationError(format!("record {}: {}", index, msg))
                }
                other => other,
            })?;
            ids.push(id);
        }
        tx.commit()?;
        tracing::info!(collection = %self.collection, count = ids.len(), "records inserted");
        Ok(ids)
    }

    /// Release the connection.
    pub fn close(self) -> Result<(), QrtagError> {
        self.conn.close().map_err(|(_, e)| QrtagError::RusqliteError(e))
    }
}
