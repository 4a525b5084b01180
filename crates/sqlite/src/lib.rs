//! `strata-sqlite` — SQLite-backed record store for the persistent mapper.
//!
//! Thin glue over `rusqlite`: a declarative table schema, records as
//! id-plus-attribute-map, and the modeled validation rules (`required`,
//! `unique`) the mapper surfaces as entity mapper errors.
//!
//! Attribute values are stored JSON-encoded in TEXT columns. The id column
//! is `INTEGER PRIMARY KEY AUTOINCREMENT`, so ids are store-allocated and
//! strictly increasing. Calls block on SQLite directly; there is no async
//! path and no locking beyond what SQLite itself provides.

use std::path::Path;

use anyhow::{Context, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;

use strata_core::{AttrKey, AttrMap, AttrValue, EntityId, MapperErrors};
use strata_mapper::{BackendResult, Record, RecordStore};

/// One declared column.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: AttrKey,
    required: bool,
    unique: bool,
    protected: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<AttrKey>) -> Self {
        Self {
            name: name.into(),
            required: false,
            unique: false,
            protected: false,
        }
    }

    /// Reject saves where this column is absent or null.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reject saves where another row already holds this column's value.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the column non-writable through the mapper.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn name(&self) -> &AttrKey {
        &self.name
    }
}

/// Declarative schema for one mapped table.
///
/// The schema is the complete list of persisted columns: saves write
/// declared columns only, and attribute keys that name no declared column
/// are dropped silently rather than rejected. Callers that need a new
/// attribute stored must declare its column here first.
#[derive(Debug, Clone)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, def: ColumnDef) -> Self {
        self.columns.push(def);
        self
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A row materialized as a record: id plus attribute map.
#[derive(Debug, Clone, Default)]
pub struct SqliteRecord {
    id: Option<EntityId>,
    attributes: AttrMap,
}

impl Record for SqliteRecord {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn attributes(&self) -> &AttrMap {
        &self.attributes
    }

    fn merge_attributes(&mut self, attrs: AttrMap) {
        self.attributes.extend(attrs);
    }
}

/// SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    conn: Connection,
    schema: TableSchema,
}

fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the table exists.
    pub fn open(path: impl AsRef<Path>, schema: TableSchema) -> BackendResult<Self> {
        let conn = Connection::open(path).context("open sqlite database")?;
        Self::with_connection(conn, schema)
    }

    /// An in-process, throwaway database, handy for tests.
    pub fn open_in_memory(schema: TableSchema) -> BackendResult<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite database")?;
        Self::with_connection(conn, schema)
    }

    pub fn with_connection(conn: Connection, schema: TableSchema) -> BackendResult<Self> {
        if !valid_identifier(&schema.table) {
            bail!("invalid table name: {:?}", schema.table);
        }
        for column in &schema.columns {
            if !valid_identifier(column.name.as_str()) {
                bail!("invalid column name: {:?}", column.name.as_str());
            }
            if column.name.as_str() == "id" {
                bail!("the id column is implicit and cannot be redeclared");
            }
        }

        let store = Self { conn, schema };
        store.init_schema()?;
        Ok(store)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn init_schema(&self) -> BackendResult<()> {
        let columns: String = self
            .schema
            .columns
            .iter()
            .map(|c| format!(", {} TEXT", c.name.as_str()))
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT{})",
            self.schema.table, columns
        );
        self.conn.execute(&sql, []).context("create table")?;
        debug!(table = %self.schema.table, "ensured table");
        Ok(())
    }

    fn select_sql(&self, tail: &str) -> String {
        format!(
            "SELECT id, {} FROM {} {}",
            self.schema.column_list(),
            self.schema.table,
            tail
        )
    }

    fn record_from_row(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<SqliteRecord> {
        let id: i64 = row.get(0)?;
        let mut attributes = AttrMap::new();
        for (ix, column) in self.schema.columns.iter().enumerate() {
            let raw: Option<String> = row.get(ix + 1)?;
            if let Some(raw) = raw {
                // Stored values are JSON; anything unparseable is kept as
                // a plain string rather than dropped.
                let value =
                    serde_json::from_str(&raw).unwrap_or_else(|_| AttrValue::String(raw));
                attributes.insert(column.name.clone(), value);
            }
        }
        Ok(SqliteRecord {
            id: Some(EntityId::new(id)),
            attributes,
        })
    }

    fn column_value(&self, record: &SqliteRecord, column: &ColumnDef) -> BackendResult<SqlValue> {
        match record.attributes.get(column.name.as_str()) {
            None | Some(AttrValue::Null) => Ok(SqlValue::Null),
            Some(value) => {
                let text = serde_json::to_string(value).context("encode attribute value")?;
                Ok(SqlValue::Text(text))
            }
        }
    }

    fn insert(&mut self, record: &mut SqliteRecord) -> BackendResult<EntityId> {
        let placeholders: Vec<String> = (1..=self.schema.columns.len())
            .map(|ix| format!("?{ix}"))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.schema.table,
            self.schema.column_list(),
            placeholders.join(", ")
        );
        let values: Vec<SqlValue> = self
            .schema
            .columns
            .iter()
            .map(|column| self.column_value(record, column))
            .collect::<BackendResult<_>>()?;

        self.conn
            .execute(&sql, params_from_iter(values))
            .context("insert record")?;
        let id = EntityId::new(self.conn.last_insert_rowid());
        record.id = Some(id);
        debug!(table = %self.schema.table, id = id.as_i64(), "inserted row");
        Ok(id)
    }

    fn update(&mut self, record: &SqliteRecord, id: EntityId) -> BackendResult<EntityId> {
        let assignments: Vec<String> = self
            .schema
            .columns
            .iter()
            .enumerate()
            .map(|(ix, column)| format!("{} = ?{}", column.name.as_str(), ix + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            self.schema.table,
            assignments.join(", "),
            self.schema.columns.len() + 1
        );
        let mut values: Vec<SqlValue> = self
            .schema
            .columns
            .iter()
            .map(|column| self.column_value(record, column))
            .collect::<BackendResult<_>>()?;
        values.push(SqlValue::Integer(id.as_i64()));

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .context("update record")?;
        if changed == 0 {
            bail!("update matched no row (id {id})");
        }
        debug!(table = %self.schema.table, id = id.as_i64(), "updated row");
        Ok(id)
    }
}

impl RecordStore for SqliteStore {
    type Record = SqliteRecord;

    fn new_record(&self) -> SqliteRecord {
        SqliteRecord::default()
    }

    fn find_record(&self, id: EntityId) -> BackendResult<Option<SqliteRecord>> {
        let sql = self.select_sql("WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.as_i64()], |row| self.record_from_row(row))
            .optional()
            .context("find record by id")
    }

    fn validate(&self, record: &SqliteRecord) -> BackendResult<MapperErrors> {
        let mut errors = MapperErrors::new();
        for column in &self.schema.columns {
            let value = match record.attributes.get(column.name.as_str()) {
                Some(AttrValue::Null) | None => {
                    if column.required {
                        errors.push(column.name.clone(), "can't be blank");
                    }
                    continue;
                }
                Some(value) => value,
            };

            if column.unique {
                let text = serde_json::to_string(value).context("encode attribute value")?;
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND id != ?2",
                    self.schema.table,
                    column.name.as_str()
                );
                // -1 never collides with an autoincrement id.
                let own_id = record.id.map(|id| id.as_i64()).unwrap_or(-1);
                let clashes: i64 = self
                    .conn
                    .query_row(&sql, rusqlite::params![text, own_id], |row| row.get(0))
                    .context("uniqueness check")?;
                if clashes > 0 {
                    errors.push(column.name.clone(), "has already been taken");
                }
            }
        }
        Ok(errors)
    }

    fn save(&mut self, record: &mut SqliteRecord) -> BackendResult<EntityId> {
        match record.id {
            Some(id) => self.update(record, id),
            None => self.insert(record),
        }
    }

    fn delete(&mut self, id: EntityId) -> BackendResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.schema.table);
        let changed = self
            .conn
            .execute(&sql, [id.as_i64()])
            .context("delete record")?;
        Ok(changed > 0)
    }

    fn all_records(&self) -> BackendResult<Vec<SqliteRecord>> {
        let sql = self.select_sql("ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql).context("prepare select")?;
        let rows = stmt
            .query_map([], |row| self.record_from_row(row))
            .context("select all records")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("materialize records")
    }

    fn first_record(&self) -> BackendResult<Option<SqliteRecord>> {
        let sql = self.select_sql("ORDER BY id ASC LIMIT 1");
        self.conn
            .query_row(&sql, [], |row| self.record_from_row(row))
            .optional()
            .context("select first record")
    }

    fn last_record(&self) -> BackendResult<Option<SqliteRecord>> {
        let sql = self.select_sql("ORDER BY id DESC LIMIT 1");
        self.conn
            .query_row(&sql, [], |row| self.record_from_row(row))
            .optional()
            .context("select last record")
    }

    fn count(&self) -> BackendResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.schema.table);
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .context("count records")?;
        Ok(count as u64)
    }

    fn delete_all(&mut self) -> BackendResult<()> {
        let sql = format!("DELETE FROM {}", self.schema.table);
        self.conn.execute(&sql, []).context("delete all records")?;
        Ok(())
    }

    fn protected_attributes(&self) -> Vec<AttrKey> {
        self.schema
            .columns
            .iter()
            .filter(|column| column.protected)
            .map(|column| column.name.clone())
            .collect()
    }
}
