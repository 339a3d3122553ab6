//! Embedded store wrapper: schema bootstrap, bulk insert, read queries,
//! and full-match deletion in dependency order.

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::Path;

use crate::schema::{TableSchema, ALL_TABLES, CHILD_DELETE_ORDER};

use super::schema_gen::{generate_create_table, generate_indexes};
use super::value::SqlValue;

/// A tabular query result: named columns, value rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;
        Self::configure(conn)
    }

    /// Read-only handle for query consumers that must not write.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .context("Failed to open database read-only")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // Foreign keys enforced; the rest tuned for bulk insert
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;
        Ok(Self { conn })
    }

    /// Create all tables and indexes.
    ///
    /// Idempotent when the existing schema matches the definitions; a
    /// table that exists with different SQL is a hard error, never
    /// silently migrated.
    pub fn create_schema(&self) -> Result<()> {
        for schema in ALL_TABLES {
            let wanted = generate_create_table(schema);
            match self.existing_table_sql(schema.name)? {
                None => {
                    self.conn
                        .execute(&wanted, [])
                        .with_context(|| format!("Failed to create table: {}", schema.name))?;
                    for index_sql in generate_indexes(schema) {
                        self.conn.execute(&index_sql, []).with_context(|| {
                            format!("Failed to create index for: {}", schema.name)
                        })?;
                    }
                }
                Some(existing) if existing == wanted => {}
                Some(existing) => {
                    bail!(
                        "table {} already exists with a conflicting schema:\n{}\nexpected:\n{}",
                        schema.name,
                        existing,
                        wanted
                    );
                }
            }
        }
        Ok(())
    }

    fn existing_table_sql(&self, table: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        let mut rows = stmt.query([table])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Insert rows into one table, all-or-nothing.
    pub fn bulk_insert(&mut self, schema: &TableSchema, rows: &[Vec<SqlValue>]) -> Result<u64> {
        let tx = self.conn.transaction()?;
        let count = insert_rows(&tx, schema, rows)?;
        tx.commit()?;
        Ok(count)
    }

    /// Run a read query and return the result as named columns + rows.
    pub fn run_query(&self, sql: &str, params: &[SqlValue]) -> Result<Table> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut result = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        while let Some(row) = result.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(SqlValue::from(row.get_ref(idx)?));
            }
            rows.push(values);
        }

        Ok(Table { columns, rows })
    }

    /// Delete one match and everything derived from it.
    ///
    /// The engine has no cascading deletes, so rows go leaves-first in the
    /// order encoded by [`CHILD_DELETE_ORDER`]; sheet-keyed draft picks
    /// are unlinked rather than deleted.
    pub fn delete_match(&mut self, match_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "UPDATE draft_picks SET match_id = NULL WHERE match_id = ?1",
            [match_id],
        )?;
        tx.execute("DELETE FROM override_log WHERE match_id = ?1", [match_id])?;
        for schema in CHILD_DELETE_ORDER {
            tx.execute(
                &format!("DELETE FROM {} WHERE match_id = ?1", schema.name),
                [match_id],
            )?;
        }
        tx.execute(
            "DELETE FROM player_participants WHERE player_id IN \
             (SELECT id FROM players WHERE match_id = ?1)",
            [match_id],
        )?;
        tx.execute("DELETE FROM players WHERE match_id = ?1", [match_id])?;
        tx.execute("DELETE FROM matches WHERE id = ?1", [match_id])?;

        tx.commit()?;
        Ok(())
    }

    pub fn match_id_for_source(&self, source_file: &str) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM matches WHERE source_file = ?1")?;
        let mut rows = stmt.query([source_file])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn match_id_for_external(&self, external_id: i64) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM matches WHERE external_id = ?1")?;
        let mut rows = stmt.query([external_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Upsert tournament participants.
    ///
    /// Participants are the one table keyed by an externally stable id
    /// rather than a store-assigned rowid, so they are written through
    /// this surface instead of [`Store::bulk_insert`] (which withholds
    /// `id` columns) and survive a full reimport.
    pub fn upsert_participants(&mut self, participants: &[(i64, &str)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO participants (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            for (id, name) in participants {
                stmt.execute(rusqlite::params![id, name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Attach narrative text to a match (write surface for the external
    /// narrative generator).
    pub fn set_narrative(&mut self, match_id: i64, text: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE matches SET narrative = ?1 WHERE id = ?2",
            rusqlite::params![text, match_id],
        )?;
        if updated == 0 {
            bail!("no match with id {}", match_id);
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

/// Insert rows within an open transaction.
///
/// Columns follow the schema's definition order, `id` excluded (rowid
/// assignment belongs to the store).
pub(crate) fn insert_rows(
    tx: &Transaction,
    schema: &TableSchema,
    rows: &[Vec<SqlValue>],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let columns: Vec<&str> = schema.insert_columns().map(|c| c.name).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.name,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut stmt = tx.prepare_cached(&insert_sql)?;
    for row in rows {
        if row.len() != columns.len() {
            bail!(
                "row width {} does not match {} columns of {}",
                row.len(),
                columns.len(),
                schema.name
            );
        }
        for (idx, value) in row.iter().enumerate() {
            value.bind_to(idx + 1, &mut stmt)?;
        }
        stmt.raw_execute()?;
    }

    Ok(rows.len() as u64)
}
