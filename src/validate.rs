//! Post-hoc data-quality checks.
//!
//! Turn contiguity is checked here rather than enforced at write time, so
//! partial-but-valid data still loads and gaps surface as a report. The
//! orphan scan backs the no-dangling-references property after a forced
//! reimport.

use anyhow::Result;
use rusqlite::params;

use crate::schema::{ColumnType, ALL_TABLES, CONTIGUOUS_SERIES};
use crate::store::Store;

/// A (match, player, sub-key) series whose turn set has holes.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGap {
    pub table: &'static str,
    pub match_id: i64,
    pub player_id: i64,
    /// Sub-key for the keyed series (yield type, family, religion)
    pub key: Option<String>,
    pub min_turn: i64,
    pub max_turn: i64,
    pub recorded_turns: i64,
}

impl SeriesGap {
    pub fn missing_turns(&self) -> i64 {
        (self.max_turn - self.min_turn + 1) - self.recorded_turns
    }
}

/// Report every gap in the six contiguous history series.
///
/// Territory is exempt: tiles only record the turns on which they were
/// owned.
pub fn contiguity_gaps(store: &Store) -> Result<Vec<SeriesGap>> {
    let mut out = Vec::new();
    for schema in CONTIGUOUS_SERIES {
        // The keyed series carry exactly one text column, the sub-key.
        let key_col = schema
            .columns
            .iter()
            .find(|c| c.col_type == ColumnType::Text)
            .map(|c| c.name);

        let group = match key_col {
            Some(key) => format!("match_id, player_id, {}", key),
            None => "match_id, player_id".to_string(),
        };
        let key_select = key_col.unwrap_or("NULL");
        let sql = format!(
            "SELECT match_id, player_id, {}, MIN(turn), MAX(turn), COUNT(DISTINCT turn)
             FROM {}
             GROUP BY {}
             HAVING COUNT(DISTINCT turn) <> MAX(turn) - MIN(turn) + 1
             ORDER BY match_id, player_id",
            key_select, schema.name, group
        );

        let mut stmt = store.conn().prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(SeriesGap {
                table: schema.name,
                match_id: row.get(0)?,
                player_id: row.get(1)?,
                key: row.get(2)?,
                min_turn: row.get(3)?,
                max_turn: row.get(4)?,
                recorded_turns: row.get(5)?,
            })
        })?;
        for gap in rows {
            out.push(gap?);
        }
    }
    Ok(out)
}

/// Rows whose foreign key no longer resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanCount {
    pub table: &'static str,
    pub column: &'static str,
    pub rows: i64,
}

/// Scan every foreign key in the schema for dangling references.
///
/// A healthy store returns an empty list; anything else means a deletion
/// ran outside the encoded dependency order.
pub fn orphan_rows(store: &Store) -> Result<Vec<OrphanCount>> {
    let mut out = Vec::new();
    for schema in ALL_TABLES {
        for fk in schema.foreign_keys {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} IS NOT NULL AND {} NOT IN (SELECT {} FROM {})",
                schema.name, fk.column, fk.column, fk.references_column, fk.references_table
            );
            let count: i64 = store.conn().query_row(&sql, params![], |row| row.get(0))?;
            if count > 0 {
                out.push(OrphanCount {
                    table: schema.name,
                    column: fk.column,
                    rows: count,
                });
            }
        }
    }
    Ok(out)
}
