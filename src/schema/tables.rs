//! Table schema definitions for the tournament analytics store.
//!
//! Conventions shared by every table: `id` columns are store-assigned
//! rowids (participants are the exception, keyed by the tournament
//! system's stable id); `match_id`/`player_id` are synthetic store ids;
//! `turn` is a plain integer column, never the source's tag-encoded form;
//! yield amounts are raw source values at 10x display scale.

use super::types::*;

// =============================================================================
// Core entities
// =============================================================================

pub static MATCHES: TableSchema = TableSchema {
    name: "matches",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("source_file", ColumnType::Text),
        Column::new("saved_at", ColumnType::Text),
        Column::new("turns", ColumnType::Integer),
        Column::new("map_size", ColumnType::Text),
        Column::new("map_class", ColumnType::Text),
        Column::new("map_aspect", ColumnType::Text),
        // Positive = upper bracket, negative = lower bracket, NULL = unknown
        Column::new("round", ColumnType::Integer),
        Column::new("external_id", ColumnType::Integer),
        Column::new("narrative", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[
        Index::unique(&["source_file"]),
        Index::on(&["external_id"]),
    ],
};

pub static PLAYERS: TableSchema = TableSchema {
    name: "players",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("match_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("nation", ColumnType::Text),
        Column::new("dynasty", ColumnType::Text),
        Column::new("legitimacy", ColumnType::Integer),
    ],
    foreign_keys: &[ForeignKey::new("match_id", "matches")],
    indexes: &[],
};

// Winners live apart from matches so they can be written after the player
// rows they reference, and overridden without touching the match row.
pub static MATCH_WINNERS: TableSchema = TableSchema {
    name: "match_winners",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        // parser_determined | manual_override
        Column::required("method", ColumnType::Text),
        Column::new("victory", ColumnType::Text),
        // Audit copy of the parser's determination when overridden
        Column::new("parser_player_id", ColumnType::Integer),
        Column::new("reason", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::unique(&["match_id"])],
};

// Keyed by the tournament system's stable participant id, so rows survive
// a full reimport.
pub static PARTICIPANTS: TableSchema = TableSchema {
    name: "participants",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[],
};

pub static PLAYER_PARTICIPANTS: TableSchema = TableSchema {
    name: "player_participants",
    columns: &[
        Column::required("player_id", ColumnType::Integer),
        Column::required("participant_id", ColumnType::Integer),
        // name_match | manual_override
        Column::required("method", ColumnType::Text),
        Column::new("reason", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("player_id", "players"),
        ForeignKey::new("participant_id", "participants"),
    ],
    indexes: &[Index::unique(&["player_id"])],
};

// =============================================================================
// Turn-indexed history series
// =============================================================================

pub static POINTS_HISTORY: TableSchema = TableSchema {
    name: "points_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("points", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id"])],
};

// Raw source integers at 10x display scale; divided only at query time.
pub static YIELD_HISTORY: TableSchema = TableSchema {
    name: "yield_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("yield_type", ColumnType::Text),
        Column::required("amount", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id", "yield_type"])],
};

pub static MILITARY_HISTORY: TableSchema = TableSchema {
    name: "military_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("power", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id"])],
};

pub static LEGITIMACY_HISTORY: TableSchema = TableSchema {
    name: "legitimacy_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("legitimacy", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id"])],
};

pub static FAMILY_OPINION_HISTORY: TableSchema = TableSchema {
    name: "family_opinion_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("family", ColumnType::Text),
        Column::required("opinion", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id"])],
};

pub static RELIGION_OPINION_HISTORY: TableSchema = TableSchema {
    name: "religion_opinion_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("religion", ColumnType::Text),
        Column::required("opinion", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "player_id"])],
};

// =============================================================================
// Events
// =============================================================================

pub static LOG_EVENTS: TableSchema = TableSchema {
    name: "log_events",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("event_type", ColumnType::Text),
        Column::new("data1", ColumnType::Text),
        Column::new("data2", ColumnType::Text),
        Column::new("data3", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "event_type"])],
};

pub static MEMORY_EVENTS: TableSchema = TableSchema {
    name: "memory_events",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("event_type", ColumnType::Text),
        Column::new("data1", ColumnType::Text),
        Column::new("data2", ColumnType::Text),
        Column::new("data3", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "event_type"])],
};

// =============================================================================
// Per-player snapshots and counts
// =============================================================================

pub static RULERS: TableSchema = TableSchema {
    name: "rulers",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("succession", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("archetype", ColumnType::Text),
        Column::new("start_turn", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[],
};

pub static TECHNOLOGIES: TableSchema = TableSchema {
    name: "technologies",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::new("turn", ColumnType::Integer),
        Column::required("tech", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["tech"])],
};

pub static LAWS: TableSchema = TableSchema {
    name: "laws",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::new("turn", ColumnType::Integer),
        Column::required("law", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["law"])],
};

// Tile x turn cross product; tiles record only the turns they were owned.
pub static TERRITORY_HISTORY: TableSchema = TableSchema {
    name: "territory_history",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("tile", ColumnType::Integer),
        Column::required("turn", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[Index::on(&["match_id", "turn"])],
};

pub static UNIT_PRODUCTION: TableSchema = TableSchema {
    name: "unit_production",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("unit", ColumnType::Text),
        Column::required("count", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[],
};

pub static PLAYER_STATS: TableSchema = TableSchema {
    name: "player_stats",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("player_id", ColumnType::Integer),
        Column::required("stat", ColumnType::Text),
        Column::required("value", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("player_id", "players"),
    ],
    indexes: &[],
};

// =============================================================================
// External-feed and audit tables
// =============================================================================

// Sheet-keyed external data: rows are unlinked, not deleted, when their
// match is reimported.
pub static DRAFT_PICKS: TableSchema = TableSchema {
    name: "draft_picks",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("game", ColumnType::Integer),
        Column::required("position", ColumnType::Integer),
        Column::required("participant", ColumnType::Text),
        Column::new("nation", ColumnType::Text),
        Column::new("match_id", ColumnType::Integer),
    ],
    foreign_keys: &[ForeignKey::new("match_id", "matches")],
    indexes: &[Index::on(&["game"])],
};

pub static OVERRIDE_LOG: TableSchema = TableSchema {
    name: "override_log",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("kind", ColumnType::Text),
        Column::required("external_key", ColumnType::Text),
        Column::new("match_id", ColumnType::Integer),
        Column::required("reason", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("match_id", "matches")],
    indexes: &[],
};

// =============================================================================
// Registry
// =============================================================================

pub static ALL_TABLES: &[&TableSchema] = &[
    &MATCHES,
    &PLAYERS,
    &MATCH_WINNERS,
    &PARTICIPANTS,
    &PLAYER_PARTICIPANTS,
    &POINTS_HISTORY,
    &YIELD_HISTORY,
    &MILITARY_HISTORY,
    &LEGITIMACY_HISTORY,
    &FAMILY_OPINION_HISTORY,
    &RELIGION_OPINION_HISTORY,
    &LOG_EVENTS,
    &MEMORY_EVENTS,
    &RULERS,
    &TECHNOLOGIES,
    &LAWS,
    &TERRITORY_HISTORY,
    &UNIT_PRODUCTION,
    &PLAYER_STATS,
    &DRAFT_PICKS,
    &OVERRIDE_LOG,
];

/// The six turn-indexed series expected to be gap-free per match/player
/// (territory is exempt: tiles record only the turns they were owned).
pub static CONTIGUOUS_SERIES: &[&TableSchema] = &[
    &POINTS_HISTORY,
    &YIELD_HISTORY,
    &MILITARY_HISTORY,
    &LEGITIMACY_HISTORY,
    &FAMILY_OPINION_HISTORY,
    &RELIGION_OPINION_HISTORY,
];

/// Match-keyed child tables in deletion order, leaves first.
///
/// The embedded engine has no cascading deletes; this list is the single
/// encoding of the dependency order used by full-match deletion.
pub static CHILD_DELETE_ORDER: &[&TableSchema] = &[
    &POINTS_HISTORY,
    &YIELD_HISTORY,
    &MILITARY_HISTORY,
    &LEGITIMACY_HISTORY,
    &FAMILY_OPINION_HISTORY,
    &RELIGION_OPINION_HISTORY,
    &LOG_EVENTS,
    &MEMORY_EVENTS,
    &RULERS,
    &TECHNOLOGIES,
    &LAWS,
    &TERRITORY_HISTORY,
    &UNIT_PRODUCTION,
    &PLAYER_STATS,
    &MATCH_WINNERS,
];

pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}

pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_table() {
        assert!(get_table("yield_history").is_some());
        assert!(get_table("nonexistent").is_none());
    }

    #[test]
    fn test_every_match_keyed_child_is_in_delete_order() {
        // Everything referencing matches must be covered by deletion,
        // either in the child order or by the special-cased tables.
        let special = ["players", "draft_picks", "override_log", "player_participants"];
        for table in ALL_TABLES {
            if table.name == "matches" || special.contains(&table.name) {
                continue;
            }
            if table.references("matches") {
                assert!(
                    CHILD_DELETE_ORDER.iter().any(|t| t.name == table.name),
                    "{} references matches but is not in CHILD_DELETE_ORDER",
                    table.name
                );
            }
        }
    }

    #[test]
    fn test_player_referencing_tables_precede_players_in_deletion() {
        // match_winners references players, so it must appear in the child
        // order (players themselves are deleted after all children).
        assert!(CHILD_DELETE_ORDER.iter().any(|t| t.name == "match_winners"));
        for table in CHILD_DELETE_ORDER {
            assert_ne!(table.name, "players");
            assert_ne!(table.name, "matches");
        }
    }

    #[test]
    fn test_contiguous_series_excludes_territory() {
        assert!(!CONTIGUOUS_SERIES.iter().any(|t| t.name == "territory_history"));
        assert_eq!(CONTIGUOUS_SERIES.len(), 6);
    }
}
