//! Read-side aggregations for the presentation layer.
//!
//! Two contracts hold for every function here: yield amounts leave this
//! layer divided by [`YIELD_DISPLAY_SCALE`] (storage keeps the raw 10x
//! source integers), and winner facts resolve through the match_winners
//! table. A match without a row there has an unknown winner.

use anyhow::Result;
use rusqlite::params;

use crate::schema::{TableSchema, LEGITIMACY_HISTORY, MILITARY_HISTORY, POINTS_HISTORY};
use crate::store::Store;

/// Source yield values are stored at 10x their display magnitude.
pub const YIELD_DISPLAY_SCALE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NationRecord {
    pub nation: String,
    /// Appearances across all matches
    pub matches: i64,
    /// Appearances in matches with a known winner
    pub decided: i64,
    pub wins: i64,
}

impl NationRecord {
    pub fn win_rate(&self) -> Option<f64> {
        (self.decided > 0).then(|| self.wins as f64 / self.decided as f64)
    }
}

pub fn nation_win_rates(store: &Store) -> Result<Vec<NationRecord>> {
    let mut stmt = store.conn().prepare(
        "SELECT p.nation,
                COUNT(*),
                COUNT(w.match_id),
                SUM(CASE WHEN w.player_id = p.id THEN 1 ELSE 0 END)
         FROM players p
         LEFT JOIN match_winners w ON w.match_id = p.match_id
         WHERE p.nation IS NOT NULL
         GROUP BY p.nation
         ORDER BY p.nation",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(NationRecord {
            nation: row.get(0)?,
            matches: row.get(1)?,
            decided: row.get(2)?,
            wins: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// One cell of the nation-vs-nation matrix, from `nation`'s side.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupCell {
    pub nation: String,
    pub opponent: String,
    pub matches: i64,
    pub wins: i64,
}

pub fn nation_matchups(store: &Store) -> Result<Vec<MatchupCell>> {
    let mut stmt = store.conn().prepare(
        "SELECT a.nation, b.nation,
                COUNT(*),
                SUM(CASE WHEN w.player_id = a.id THEN 1 ELSE 0 END)
         FROM players a
         JOIN players b ON b.match_id = a.match_id AND b.id <> a.id
         LEFT JOIN match_winners w ON w.match_id = a.match_id
         WHERE a.nation IS NOT NULL AND b.nation IS NOT NULL
         GROUP BY a.nation, b.nation
         ORDER BY a.nation, b.nation",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MatchupCell {
            nation: row.get(0)?,
            opponent: row.get(1)?,
            matches: row.get(2)?,
            wins: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantStanding {
    pub participant_id: i64,
    pub name: String,
    pub matches: i64,
    pub wins: i64,
}

pub fn participant_standings(store: &Store) -> Result<Vec<ParticipantStanding>> {
    let mut stmt = store.conn().prepare(
        "SELECT pa.id, pa.name,
                COUNT(pp.player_id),
                SUM(CASE WHEN w.player_id = pp.player_id THEN 1 ELSE 0 END)
         FROM participants pa
         JOIN player_participants pp ON pp.participant_id = pa.id
         JOIN players p ON p.id = pp.player_id
         LEFT JOIN match_winners w ON w.match_id = p.match_id
         GROUP BY pa.id, pa.name
         ORDER BY 4 DESC, pa.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ParticipantStanding {
            participant_id: row.get(0)?,
            name: row.get(1)?,
            matches: row.get(2)?,
            wins: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// One match with its winner resolved through match_winners; a missing
/// winner row comes back as `None`, never a default.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub match_id: i64,
    pub source_file: String,
    pub turns: Option<i64>,
    pub round: Option<i64>,
    pub winner: Option<String>,
    pub method: Option<String>,
}

pub fn match_results(store: &Store) -> Result<Vec<MatchResult>> {
    let mut stmt = store.conn().prepare(
        "SELECT m.id, m.source_file, m.turns, m.round, p.name, w.method
         FROM matches m
         LEFT JOIN match_winners w ON w.match_id = m.id
         LEFT JOIN players p ON p.id = w.player_id
         ORDER BY m.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MatchResult {
            match_id: row.get(0)?,
            source_file: row.get(1)?,
            turns: row.get(2)?,
            round: row.get(3)?,
            winner: row.get(4)?,
            method: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// One sample of a plain per-turn progression series.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub player_id: i64,
    pub turn: i64,
    pub value: i64,
}

fn plain_curve(
    store: &Store,
    table: &TableSchema,
    value_col: &str,
    match_id: i64,
) -> Result<Vec<CurvePoint>> {
    let sql = format!(
        "SELECT player_id, turn, {} FROM {} WHERE match_id = ?1 ORDER BY player_id, turn",
        value_col, table.name
    );
    let mut stmt = store.conn().prepare(&sql)?;
    let rows = stmt.query_map(params![match_id], |row| {
        Ok(CurvePoint {
            player_id: row.get(0)?,
            turn: row.get(1)?,
            value: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn points_curve(store: &Store, match_id: i64) -> Result<Vec<CurvePoint>> {
    plain_curve(store, &POINTS_HISTORY, "points", match_id)
}

pub fn legitimacy_curve(store: &Store, match_id: i64) -> Result<Vec<CurvePoint>> {
    plain_curve(store, &LEGITIMACY_HISTORY, "legitimacy", match_id)
}

pub fn military_curve(store: &Store, match_id: i64) -> Result<Vec<CurvePoint>> {
    plain_curve(store, &MILITARY_HISTORY, "power", match_id)
}

/// One yield sample at display scale.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldPoint {
    pub player_id: i64,
    pub yield_type: String,
    pub turn: i64,
    pub amount: f64,
}

pub fn yield_curves(store: &Store, match_id: i64) -> Result<Vec<YieldPoint>> {
    let mut stmt = store.conn().prepare(
        "SELECT player_id, yield_type, turn, amount
         FROM yield_history
         WHERE match_id = ?1
         ORDER BY player_id, yield_type, turn",
    )?;
    let rows = stmt.query_map(params![match_id], |row| {
        Ok(YieldPoint {
            player_id: row.get(0)?,
            yield_type: row.get(1)?,
            turn: row.get(2)?,
            amount: row.get::<_, i64>(3)? as f64 / YIELD_DISPLAY_SCALE,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventCount {
    /// `log` or `memory`
    pub taxonomy: String,
    pub event_type: String,
    pub count: i64,
}

pub fn event_counts(store: &Store) -> Result<Vec<EventCount>> {
    let mut stmt = store.conn().prepare(
        "SELECT 'log', event_type, COUNT(*) FROM log_events GROUP BY event_type
         UNION ALL
         SELECT 'memory', event_type, COUNT(*) FROM memory_events GROUP BY event_type
         ORDER BY 3 DESC, 2",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(EventCount {
            taxonomy: row.get(0)?,
            event_type: row.get(1)?,
            count: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use crate::store::SqlValue;

    fn match_row(source: &str) -> Vec<SqlValue> {
        vec![
            source.into(),
            SqlValue::Null,
            SqlValue::Integer(60),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
        ]
    }

    fn player_row(match_id: i64, name: &str, nation: &str) -> Vec<SqlValue> {
        vec![
            match_id.into(),
            name.into(),
            nation.into(),
            SqlValue::Null,
            SqlValue::Null,
        ]
    }

    /// Two matches: Greece beats Rome in the first, the second has no
    /// winner row at all.
    fn seeded_store() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store.create_schema().unwrap();
        store
            .bulk_insert(&schema::MATCHES, &[match_row("one.zip"), match_row("two.zip")])
            .unwrap();
        store
            .bulk_insert(
                &schema::PLAYERS,
                &[
                    player_row(1, "Hypatia", "NATION_GREECE"),
                    player_row(1, "Trajan", "NATION_ROME"),
                    player_row(2, "Hypatia", "NATION_GREECE"),
                    player_row(2, "Trajan", "NATION_ROME"),
                ],
            )
            .unwrap();
        store
            .bulk_insert(
                &schema::MATCH_WINNERS,
                &[vec![
                    SqlValue::Integer(1),
                    SqlValue::Integer(1),
                    "parser_determined".into(),
                    "VICTORY_POINTS".into(),
                    SqlValue::Null,
                    SqlValue::Null,
                ]],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_nation_win_rates_count_only_decided_matches() {
        let store = seeded_store();
        let rates = nation_win_rates(&store).unwrap();
        assert_eq!(rates.len(), 2);

        let greece = &rates[0];
        assert_eq!(greece.nation, "NATION_GREECE");
        assert_eq!(greece.matches, 2);
        assert_eq!(greece.decided, 1);
        assert_eq!(greece.wins, 1);
        assert_eq!(greece.win_rate(), Some(1.0));

        let rome = &rates[1];
        assert_eq!(rome.wins, 0);
        assert_eq!(rome.win_rate(), Some(0.0));
    }

    #[test]
    fn test_match_without_winner_row_is_unknown() {
        let store = seeded_store();
        let results = match_results(&store).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].winner.as_deref(), Some("Hypatia"));
        assert_eq!(results[0].method.as_deref(), Some("parser_determined"));
        assert_eq!(results[1].winner, None);
        assert_eq!(results[1].method, None);
    }

    #[test]
    fn test_nation_matchups() {
        let store = seeded_store();
        let cells = nation_matchups(&store).unwrap();
        let greece_v_rome = cells
            .iter()
            .find(|c| c.nation == "NATION_GREECE" && c.opponent == "NATION_ROME")
            .unwrap();
        assert_eq!(greece_v_rome.matches, 2);
        assert_eq!(greece_v_rome.wins, 1);
    }

    #[test]
    fn test_yield_curve_divides_by_display_scale() {
        let mut store = seeded_store();
        store
            .bulk_insert(
                &schema::YIELD_HISTORY,
                &[
                    vec![
                        SqlValue::Integer(1),
                        SqlValue::Integer(1),
                        SqlValue::Integer(5),
                        "YIELD_FOOD".into(),
                        SqlValue::Integer(45),
                    ],
                    vec![
                        SqlValue::Integer(1),
                        SqlValue::Integer(1),
                        SqlValue::Integer(6),
                        "YIELD_FOOD".into(),
                        SqlValue::Integer(50),
                    ],
                ],
            )
            .unwrap();

        let curve = yield_curves(&store, 1).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].amount, 4.5);
        assert_eq!(curve[1].amount, 5.0);

        // Storage keeps the raw value
        let raw = store
            .run_query("SELECT amount FROM yield_history WHERE turn = 5", &[])
            .unwrap();
        assert_eq!(raw.rows[0][0].as_i64(), Some(45));
    }

    #[test]
    fn test_progression_curves() {
        let mut store = seeded_store();
        store
            .bulk_insert(
                &schema::POINTS_HISTORY,
                &[
                    vec![
                        SqlValue::Integer(1),
                        SqlValue::Integer(1),
                        SqlValue::Integer(3),
                        SqlValue::Integer(100),
                    ],
                    vec![
                        SqlValue::Integer(1),
                        SqlValue::Integer(1),
                        SqlValue::Integer(4),
                        SqlValue::Integer(120),
                    ],
                ],
            )
            .unwrap();
        let curve = points_curve(&store, 1).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].turn, 3);
        assert_eq!(curve[1].value, 120);
        assert!(points_curve(&store, 2).unwrap().is_empty());
    }

    #[test]
    fn test_event_counts_span_both_taxonomies() {
        let mut store = seeded_store();
        store
            .bulk_insert(
                &schema::LOG_EVENTS,
                &[vec![
                    SqlValue::Integer(1),
                    SqlValue::Integer(1),
                    SqlValue::Integer(2),
                    "LOG_CITY_FOUNDED".into(),
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::Null,
                ]],
            )
            .unwrap();
        store
            .bulk_insert(
                &schema::MEMORY_EVENTS,
                &[vec![
                    SqlValue::Integer(1),
                    SqlValue::Integer(2),
                    SqlValue::Integer(9),
                    "MEMORYPLAYER_DECLARED_WAR".into(),
                    "0".into(),
                    SqlValue::Null,
                    SqlValue::Null,
                ]],
            )
            .unwrap();

        let counts = event_counts(&store).unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts
            .iter()
            .any(|c| c.taxonomy == "log" && c.event_type == "LOG_CITY_FOUNDED"));
        assert!(counts
            .iter()
            .any(|c| c.taxonomy == "memory" && c.count == 1));
    }
}
