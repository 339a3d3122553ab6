//! Per-file load stage: translate file-local ids to store ids and write
//! one match inside one transaction.
//!
//! Write order is fixed by the store's foreign-key model: the match row
//! first (its id keys everything), then players (capturing the id map),
//! then child tables, then the winner row last because it references a
//! player. A file either fully lands or not at all.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use crate::bracket::{normalize_name, BracketData, BracketParticipant, PickOrderRecord};
use crate::overrides::{name_fix_key, Overrides};
use crate::parser::ParsedSave;
use crate::schema;
use crate::store::sqlite::insert_rows;
use crate::store::{SqlValue, Store};

/// Reconciliation inputs shared by every file in a run.
pub struct ReconcileCtx<'a> {
    pub overrides: &'a Overrides,
    pub bracket: &'a BracketData,
    participants_by_name: HashMap<String, &'a BracketParticipant>,
}

impl<'a> ReconcileCtx<'a> {
    pub fn new(overrides: &'a Overrides, bracket: &'a BracketData) -> Self {
        Self {
            overrides,
            bracket,
            participants_by_name: bracket.participants_by_name(),
        }
    }
}

/// Override keys that matched something during a run, per kind.
#[derive(Debug, Default)]
pub struct ConsumedOverrides {
    pub winners: BTreeSet<String>,
    pub names: BTreeSet<String>,
    pub pick_orders: BTreeSet<String>,
    pub storage: BTreeSet<String>,
}

pub fn load_match(
    store: &mut Store,
    parsed: &ParsedSave,
    source_file: &str,
    external_id: Option<i64>,
    ctx: &ReconcileCtx,
    consumed: &mut ConsumedOverrides,
) -> Result<i64> {
    let bracket_match = external_id.and_then(|id| ctx.bracket.match_by_id(id));
    let round = bracket_match.and_then(|m| m.round);

    let tx = store.transaction()?;

    // Narrative arrives later through its own write surface
    insert_rows(
        &tx,
        &schema::MATCHES,
        &[vec![
            source_file.into(),
            parsed.info.saved_at.clone().into(),
            parsed.info.turns.into(),
            parsed.info.map_size.clone().into(),
            parsed.info.map_class.clone().into(),
            parsed.info.map_aspect.clone().into(),
            round.into(),
            external_id.into(),
            SqlValue::Null,
        ]],
    )?;
    let match_id = tx.last_insert_rowid();

    let mut player_ids: BTreeMap<i64, i64> = BTreeMap::new();
    for player in &parsed.players {
        insert_rows(
            &tx,
            &schema::PLAYERS,
            &[vec![
                match_id.into(),
                player.name.as_str().into(),
                player.nation.clone().into(),
                player.dynasty.clone().into(),
                player.legitimacy.into(),
            ]],
        )?;
        player_ids.insert(player.player_id, tx.last_insert_rowid());
    }

    // Child rows naming a player the file never declared are parser
    // defects; drop the row, not the file.
    let resolve = |local: i64, table: &str| -> Option<i64> {
        let id = player_ids.get(&local).copied();
        if id.is_none() {
            warn!(source_file, table, local_player_id = local, "dropping row for undeclared player");
        }
        id
    };

    let mut rows: Vec<Vec<SqlValue>>;

    rows = parsed
        .points
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "points_history")?;
            Some(vec![match_id.into(), pid.into(), p.turn.into(), p.value.into()])
        })
        .collect();
    insert_rows(&tx, &schema::POINTS_HISTORY, &rows)?;

    rows = parsed
        .yields
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "yield_history")?;
            Some(vec![
                match_id.into(),
                pid.into(),
                p.turn.into(),
                p.key.as_str().into(),
                p.value.into(),
            ])
        })
        .collect();
    insert_rows(&tx, &schema::YIELD_HISTORY, &rows)?;

    rows = parsed
        .military
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "military_history")?;
            Some(vec![match_id.into(), pid.into(), p.turn.into(), p.value.into()])
        })
        .collect();
    insert_rows(&tx, &schema::MILITARY_HISTORY, &rows)?;

    rows = parsed
        .legitimacy
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "legitimacy_history")?;
            Some(vec![match_id.into(), pid.into(), p.turn.into(), p.value.into()])
        })
        .collect();
    insert_rows(&tx, &schema::LEGITIMACY_HISTORY, &rows)?;

    rows = parsed
        .family_opinions
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "family_opinion_history")?;
            Some(vec![
                match_id.into(),
                pid.into(),
                p.turn.into(),
                p.key.as_str().into(),
                p.value.into(),
            ])
        })
        .collect();
    insert_rows(&tx, &schema::FAMILY_OPINION_HISTORY, &rows)?;

    rows = parsed
        .religion_opinions
        .iter()
        .filter_map(|p| {
            let pid = resolve(p.player_id, "religion_opinion_history")?;
            Some(vec![
                match_id.into(),
                pid.into(),
                p.turn.into(),
                p.key.as_str().into(),
                p.value.into(),
            ])
        })
        .collect();
    insert_rows(&tx, &schema::RELIGION_OPINION_HISTORY, &rows)?;

    for (table, events) in [
        (&schema::LOG_EVENTS, &parsed.log_events),
        (&schema::MEMORY_EVENTS, &parsed.memory_events),
    ] {
        rows = events
            .iter()
            .filter_map(|e| {
                let pid = resolve(e.player_id, table.name)?;
                Some(vec![
                    match_id.into(),
                    pid.into(),
                    e.turn.into(),
                    e.event_type.as_str().into(),
                    e.data[0].clone().into(),
                    e.data[1].clone().into(),
                    e.data[2].clone().into(),
                ])
            })
            .collect();
        insert_rows(&tx, table, &rows)?;
    }

    rows = parsed
        .rulers
        .iter()
        .filter_map(|r| {
            let pid = resolve(r.player_id, "rulers")?;
            Some(vec![
                match_id.into(),
                pid.into(),
                r.succession.into(),
                r.name.as_str().into(),
                r.archetype.clone().into(),
                r.start_turn.into(),
            ])
        })
        .collect();
    insert_rows(&tx, &schema::RULERS, &rows)?;

    rows = parsed
        .technologies
        .iter()
        .filter_map(|t| {
            let pid = resolve(t.player_id, "technologies")?;
            Some(vec![match_id.into(), pid.into(), t.turn.into(), t.tech.as_str().into()])
        })
        .collect();
    insert_rows(&tx, &schema::TECHNOLOGIES, &rows)?;

    rows = parsed
        .laws
        .iter()
        .filter_map(|l| {
            let pid = resolve(l.player_id, "laws")?;
            Some(vec![match_id.into(), pid.into(), l.turn.into(), l.law.as_str().into()])
        })
        .collect();
    insert_rows(&tx, &schema::LAWS, &rows)?;

    rows = parsed
        .territory
        .iter()
        .filter_map(|t| {
            let pid = resolve(t.player_id, "territory_history")?;
            Some(vec![match_id.into(), t.tile.into(), t.turn.into(), pid.into()])
        })
        .collect();
    insert_rows(&tx, &schema::TERRITORY_HISTORY, &rows)?;

    rows = parsed
        .unit_production
        .iter()
        .filter_map(|u| {
            let pid = resolve(u.player_id, "unit_production")?;
            Some(vec![match_id.into(), pid.into(), u.unit.as_str().into(), u.count.into()])
        })
        .collect();
    insert_rows(&tx, &schema::UNIT_PRODUCTION, &rows)?;

    rows = parsed
        .player_stats
        .iter()
        .filter_map(|s| {
            let pid = resolve(s.player_id, "player_stats")?;
            Some(vec![match_id.into(), pid.into(), s.stat.as_str().into(), s.value.into()])
        })
        .collect();
    insert_rows(&tx, &schema::PLAYER_STATS, &rows)?;

    // Audit rows for corrections applied to this match
    let mut applied: Vec<(&'static str, String, String)> = Vec::new();

    // Participant links: manual correction first, then normalized-name match
    let mut winner_participant: HashMap<i64, &str> = HashMap::new();
    for player in &parsed.players {
        let Some(&global) = player_ids.get(&player.player_id) else {
            continue;
        };
        let fix = external_id.and_then(|ext| {
            let key = name_fix_key(ext, &player.name);
            ctx.overrides.names.get(&key).map(|f| (key, f))
        });
        let link = match fix {
            Some((key, fix)) => match ctx
                .participants_by_name
                .get(&normalize_name(&fix.participant))
            {
                Some(p) => {
                    consumed.names.insert(key.clone());
                    applied.push(("name", key, fix.reason.clone()));
                    Some((*p, "manual_override", Some(fix.reason.clone())))
                }
                None => {
                    warn!(
                        key = key.as_str(),
                        participant = fix.participant.as_str(),
                        "name override targets unknown participant"
                    );
                    None
                }
            },
            None => ctx
                .participants_by_name
                .get(&normalize_name(&player.name))
                .map(|p| (*p, "name_match", None)),
        };
        if let Some((participant, method, reason)) = link {
            insert_rows(
                &tx,
                &schema::PLAYER_PARTICIPANTS,
                &[vec![
                    global.into(),
                    participant.id.into(),
                    method.into(),
                    reason.into(),
                ]],
            )?;
            winner_participant.insert(global, participant.name.as_str());
        }
    }

    // Winner row last: it references a player row
    let parser_winner = parsed
        .winner
        .as_ref()
        .and_then(|w| player_ids.get(&w.player_id).copied());
    let victory = parsed.winner.as_ref().map(|w| w.victory.clone());

    let mut winner_row: Option<Vec<SqlValue>> = None;
    if let Some(ext) = external_id {
        let key = ext.to_string();
        if let Some(fix) = ctx.overrides.winners.get(&key) {
            consumed.winners.insert(key.clone());
            let named = parsed
                .players
                .iter()
                .find(|p| p.name == fix.winner)
                .and_then(|p| player_ids.get(&p.player_id).copied());
            match named {
                Some(global) => {
                    winner_row = Some(vec![
                        match_id.into(),
                        global.into(),
                        "manual_override".into(),
                        victory.clone().into(),
                        parser_winner.into(),
                        fix.reason.as_str().into(),
                    ]);
                    applied.push(("winner", key, fix.reason.clone()));
                }
                None => warn!(
                    external_id = ext,
                    winner = fix.winner.as_str(),
                    "winner override names unknown player, keeping parser determination"
                ),
            }
        }
    }
    if winner_row.is_none() {
        if let Some(global) = parser_winner {
            winner_row = Some(vec![
                match_id.into(),
                global.into(),
                "parser_determined".into(),
                victory.into(),
                SqlValue::Null,
                SqlValue::Null,
            ]);
            // The tournament system sometimes disagrees with the save;
            // flag it, let the override document settle it.
            if let Some(recorded) = bracket_match.and_then(|m| m.winner.as_deref()) {
                let stored = winner_participant.get(&global).copied().or_else(|| {
                    parsed
                        .winner
                        .as_ref()
                        .and_then(|w| parsed.players.iter().find(|p| p.player_id == w.player_id))
                        .map(|p| p.name.as_str())
                });
                if let Some(stored) = stored {
                    if normalize_name(stored) != normalize_name(recorded) {
                        warn!(
                            source_file,
                            parser_winner = stored,
                            bracket_winner = recorded,
                            "save file and tournament system disagree on the winner"
                        );
                    }
                }
            }
        }
    }
    if let Some(row) = winner_row {
        insert_rows(&tx, &schema::MATCH_WINNERS, &[row])?;
    }

    for (kind, key, reason) in applied {
        insert_rows(
            &tx,
            &schema::OVERRIDE_LOG,
            &[vec![kind.into(), key.into(), match_id.into(), reason.into()]],
        )?;
    }

    tx.commit()?;
    Ok(match_id)
}

/// Load the spreadsheet pick-order feed and link each sheet game to a match.
///
/// Picks are sheet-keyed external data: rows for a game are replaced on
/// every load, and linking prefers a manual override (sheet game number ->
/// external match id) over matching by participant pair. A game that links
/// to nothing still gets its rows, with a null match.
pub fn load_draft_picks(
    store: &mut Store,
    picks: &[PickOrderRecord],
    ctx: &ReconcileCtx,
    consumed: &mut ConsumedOverrides,
) -> Result<u64> {
    if picks.is_empty() {
        return Ok(0);
    }

    // Participant pairs per match, using linked tournament names where a
    // link exists and falling back to the in-file player name.
    let names = store.run_query(
        "SELECT p.match_id, COALESCE(pa.name, p.name)
         FROM players p
         LEFT JOIN player_participants pp ON pp.player_id = p.id
         LEFT JOIN participants pa ON pa.id = pp.participant_id",
        &[],
    )?;
    let mut names_by_match: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();
    for row in &names.rows {
        let (Some(match_id), Some(name)) = (row[0].as_i64(), row[1].as_str()) else {
            continue;
        };
        names_by_match
            .entry(match_id)
            .or_default()
            .insert(normalize_name(name));
    }

    let mut by_game: BTreeMap<i64, Vec<&PickOrderRecord>> = BTreeMap::new();
    for pick in picks {
        by_game.entry(pick.game).or_default().push(pick);
    }

    let mut loaded = 0u64;
    let mut external_links: Vec<(i64, i64, String)> = Vec::new();
    for (game, group) in &by_game {
        if let Some(fix) = ctx.overrides.pick_orders.get(&game.to_string()) {
            match store.match_id_for_external(fix.external_id)? {
                Some(match_id) => {
                    consumed.pick_orders.insert(game.to_string());
                    external_links.push((*game, match_id, fix.reason.clone()));
                    continue;
                }
                None => warn!(
                    game,
                    external_id = fix.external_id,
                    "pick-order override targets a match not in the store"
                ),
            }
        }
        let want: BTreeSet<String> = group
            .iter()
            .map(|p| normalize_name(&p.participant))
            .collect();
        let hits: Vec<i64> = names_by_match
            .iter()
            .filter(|(_, names)| **names == want)
            .map(|(id, _)| *id)
            .collect();
        match hits.as_slice() {
            [match_id] => external_links.push((*game, *match_id, String::new())),
            [] => warn!(game, "no match found for pick-order game"),
            _ => warn!(game, candidates = hits.len(), "pick-order game matches several matches"),
        }
    }
    let link_for = |game: i64| -> Option<&(i64, i64, String)> {
        external_links.iter().find(|(g, _, _)| *g == game)
    };

    let tx = store.transaction()?;
    for (game, group) in &by_game {
        tx.execute("DELETE FROM draft_picks WHERE game = ?1", [*game])?;
        let linked = link_for(*game).map(|(_, match_id, _)| *match_id);
        let rows: Vec<Vec<SqlValue>> = group
            .iter()
            .map(|p| {
                vec![
                    (*game).into(),
                    p.position.into(),
                    p.participant.as_str().into(),
                    p.nation.clone().into(),
                    linked.into(),
                ]
            })
            .collect();
        loaded += insert_rows(&tx, &schema::DRAFT_PICKS, &rows)?;
        if let Some((_, match_id, reason)) = link_for(*game) {
            if !reason.is_empty() {
                insert_rows(
                    &tx,
                    &schema::OVERRIDE_LOG,
                    &[vec![
                        "pick_order".into(),
                        game.to_string().into(),
                        (*match_id).into(),
                        reason.as_str().into(),
                    ]],
                )?;
            }
        }
    }
    tx.commit()?;

    Ok(loaded)
}
