//! End-to-end import tests driven by synthetic save archives.
//!
//! Each test builds zip fixtures in a tempdir, runs a full import, and
//! verifies the resulting database with plain queries.

use once_cell::sync::Lazy;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use tourney_saves_to_sqlite::bracket::{BracketData, PickOrderRecord};
use tourney_saves_to_sqlite::etl::{import_saves, ImportOptions, Outcome};
use tourney_saves_to_sqlite::overrides::{OverrideSet, Overrides};
use tourney_saves_to_sqlite::query;
use tourney_saves_to_sqlite::store::Store;
use tourney_saves_to_sqlite::validate;

// =============================================================================
// Fixtures
// =============================================================================

struct SaveSpec {
    players: Vec<(&'static str, &'static str)>,
    turns: i64,
    /// Team holding the completed victory; teams are index-aligned to
    /// players (player i is on team i)
    winner_team: Option<i64>,
    autosave: bool,
    /// Extra bytes, to control archive size (entries are stored, not
    /// deflated, so padding maps directly to file size)
    padding: usize,
}

impl SaveSpec {
    fn two_player() -> Self {
        Self {
            players: vec![("Hypatia", "NATION_GREECE"), ("Trajan", "NATION_ROME")],
            turns: 5,
            winner_team: Some(1),
            autosave: false,
            padding: 0,
        }
    }
}

fn save_xml(spec: &SaveSpec) -> String {
    let mut xml = String::from("<Root>");
    xml.push_str(&format!(
        "<Game><Turn>{}</Turn><SaveDate>2024-03-02T19:44:10</SaveDate>\
         <MapSize>MAPSIZE_MEDIUM</MapSize><MapClass>MAPCLASS_CONTINENT</MapClass>\
         <MapAspect>MAPASPECT_WIDE</MapAspect>{}</Game>",
        spec.turns,
        if spec.autosave { "<AutoSave>1</AutoSave>" } else { "" }
    ));

    xml.push_str("<Players>");
    for (index, (name, nation)) in spec.players.iter().enumerate() {
        xml.push_str(&format!(
            "<Player Index=\"{}\"><Name>{}</Name><Nation>{}</Nation>\
             <Dynasty>DYNASTY_{}</Dynasty><Legitimacy>{}</Legitimacy>",
            index,
            name,
            nation,
            index,
            30 + index as i64
        ));

        let series = |tag: &str, offset: i64| {
            let mut s = format!("<{}>", tag);
            for turn in 1..=spec.turns {
                s.push_str(&format!("<T{}>{}</T{}>", turn, turn * 10 + offset, turn));
            }
            s.push_str(&format!("</{}>", tag));
            s
        };
        xml.push_str(&series("PointsHistory", index as i64));
        xml.push_str(&series("LegitimacyHistory", 1));
        xml.push_str(&series("MilitaryHistory", 2));
        xml.push_str(&format!(
            "<YieldHistory><Yield Type=\"YIELD_FOOD\">{}</Yield></YieldHistory>",
            (1..=spec.turns)
                .map(|turn| format!("<T{}>{}</T{}>", turn, turn * 10, turn))
                .collect::<String>()
        ));
        xml.push_str(&format!(
            "<FamilyOpinionHistory><Family Type=\"FAMILY_SAGES\">{}</Family></FamilyOpinionHistory>",
            (1..=spec.turns)
                .map(|turn| format!("<T{}>{}</T{}>", turn, turn, turn))
                .collect::<String>()
        ));
        xml.push_str(&format!(
            "<ReligionOpinionHistory><Religion Type=\"RELIGION_PAGAN\">{}</Religion></ReligionOpinionHistory>",
            (1..=spec.turns)
                .map(|turn| format!("<T{}>{}</T{}>", turn, -turn, turn))
                .collect::<String>()
        ));
        xml.push_str(
            "<PermanentLog>\
             <Entry Turn=\"2\" Type=\"LOG_CITY_FOUNDED\" Data1=\"CITY_ATHENS\"/>\
             <Entry Turn=\"4\" Type=\"LOG_TECH_DISCOVERED\" Data1=\"TECH_IRONWORKING\"/>\
             </PermanentLog>",
        );
        xml.push_str(&format!(
            "<MemoryList><Memory Turn=\"3\" Type=\"MEMORYPLAYER_DECLARED_WAR\" Data1=\"{}\"/></MemoryList>",
            (index + 1) % spec.players.len()
        ));
        xml.push_str(
            "<TechHistory><Tech Turn=\"2\">TECH_IRONWORKING</Tech></TechHistory>\
             <LawHistory><Law Turn=\"3\">LAW_SLAVERY</Law></LawHistory>\
             <UnitsBuilt><Unit Type=\"UNIT_AXEMAN\">4</Unit></UnitsBuilt>\
             <Stats><Stat Type=\"STAT_KILLS\">7</Stat></Stats>\
             <Rulers><Ruler><Name>Philippos</Name><StartTurn>1</StartTurn></Ruler></Rulers>",
        );
        xml.push_str("</Player>");
    }
    xml.push_str("</Players>");

    if let Some(team) = spec.winner_team {
        xml.push_str(&format!(
            "<TeamVictories><Team Victory=\"VICTORY_CONQUEST\">{}</Team></TeamVictories>",
            team
        ));
    }
    xml.push_str("<PlayerTeams>");
    for index in 0..spec.players.len() {
        xml.push_str(&format!("<Team>{}</Team>", index));
    }
    xml.push_str("</PlayerTeams>");

    xml.push_str("<TileOwnership><Tile ID=\"421\"><T2>0</T2><T4>1</T4></Tile></TileOwnership>");

    if spec.padding > 0 {
        xml.push_str("<Notes>");
        xml.push_str(&"x".repeat(spec.padding));
        xml.push_str("</Notes>");
    }
    xml.push_str("</Root>");
    xml
}

static BASE_SAVE: Lazy<String> = Lazy::new(|| save_xml(&SaveSpec::two_player()));

fn write_save(dir: &Path, name: &str, xml: &str) -> PathBuf {
    let path = dir.join(name);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    writer
        .start_file(
            "save.xml",
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        )
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

fn open_store(dir: &TempDir) -> Store {
    let store = Store::open(&dir.path().join("analytics.db")).unwrap();
    store.create_schema().unwrap();
    store
}

fn import(store: &mut Store, save_dir: &Path) -> tourney_saves_to_sqlite::etl::ImportSummary {
    import_with(store, save_dir, &Overrides::empty(), &BracketData::default(), &[], false)
}

fn import_with(
    store: &mut Store,
    save_dir: &Path,
    overrides: &Overrides,
    bracket: &BracketData,
    picks: &[PickOrderRecord],
    force: bool,
) -> tourney_saves_to_sqlite::etl::ImportSummary {
    let options = ImportOptions {
        force,
        ..ImportOptions::default()
    };
    import_saves(store, save_dir, overrides, bracket, picks, &options).unwrap()
}

fn count(store: &Store, table: &str) -> i64 {
    store
        .run_query(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .unwrap()
        .rows[0][0]
        .as_i64()
        .unwrap()
}

// =============================================================================
// Full pipeline
// =============================================================================

#[test]
fn test_import_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    let summary = import(&mut store, dir.path());
    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.failed(), 0);

    assert_eq!(count(&store, "matches"), 1);
    assert_eq!(count(&store, "players"), 2);
    // 2 players x 5 turns for each of the plain and keyed series
    assert_eq!(count(&store, "points_history"), 10);
    assert_eq!(count(&store, "yield_history"), 10);
    assert_eq!(count(&store, "military_history"), 10);
    assert_eq!(count(&store, "legitimacy_history"), 10);
    assert_eq!(count(&store, "family_opinion_history"), 10);
    assert_eq!(count(&store, "religion_opinion_history"), 10);
    assert_eq!(count(&store, "log_events"), 4);
    assert_eq!(count(&store, "memory_events"), 2);
    assert_eq!(count(&store, "rulers"), 2);
    assert_eq!(count(&store, "territory_history"), 2);

    let external = store
        .run_query("SELECT external_id FROM matches", &[])
        .unwrap();
    assert_eq!(external.rows[0][0].as_i64(), Some(10423));

    // Team 1 held the victory, so the winner is the second player
    let winner = store
        .run_query(
            "SELECT p.name, w.method FROM match_winners w JOIN players p ON p.id = w.player_id",
            &[],
        )
        .unwrap();
    assert_eq!(winner.rows[0][0].as_str(), Some("Trajan"));
    assert_eq!(winner.rows[0][1].as_str(), Some("parser_determined"));

    assert!(validate::contiguity_gaps(&store).unwrap().is_empty());
    assert!(validate::orphan_rows(&store).unwrap().is_empty());
}

#[test]
fn test_reimport_is_skipped_without_force() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    import(&mut store, dir.path());
    let second = import(&mut store, dir.path());

    assert_eq!(second.loaded(), 0);
    assert_eq!(second.skipped(), 1);
    assert!(matches!(
        &second.reports[0].outcome,
        Outcome::Skipped { reason } if reason.contains("already imported")
    ));
    assert_eq!(count(&store, "matches"), 1);
    assert_eq!(count(&store, "players"), 2);
}

#[test]
fn test_force_reimport_regenerates_without_orphans() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    import(&mut store, dir.path());

    let summary = import_with(
        &mut store,
        dir.path(),
        &Overrides::empty(),
        &BracketData::default(),
        &[],
        true,
    );
    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.skipped(), 0);

    assert_eq!(count(&store, "matches"), 1);
    assert_eq!(count(&store, "players"), 2);
    assert_eq!(count(&store, "points_history"), 10);
    assert_eq!(count(&store, "match_winners"), 1);
    assert!(validate::orphan_rows(&store).unwrap().is_empty());
}

// =============================================================================
// Deduplication
// =============================================================================

#[test]
fn test_dedup_selects_best_candidate_of_group() {
    let dir = TempDir::new().unwrap();

    let mut no_victory = SaveSpec::two_player();
    no_victory.winner_team = None;
    no_victory.padding = 50_000;
    write_save(dir.path(), "901_A_vs_B.zip", &save_xml(&no_victory));

    let mut autosave = SaveSpec::two_player();
    autosave.autosave = true;
    write_save(dir.path(), "901_A_vs_B_auto.zip", &save_xml(&autosave));

    let mut manual = SaveSpec::two_player();
    manual.padding = 5_000;
    write_save(dir.path(), "901_A_vs_B_final.zip", &save_xml(&manual));

    let mut store = open_store(&dir);
    let summary = import(&mut store, dir.path());

    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.skipped(), 2);
    assert_eq!(count(&store, "matches"), 1);

    let source = store
        .run_query("SELECT source_file FROM matches", &[])
        .unwrap();
    assert_eq!(source.rows[0][0].as_str(), Some("901_A_vs_B_final.zip"));

    let reason_for = |file: &str| {
        summary
            .reports
            .iter()
            .find(|r| r.file_name == file)
            .and_then(|r| match &r.outcome {
                Outcome::Skipped { reason } => Some(reason.clone()),
                _ => None,
            })
            .unwrap()
    };
    assert!(reason_for("901_A_vs_B.zip").contains("no victory data"));
    assert!(reason_for("901_A_vs_B_auto.zip").contains("autosave"));
}

#[test]
fn test_results_do_not_depend_on_processing_order() {
    let first = save_xml(&SaveSpec {
        players: vec![("Hypatia", "NATION_GREECE"), ("Trajan", "NATION_ROME")],
        winner_team: Some(0),
        ..SaveSpec::two_player()
    });
    let second = save_xml(&SaveSpec {
        players: vec![("Wulfila", "NATION_GOTHS"), ("Trajan", "NATION_ROME")],
        winner_team: Some(1),
        ..SaveSpec::two_player()
    });

    // One batch with both files
    let dir_a = TempDir::new().unwrap();
    write_save(dir_a.path(), "11_Hypatia_vs_Trajan.zip", &first);
    write_save(dir_a.path(), "12_Wulfila_vs_Trajan.zip", &second);
    let mut store_a = open_store(&dir_a);
    import(&mut store_a, dir_a.path());

    // Same files arriving in the opposite order, across two batches
    let dir_b = TempDir::new().unwrap();
    write_save(dir_b.path(), "12_Wulfila_vs_Trajan.zip", &second);
    let mut store_b = open_store(&dir_b);
    import(&mut store_b, dir_b.path());
    write_save(dir_b.path(), "11_Hypatia_vs_Trajan.zip", &first);
    import(&mut store_b, dir_b.path());

    assert_eq!(count(&store_a, "matches"), 2);
    assert_eq!(count(&store_b, "matches"), 2);
    assert_eq!(
        query::nation_win_rates(&store_a).unwrap(),
        query::nation_win_rates(&store_b).unwrap()
    );
}

// =============================================================================
// Overrides and feeds
// =============================================================================

#[test]
fn test_unmatched_override_warns_but_import_succeeds() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    let mut overrides = Overrides::empty();
    overrides.winners = OverrideSet::from_json(
        "winner",
        r#"{"55555": {"winner": "Nobody", "reason": "entered for a future match"}}"#,
    )
    .unwrap();

    let summary = import_with(
        &mut store,
        dir.path(),
        &overrides,
        &BracketData::default(),
        &[],
        false,
    );

    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.unmatched_overrides, 1);
    assert_eq!(count(&store, "override_log"), 0);
}

#[test]
fn test_winner_override_supersedes_parser_with_audit() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    let mut overrides = Overrides::empty();
    overrides.winners = OverrideSet::from_json(
        "winner",
        r#"{"10423": {"winner": "Hypatia", "reason": "wrong file uploaded, bracket confirms Hypatia"}}"#,
    )
    .unwrap();

    let summary = import_with(
        &mut store,
        dir.path(),
        &overrides,
        &BracketData::default(),
        &[],
        false,
    );
    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.unmatched_overrides, 0);

    let winner = store
        .run_query(
            "SELECT p.name, w.method, w.reason, audit.name
             FROM match_winners w
             JOIN players p ON p.id = w.player_id
             LEFT JOIN players audit ON audit.id = w.parser_player_id",
            &[],
        )
        .unwrap();
    assert_eq!(winner.rows[0][0].as_str(), Some("Hypatia"));
    assert_eq!(winner.rows[0][1].as_str(), Some("manual_override"));
    assert!(winner.rows[0][2].as_str().unwrap().contains("wrong file"));
    // The parser's determination survives as the audit copy
    assert_eq!(winner.rows[0][3].as_str(), Some("Trajan"));

    let log = store
        .run_query("SELECT kind, external_key FROM override_log", &[])
        .unwrap();
    assert_eq!(log.rows.len(), 1);
    assert_eq!(log.rows[0][0].as_str(), Some("winner"));
    assert_eq!(log.rows[0][1].as_str(), Some("10423"));
}

#[test]
fn test_bracket_feed_stamps_round_and_links_participants() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    let bracket: BracketData = serde_json::from_str(
        r#"{
            "participants": [
                {"id": 501, "name": "Hypatia"},
                {"id": 502, "name": "Trajan"}
            ],
            "matches": [
                {"id": 10423, "round": -2, "player1": "Hypatia", "player2": "Trajan", "winner": "Trajan"}
            ]
        }"#,
    )
    .unwrap();

    import_with(&mut store, dir.path(), &Overrides::empty(), &bracket, &[], false);

    let round = store.run_query("SELECT round FROM matches", &[]).unwrap();
    assert_eq!(round.rows[0][0].as_i64(), Some(-2));

    let links = store
        .run_query(
            "SELECT participant_id, method FROM player_participants ORDER BY participant_id",
            &[],
        )
        .unwrap();
    assert_eq!(links.rows.len(), 2);
    assert_eq!(links.rows[0][0].as_i64(), Some(501));
    assert_eq!(links.rows[0][1].as_str(), Some("name_match"));

    let standings = query::participant_standings(&store).unwrap();
    let trajan = standings.iter().find(|s| s.name == "Trajan").unwrap();
    assert_eq!(trajan.wins, 1);
}

#[test]
fn test_draft_picks_link_by_participant_pair() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);

    let picks: Vec<PickOrderRecord> = serde_json::from_str(
        r#"[
            {"game": 3, "position": 1, "participant": "Hypatia", "nation": "NATION_GREECE"},
            {"game": 3, "position": 2, "participant": "Trajan", "nation": "NATION_ROME"},
            {"game": 9, "position": 1, "participant": "Wulfila", "nation": "NATION_GOTHS"}
        ]"#,
    )
    .unwrap();

    let summary = import_with(
        &mut store,
        dir.path(),
        &Overrides::empty(),
        &BracketData::default(),
        &picks,
        false,
    );
    assert_eq!(summary.draft_picks, 3);

    let linked = store
        .run_query(
            "SELECT match_id FROM draft_picks WHERE game = 3 ORDER BY position",
            &[],
        )
        .unwrap();
    assert_eq!(linked.rows.len(), 2);
    assert!(linked.rows[0][0].as_i64().is_some());

    // No match has Wulfila; the rows land unlinked
    let unlinked = store
        .run_query("SELECT match_id FROM draft_picks WHERE game = 9", &[])
        .unwrap();
    assert_eq!(unlinked.rows[0][0].as_i64(), None);
}

#[test]
fn test_storage_override_supplies_fallback_file() {
    let save_dir = TempDir::new().unwrap();
    let alt_dir = TempDir::new().unwrap();
    let alt_path = write_save(alt_dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);

    let mut overrides = Overrides::empty();
    overrides.storage = OverrideSet::from_json(
        "storage",
        &format!(
            r#"{{"10423": {{"path": {}, "reason": "save exceeded the upload size limit"}}}}"#,
            serde_json::to_string(alt_path.to_str().unwrap()).unwrap()
        ),
    )
    .unwrap();

    let mut store = open_store(&save_dir);
    let summary = import_with(
        &mut store,
        save_dir.path(),
        &overrides,
        &BracketData::default(),
        &[],
        false,
    );

    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.unmatched_overrides, 0);
    assert_eq!(count(&store, "matches"), 1);
}

// =============================================================================
// Winner semantics
// =============================================================================

#[test]
fn test_match_without_victory_has_unknown_winner() {
    let dir = TempDir::new().unwrap();
    let mut spec = SaveSpec::two_player();
    spec.winner_team = None;
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &save_xml(&spec));

    let mut store = open_store(&dir);
    import(&mut store, dir.path());

    assert_eq!(count(&store, "match_winners"), 0);
    let results = query::match_results(&store).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].winner, None);
}

#[test]
fn test_yield_scale_applied_only_at_query_boundary() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    let mut store = open_store(&dir);
    import(&mut store, dir.path());

    let match_id = store
        .match_id_for_source("10423_Hypatia_vs_Trajan.zip")
        .unwrap()
        .unwrap();

    // Fixture stores turn * 10 per yield sample
    let raw = store
        .run_query(
            "SELECT amount FROM yield_history WHERE turn = 3 LIMIT 1",
            &[],
        )
        .unwrap();
    assert_eq!(raw.rows[0][0].as_i64(), Some(30));

    let curve = query::yield_curves(&store, match_id).unwrap();
    let turn3 = curve.iter().find(|p| p.turn == 3).unwrap();
    assert_eq!(turn3.amount, 3.0);
}

#[test]
fn test_malformed_archive_fails_alone() {
    let dir = TempDir::new().unwrap();
    write_save(dir.path(), "10423_Hypatia_vs_Trajan.zip", &BASE_SAVE);
    std::fs::write(dir.path().join("999_broken.zip"), "definitely not a zip").unwrap();

    let mut store = open_store(&dir);
    let summary = import(&mut store, dir.path());

    assert_eq!(summary.loaded(), 1);
    assert_eq!(summary.failed(), 1);
    let failed = summary
        .reports
        .iter()
        .find(|r| r.file_name == "999_broken.zip")
        .unwrap();
    assert!(matches!(&failed.outcome, Outcome::Failed { .. }));
    assert_eq!(count(&store, "matches"), 1);
}
