//! Flat record types produced by the save-game extraction methods.
//!
//! Every `player_id` in these records is the file-local 1-based id
//! (`file index + 1`). Store-assigned ids exist only after load.

/// Match-level metadata read from the `<Game>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchInfo {
    pub saved_at: Option<String>,
    pub turns: Option<i64>,
    pub map_size: Option<String>,
    pub map_class: Option<String>,
    pub map_aspect: Option<String>,
    pub autosave: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_id: i64,
    pub name: String,
    pub nation: Option<String>,
    pub dynasty: Option<String>,
    pub legitimacy: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulerRecord {
    pub player_id: i64,
    /// Position in the player's succession, starting at 1
    pub succession: i64,
    pub name: String,
    pub archetype: Option<String>,
    pub start_turn: Option<i64>,
}

/// One sample of a plain per-turn series (points, legitimacy, military power)
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub player_id: i64,
    pub turn: i64,
    pub value: i64,
}

/// One sample of a sub-keyed per-turn series (yields, family/religion opinion)
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedHistoryPoint {
    pub player_id: i64,
    pub key: String,
    pub turn: i64,
    pub value: i64,
}

/// One event from either taxonomy, ownership already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub player_id: i64,
    pub turn: i64,
    pub event_type: String,
    pub data: [Option<String>; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechRecord {
    pub player_id: i64,
    pub turn: Option<i64>,
    pub tech: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LawRecord {
    pub player_id: i64,
    pub turn: Option<i64>,
    pub law: String,
}

/// Tile ownership sample; the one series not expected to be turn-complete
#[derive(Debug, Clone, PartialEq)]
pub struct TerritoryRecord {
    pub tile: i64,
    pub turn: i64,
    pub player_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitProductionRecord {
    pub player_id: i64,
    pub unit: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub player_id: i64,
    pub stat: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinnerRecord {
    pub player_id: i64,
    pub victory: String,
}

/// Everything one save file yields, bundled for the load stage
#[derive(Debug, Clone, Default)]
pub struct ParsedSave {
    pub info: MatchInfo,
    pub players: Vec<PlayerRecord>,
    pub rulers: Vec<RulerRecord>,
    pub points: Vec<HistoryPoint>,
    pub legitimacy: Vec<HistoryPoint>,
    pub military: Vec<HistoryPoint>,
    pub yields: Vec<KeyedHistoryPoint>,
    pub family_opinions: Vec<KeyedHistoryPoint>,
    pub religion_opinions: Vec<KeyedHistoryPoint>,
    pub log_events: Vec<EventRecord>,
    pub memory_events: Vec<EventRecord>,
    pub technologies: Vec<TechRecord>,
    pub laws: Vec<LawRecord>,
    pub territory: Vec<TerritoryRecord>,
    pub unit_production: Vec<UnitProductionRecord>,
    pub player_stats: Vec<StatRecord>,
    pub winner: Option<WinnerRecord>,
}
