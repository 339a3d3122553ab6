//! Save-game document wrapper and the extraction methods for match
//! metadata, players, rulers, and the winner.
//!
//! The save format indexes players from 0; everything stored downstream
//! uses 1-based ids. The conversion lives in [`player_id_from_index`] and
//! nowhere else.

use roxmltree::{Document, Node};
use tracing::warn;

use super::records::*;

/// Convert a file-local 0-based player index into a 1-based player id.
///
/// Index 0 is a valid player; only the offset changes here.
pub fn player_id_from_index(index: i64) -> i64 {
    index + 1
}

/// Decode a turn-encoding tag name (`T17` -> turn 17).
///
/// Returns `None` for any child that does not encode a turn, so callers
/// can skip unrelated elements without failing.
pub fn decode_turn_tag(tag: &str) -> Option<i64> {
    let digits = tag.strip_prefix('T')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse numeric element/attribute text, dropping the record on failure.
///
/// Malformed numbers are a known defect of real saves; one bad value must
/// not abort extraction of the rest of the file.
pub(crate) fn soft_i64(text: &str, what: &str) -> Option<i64> {
    match text.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = text, field = what, "dropping record with malformed number");
            None
        }
    }
}

pub(crate) fn child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

pub(crate) fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

fn child_i64(node: Node, name: &str) -> Option<i64> {
    child_text(node, name).and_then(|t| soft_i64(t, name))
}

/// A parsed save-game document.
///
/// Each extraction method is independent: it reads one concern out of the
/// tree and returns a flat record list. Absent sections mean "no data",
/// never an error.
pub struct SaveGame<'input> {
    doc: Document<'input>,
}

impl<'input> SaveGame<'input> {
    pub fn parse(xml: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = Document::parse(xml)?;
        Ok(Self { doc })
    }

    pub(crate) fn section(&self, name: &str) -> Option<Node<'_, 'input>> {
        child(self.doc.root_element(), name)
    }

    /// All `<Player>` elements paired with their 1-based player id.
    ///
    /// The `Index` attribute is authoritative when present and numeric;
    /// otherwise the element's position stands in for it.
    pub(crate) fn player_nodes(&self) -> Vec<(i64, Node<'_, 'input>)> {
        let Some(players) = self.section("Players") else {
            return Vec::new();
        };
        players
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("Player"))
            .enumerate()
            .map(|(pos, node)| {
                let index = node
                    .attribute("Index")
                    .and_then(|t| soft_i64(t, "Player/@Index"))
                    .unwrap_or(pos as i64);
                (player_id_from_index(index), node)
            })
            .collect()
    }

    pub fn match_info(&self) -> MatchInfo {
        let Some(game) = self.section("Game") else {
            return MatchInfo::default();
        };
        MatchInfo {
            saved_at: child_text(game, "SaveDate").map(str::to_string),
            turns: child_i64(game, "Turn"),
            map_size: child_text(game, "MapSize").map(str::to_string),
            map_class: child_text(game, "MapClass").map(str::to_string),
            map_aspect: child_text(game, "MapAspect").map(str::to_string),
            autosave: child_text(game, "AutoSave") == Some("1"),
        }
    }

    pub fn players(&self) -> Vec<PlayerRecord> {
        self.player_nodes()
            .into_iter()
            .filter_map(|(player_id, node)| {
                let name = child_text(node, "Name")?.to_string();
                Some(PlayerRecord {
                    player_id,
                    name,
                    nation: child_text(node, "Nation").map(str::to_string),
                    dynasty: child_text(node, "Dynasty").map(str::to_string),
                    legitimacy: child_i64(node, "Legitimacy"),
                })
            })
            .collect()
    }

    pub fn rulers(&self) -> Vec<RulerRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(rulers) = child(node, "Rulers") else {
                continue;
            };
            let mut succession = 0;
            for ruler in rulers.children().filter(|n| n.has_tag_name("Ruler")) {
                let Some(name) = child_text(ruler, "Name") else {
                    warn!(player_id, "dropping ruler without a name");
                    continue;
                };
                succession += 1;
                out.push(RulerRecord {
                    player_id,
                    succession,
                    name: name.to_string(),
                    archetype: child_text(ruler, "Archetype").map(str::to_string),
                    start_turn: child_i64(ruler, "StartTurn"),
                });
            }
        }
        out
    }

    /// Determine the winner from the completed-victories record.
    ///
    /// The victory names a team; the ordered `<PlayerTeams>` list maps file
    /// player indices to teams. No completed victory means no winner, never
    /// an inference from other signals.
    pub fn winner(&self) -> Option<WinnerRecord> {
        let victories = self.section("TeamVictories")?;
        let team_node = victories
            .children()
            .find(|n| n.has_tag_name("Team") && n.attribute("Victory").is_some())?;
        let victory = team_node.attribute("Victory")?.to_string();
        let team = soft_i64(team_node.text()?, "TeamVictories/Team")?;

        let assignments: Vec<i64> = self
            .section("PlayerTeams")?
            .children()
            .filter(|n| n.has_tag_name("Team"))
            .filter_map(|n| n.text())
            .filter_map(|t| soft_i64(t, "PlayerTeams/Team"))
            .collect();

        let file_index = assignments.iter().position(|&t| t == team)?;
        Some(WinnerRecord {
            player_id: player_id_from_index(file_index as i64),
            victory,
        })
    }

    /// Run every extraction method and bundle the results.
    pub fn parse_all(&self) -> ParsedSave {
        ParsedSave {
            info: self.match_info(),
            players: self.players(),
            rulers: self.rulers(),
            points: self.points_history(),
            legitimacy: self.legitimacy_history(),
            military: self.military_history(),
            yields: self.yield_history(),
            family_opinions: self.family_opinions(),
            religion_opinions: self.religion_opinions(),
            log_events: self.log_events(),
            memory_events: self.memory_events(),
            technologies: self.technologies(),
            laws: self.laws(),
            territory: self.territory(),
            unit_production: self.unit_production(),
            player_stats: self.player_stats(),
            winner: self.winner(),
        }
    }
}
