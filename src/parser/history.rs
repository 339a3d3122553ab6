//! Turn-indexed history series extraction.
//!
//! The save encodes every series as one child element per turn, the tag
//! name carrying the turn number (`<T17>140</T17>`). Decoding skips
//! children that do not encode a turn.

use roxmltree::Node;

use super::records::{HistoryPoint, KeyedHistoryPoint};
use super::save::{child, decode_turn_tag, soft_i64, SaveGame};

/// Decode all `(turn, value)` pairs under a series element.
fn decode_series(node: Node, what: &str) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    for turn_node in node.children().filter(|n| n.is_element()) {
        let Some(turn) = decode_turn_tag(turn_node.tag_name().name()) else {
            continue;
        };
        let Some(value) = turn_node.text().and_then(|t| soft_i64(t, what)) else {
            continue;
        };
        out.push((turn, value));
    }
    out
}

impl SaveGame<'_> {
    fn plain_series(&self, section: &str) -> Vec<HistoryPoint> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(series) = child(node, section) else {
                continue;
            };
            for (turn, value) in decode_series(series, section) {
                out.push(HistoryPoint {
                    player_id,
                    turn,
                    value,
                });
            }
        }
        out
    }

    /// One keyed series per child element carrying `Type` (yields, opinions).
    fn keyed_series(&self, section: &str, entry: &str) -> Vec<KeyedHistoryPoint> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(series) = child(node, section) else {
                continue;
            };
            for keyed in series.children().filter(|n| n.has_tag_name(entry)) {
                let Some(key) = keyed.attribute("Type") else {
                    tracing::warn!(player_id, section, "dropping keyed series without Type");
                    continue;
                };
                for (turn, value) in decode_series(keyed, section) {
                    out.push(KeyedHistoryPoint {
                        player_id,
                        key: key.to_string(),
                        turn,
                        value,
                    });
                }
            }
        }
        out
    }

    pub fn points_history(&self) -> Vec<HistoryPoint> {
        self.plain_series("PointsHistory")
    }

    pub fn legitimacy_history(&self) -> Vec<HistoryPoint> {
        self.plain_series("LegitimacyHistory")
    }

    pub fn military_history(&self) -> Vec<HistoryPoint> {
        self.plain_series("MilitaryHistory")
    }

    /// Yield amounts come out at 10x their display magnitude and are kept
    /// that way; the query layer owns the display division.
    pub fn yield_history(&self) -> Vec<KeyedHistoryPoint> {
        self.keyed_series("YieldHistory", "Yield")
    }

    pub fn family_opinions(&self) -> Vec<KeyedHistoryPoint> {
        self.keyed_series("FamilyOpinionHistory", "Family")
    }

    pub fn religion_opinions(&self) -> Vec<KeyedHistoryPoint> {
        self.keyed_series("ReligionOpinionHistory", "Religion")
    }
}
