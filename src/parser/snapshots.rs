//! Per-player snapshot and count extraction: technology and law progress,
//! tile ownership, unit production, end-game statistics.

use super::records::*;
use super::save::{child, decode_turn_tag, player_id_from_index, soft_i64, SaveGame};

impl SaveGame<'_> {
    pub fn technologies(&self) -> Vec<TechRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(techs) = child(node, "TechHistory") else {
                continue;
            };
            for tech in techs.children().filter(|n| n.has_tag_name("Tech")) {
                let Some(name) = tech.text().map(str::trim).filter(|t| !t.is_empty()) else {
                    continue;
                };
                out.push(TechRecord {
                    player_id,
                    turn: tech.attribute("Turn").and_then(|t| soft_i64(t, "Tech/@Turn")),
                    tech: name.to_string(),
                });
            }
        }
        out
    }

    pub fn laws(&self) -> Vec<LawRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(laws) = child(node, "LawHistory") else {
                continue;
            };
            for law in laws.children().filter(|n| n.has_tag_name("Law")) {
                let Some(name) = law.text().map(str::trim).filter(|t| !t.is_empty()) else {
                    continue;
                };
                out.push(LawRecord {
                    player_id,
                    turn: law.attribute("Turn").and_then(|t| soft_i64(t, "Law/@Turn")),
                    law: name.to_string(),
                });
            }
        }
        out
    }

    /// Tile ownership over time. Sparse: a tile only records the turns on
    /// which it was owned, and unowned samples (negative index) are skipped.
    pub fn territory(&self) -> Vec<TerritoryRecord> {
        let Some(tiles) = self.section("TileOwnership") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for tile_node in tiles.children().filter(|n| n.has_tag_name("Tile")) {
            let Some(tile) = tile_node
                .attribute("ID")
                .and_then(|t| soft_i64(t, "Tile/@ID"))
            else {
                continue;
            };
            for turn_node in tile_node.children().filter(|n| n.is_element()) {
                let Some(turn) = decode_turn_tag(turn_node.tag_name().name()) else {
                    continue;
                };
                let Some(owner_index) = turn_node
                    .text()
                    .and_then(|t| soft_i64(t, "TileOwnership"))
                else {
                    continue;
                };
                if owner_index < 0 {
                    continue;
                }
                out.push(TerritoryRecord {
                    tile,
                    turn,
                    player_id: player_id_from_index(owner_index),
                });
            }
        }
        out
    }

    pub fn unit_production(&self) -> Vec<UnitProductionRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(units) = child(node, "UnitsBuilt") else {
                continue;
            };
            for unit in units.children().filter(|n| n.has_tag_name("Unit")) {
                let (Some(name), Some(count)) = (
                    unit.attribute("Type"),
                    unit.text().and_then(|t| soft_i64(t, "UnitsBuilt/Unit")),
                ) else {
                    continue;
                };
                out.push(UnitProductionRecord {
                    player_id,
                    unit: name.to_string(),
                    count,
                });
            }
        }
        out
    }

    pub fn player_stats(&self) -> Vec<StatRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(stats) = child(node, "Stats") else {
                continue;
            };
            for stat in stats.children().filter(|n| n.has_tag_name("Stat")) {
                let (Some(name), Some(value)) = (
                    stat.attribute("Type"),
                    stat.text().and_then(|t| soft_i64(t, "Stats/Stat")),
                ) else {
                    continue;
                };
                out.push(StatRecord {
                    player_id,
                    stat: name.to_string(),
                    value,
                });
            }
        }
        out
    }
}
