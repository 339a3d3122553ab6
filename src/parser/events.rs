//! Event extraction for the two logging subsystems in the save format.
//!
//! Permanent-log entries always belong to the player whose log holds them.
//! Memory entries encode ownership per event type: subject-attributed
//! types name the subject's file index in the first payload field, the
//! rest belong to the witnessing player. The rule set is closed and keyed
//! by type-name prefix; it cannot be inferred from structure.

use roxmltree::Node;

use super::records::EventRecord;
use super::save::{child, player_id_from_index, soft_i64, SaveGame};

/// How the owning player of a memory event is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRule {
    /// The player whose memory list contains the event
    OwningPlayer,
    /// The subject player named by payload field 1 (file index)
    SubjectPlayer,
}

/// Closed dispatch table, keyed by event-type-name prefix.
const MEMORY_OWNER_RULES: &[(&str, OwnerRule)] = &[
    ("MEMORYPLAYER_", OwnerRule::SubjectPlayer),
    ("MEMORYFAMILY_", OwnerRule::OwningPlayer),
    ("MEMORYRELIGION_", OwnerRule::OwningPlayer),
    ("MEMORYCHARACTER_", OwnerRule::OwningPlayer),
    ("MEMORYTRIBE_", OwnerRule::OwningPlayer),
    ("MEMORYUNIT_", OwnerRule::OwningPlayer),
];

/// Resolve the ownership rule for a memory event type.
pub fn memory_owner_rule(event_type: &str) -> OwnerRule {
    MEMORY_OWNER_RULES
        .iter()
        .find(|(prefix, _)| event_type.starts_with(prefix))
        .map(|(_, rule)| *rule)
        .unwrap_or(OwnerRule::OwningPlayer)
}

fn payload(node: Node) -> [Option<String>; 3] {
    let field = |name| node.attribute(name).map(str::to_string);
    [field("Data1"), field("Data2"), field("Data3")]
}

fn entry_parts(node: Node, what: &str) -> Option<(i64, String)> {
    let event_type = node.attribute("Type")?.to_string();
    let turn = soft_i64(node.attribute("Turn")?, what)?;
    Some((turn, event_type))
}

impl SaveGame<'_> {
    /// Permanent-log entries, attributed to the containing player.
    pub fn log_events(&self) -> Vec<EventRecord> {
        let mut out = Vec::new();
        for (player_id, node) in self.player_nodes() {
            let Some(log) = child(node, "PermanentLog") else {
                continue;
            };
            for entry in log.children().filter(|n| n.has_tag_name("Entry")) {
                let Some((turn, event_type)) = entry_parts(entry, "PermanentLog/Entry") else {
                    continue;
                };
                out.push(EventRecord {
                    player_id,
                    turn,
                    event_type,
                    data: payload(entry),
                });
            }
        }
        out
    }

    /// Memory entries, with per-type ownership resolution.
    pub fn memory_events(&self) -> Vec<EventRecord> {
        let mut out = Vec::new();
        for (owning_player, node) in self.player_nodes() {
            let Some(memories) = child(node, "MemoryList") else {
                continue;
            };
            for entry in memories.children().filter(|n| n.has_tag_name("Memory")) {
                let Some((turn, event_type)) = entry_parts(entry, "MemoryList/Memory") else {
                    continue;
                };
                let data = payload(entry);
                let player_id = match memory_owner_rule(&event_type) {
                    OwnerRule::OwningPlayer => owning_player,
                    OwnerRule::SubjectPlayer => match data[0]
                        .as_deref()
                        .and_then(|t| soft_i64(t, "Memory/Data1"))
                    {
                        Some(index) => player_id_from_index(index),
                        // No subject recorded: the witness keeps the event
                        None => owning_player,
                    },
                };
                out.push(EventRecord {
                    player_id,
                    turn,
                    event_type,
                    data,
                });
            }
        }
        out
    }
}
