//! Data contracts for the external tournament-system collaborators.
//!
//! The bracket API client, spreadsheet client, and narrative generator
//! live outside this crate; what crosses the boundary is plain records in
//! JSON files. Every field sourced this way can be absent, and an absent
//! feed means "no data", never an error.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A person in the tournament system, stable across matches.
#[derive(Debug, Clone, Deserialize)]
pub struct BracketParticipant {
    pub id: i64,
    pub name: String,
}

/// One bracket match as the tournament system records it.
#[derive(Debug, Clone, Deserialize)]
pub struct BracketMatch {
    pub id: i64,
    /// Positive = upper bracket round, negative = lower bracket round
    pub round: Option<i64>,
    #[serde(default)]
    pub player1: Option<String>,
    #[serde(default)]
    pub player2: Option<String>,
    /// The winner as recorded by the tournament system (participant
    /// display name); may disagree with the save file
    #[serde(default)]
    pub winner: Option<String>,
}

/// One row of the pick-order draft sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct PickOrderRecord {
    /// Sheet-row game number, the stable external key for pick data
    pub game: i64,
    pub position: i64,
    pub participant: String,
    #[serde(default)]
    pub nation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BracketData {
    #[serde(default)]
    pub participants: Vec<BracketParticipant>,
    #[serde(default)]
    pub matches: Vec<BracketMatch>,
}

impl BracketData {
    /// Load a bracket feed file. No file, no data.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bracket feed: {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse bracket feed: {:?}", path))
    }

    pub fn match_by_id(&self, external_id: i64) -> Option<&BracketMatch> {
        self.matches.iter().find(|m| m.id == external_id)
    }

    /// Participants indexed by normalized display name.
    pub fn participants_by_name(&self) -> HashMap<String, &BracketParticipant> {
        self.participants
            .iter()
            .map(|p| (normalize_name(&p.name), p))
            .collect()
    }
}

/// Load pick-order records from the spreadsheet feed file.
pub fn load_pick_orders(path: Option<&Path>) -> Result<Vec<PickOrderRecord>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pick-order feed: {:?}", path))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse pick-order feed: {:?}", path))
}

/// Normalize a display name for cross-system matching.
///
/// The tournament system and the save files never agree on casing or
/// decoration, so matching keeps letters and digits only.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
