//! Externally authored correction documents.
//!
//! Four kinds of corrections share one structure: a JSON map from a
//! stable external key (never a store-assigned id, so entries survive a
//! full reimport) to a payload carrying the corrected value and a
//! mandatory human-readable reason. Overrides supersede parser output,
//! never mutate it in place; the load stage keeps audit copies.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// Corrected winner for a match, keyed by external match id.
#[derive(Debug, Clone, Deserialize)]
pub struct WinnerFix {
    /// In-file name of the winning player
    pub winner: String,
    pub reason: String,
}

/// Corrected participant link, keyed by `<external match id>:<in-file name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct NameFix {
    /// Display name of the participant in the tournament system
    pub participant: String,
    pub reason: String,
}

/// Corrected sheet-game link, keyed by sheet game number.
#[derive(Debug, Clone, Deserialize)]
pub struct PickOrderFix {
    pub external_id: i64,
    pub reason: String,
}

/// Alternate save location, keyed by external match id. Used when the
/// primary channel's file exceeded its size threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageFix {
    pub path: String,
    pub reason: String,
}

/// One override document: external key -> correction payload.
#[derive(Debug, Clone)]
pub struct OverrideSet<P> {
    pub kind: &'static str,
    entries: BTreeMap<String, P>,
}

impl<P: DeserializeOwned> OverrideSet<P> {
    pub fn empty(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Load a document from disk. A missing file is an empty set, not an
    /// error; a present-but-invalid file is always an error.
    pub fn load(kind: &'static str, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty(kind));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} overrides: {:?}", kind, path))?;
        Self::from_json(kind, &text)
            .with_context(|| format!("Failed to parse {} overrides: {:?}", kind, path))
    }

    pub fn from_json(kind: &'static str, text: &str) -> Result<Self> {
        let entries: BTreeMap<String, P> = serde_json::from_str(text)?;
        Ok(Self { kind, entries })
    }
}

impl<P> OverrideSet<P> {
    pub fn get(&self, key: &str) -> Option<&P> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &P)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply this set over a batch of rows.
    ///
    /// `key` extracts the external key of a row (`None` when the row has
    /// no stable identity and can never be overridden); `apply` receives
    /// each row whose key matched. Returns the matched keys so the caller
    /// can report unconsumed entries at the end of a run.
    pub fn apply<T>(
        &self,
        rows: &mut [T],
        key: impl Fn(&T) -> Option<String>,
        mut apply: impl FnMut(&mut T, &P),
    ) -> BTreeSet<String> {
        let mut matched = BTreeSet::new();
        for row in rows {
            let Some(row_key) = key(row) else {
                continue;
            };
            if let Some(fix) = self.entries.get(&row_key) {
                apply(row, fix);
                matched.insert(row_key);
            }
        }
        matched
    }

    /// Warn about entries that matched nothing in the batch.
    ///
    /// An unmatched override is a data-quality signal, never a failure:
    /// the batch may simply not contain that match yet.
    pub fn warn_unmatched(&self, consumed: &BTreeSet<String>) -> usize {
        let mut unmatched = 0;
        for key in self.entries.keys() {
            if !consumed.contains(key) {
                warn!(kind = self.kind, key = key.as_str(), "override matched nothing");
                unmatched += 1;
            }
        }
        unmatched
    }
}

/// All four override documents, loaded from one directory.
#[derive(Debug, Clone)]
pub struct Overrides {
    pub winners: OverrideSet<WinnerFix>,
    pub names: OverrideSet<NameFix>,
    pub pick_orders: OverrideSet<PickOrderFix>,
    pub storage: OverrideSet<StorageFix>,
}

impl Overrides {
    pub fn empty() -> Self {
        Self {
            winners: OverrideSet::empty("winner"),
            names: OverrideSet::empty("name"),
            pick_orders: OverrideSet::empty("pick_order"),
            storage: OverrideSet::empty("storage"),
        }
    }

    /// Load `winners.json`, `names.json`, `pick_orders.json`,
    /// `storage.json` from a directory. No directory means no overrides.
    pub fn load_dir(dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = dir else {
            return Ok(Self::empty());
        };
        Ok(Self {
            winners: OverrideSet::load("winner", &dir.join("winners.json"))?,
            names: OverrideSet::load("name", &dir.join("names.json"))?,
            pick_orders: OverrideSet::load("pick_order", &dir.join("pick_orders.json"))?,
            storage: OverrideSet::load("storage", &dir.join("storage.json"))?,
        })
    }
}

/// Lookup key for name corrections.
pub fn name_fix_key(external_id: i64, player_name: &str) -> String {
    format!("{}:{}", external_id, player_name)
}
