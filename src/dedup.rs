//! Candidate grouping and best-save selection.
//!
//! Several archives can represent the same match (manual saves, autosaves,
//! re-uploads). Grouping uses the filename convention as a hint; selection
//! uses extracted data. The ranking criteria are strictly ordered, not
//! weighted: victory data can never be recovered from a lesser save, so it
//! dominates everything else.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Metadata read from a save filename.
///
/// The convention is `<external-id>_<nameA>_vs_<nameB>[_auto].zip`. All of
/// it is a hint for grouping and matching; anything derivable from the XML
/// content is taken from the XML instead.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    pub file_name: String,
    pub external_id: Option<i64>,
    pub participant_hints: Vec<String>,
    pub autosave_hint: bool,
}

pub fn parse_filename(path: &Path) -> FileMeta {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let stem = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let tokens: Vec<&str> = stem.split('_').filter(|t| !t.is_empty()).collect();

    let external_id = tokens
        .first()
        .filter(|t| t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse().ok());

    let autosave_hint = tokens
        .iter()
        .any(|t| t.eq_ignore_ascii_case("auto") || t.eq_ignore_ascii_case("autosave"));

    // Names are the tokens around the "vs" separator
    let mut participant_hints = Vec::new();
    if let Some(vs) = tokens.iter().position(|t| t.eq_ignore_ascii_case("vs")) {
        let start = usize::from(external_id.is_some());
        if vs > start {
            participant_hints.push(tokens[start..vs].join(" "));
        }
        let after: Vec<&str> = tokens[vs + 1..]
            .iter()
            .copied()
            .take_while(|t| !is_suffix_token(t))
            .collect();
        if !after.is_empty() {
            participant_hints.push(after.join(" "));
        }
    }

    FileMeta {
        file_name,
        external_id,
        participant_hints,
        autosave_hint,
    }
}

fn is_suffix_token(token: &str) -> bool {
    token.eq_ignore_ascii_case("auto")
        || token.eq_ignore_ascii_case("autosave")
        || token.bytes().all(|b| b.is_ascii_digit())
}

/// Grouping key for candidates believed to represent the same match.
pub fn group_key(meta: &FileMeta) -> String {
    if let Some(id) = meta.external_id {
        return format!("id:{}", id);
    }
    let stem = meta
        .file_name
        .strip_suffix(".zip")
        .unwrap_or(&meta.file_name);
    let tokens: Vec<String> = stem
        .split('_')
        .filter(|t| !t.is_empty() && !is_suffix_token(t))
        .map(|t| t.to_ascii_lowercase())
        .collect();
    format!("stem:{}", tokens.join("_"))
}

/// One save file competing to represent a match.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub has_victory: bool,
    pub autosave: bool,
}

/// Strict-priority ranking. Earlier criteria always dominate later ones;
/// the filename comparison at the end makes the order total.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.has_victory
        .cmp(&a.has_victory)
        .then(a.autosave.cmp(&b.autosave))
        .then(b.size.cmp(&a.size))
        .then(a.file_name.cmp(&b.file_name))
}

fn skip_reason(best: &Candidate, loser: &Candidate) -> String {
    let why = if best.has_victory != loser.has_victory {
        "no victory data"
    } else if best.autosave != loser.autosave {
        "autosave"
    } else if best.size != loser.size {
        "smaller file"
    } else {
        "filename tie-break"
    };
    format!("duplicate of {} ({})", best.file_name, why)
}

/// Select the single best candidate of a group.
///
/// Deterministic for any input order: the ranking is a total order.
/// Returns the winner and every loser paired with its skip reason.
pub fn select_best(mut group: Vec<Candidate>) -> Option<(Candidate, Vec<(Candidate, String)>)> {
    if group.is_empty() {
        return None;
    }
    group.sort_by(rank);
    let best = group.remove(0);
    let skipped = group
        .into_iter()
        .map(|loser| {
            let reason = skip_reason(&best, &loser);
            (loser, reason)
        })
        .collect();
    Some((best, skipped))
}
