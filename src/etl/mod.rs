//! Batch import orchestration.
//!
//! Per-file pipeline: discover -> deduplicate -> extract -> reconcile ->
//! load. One file's failure never aborts the batch; every file ends up in
//! the summary as loaded, skipped, or failed with a stage and reason.
//!
//! Parsing is CPU-bound and stateless, so a bounded pool of worker
//! threads extracts and parses concurrently. All store writes stay on the
//! calling thread, which owns the handle for the whole run; workers only
//! ever send parsed records back over a channel.

pub mod load;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::bracket::{BracketData, PickOrderRecord};
use crate::dedup::{self, Candidate, FileMeta};
use crate::extract::{read_save_xml, ExtractError};
use crate::overrides::Overrides;
use crate::parser::{ParsedSave, SaveGame};
use crate::store::Store;

pub use load::{load_draft_picks, load_match, ConsumedOverrides, ReconcileCtx};

/// Pipeline stage at which a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Parse,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Parse => "parse",
            Stage::Load => "load",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Loaded { match_id: i64 },
    Skipped { reason: String },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug)]
pub struct FileReport {
    pub file_name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub reports: Vec<FileReport>,
    pub draft_picks: u64,
    pub unmatched_overrides: usize,
}

impl ImportSummary {
    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct ImportOptions {
    /// Delete and reload matches whose source file was already imported.
    pub force: bool,
    /// Parser worker threads.
    pub jobs: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            force: false,
            jobs: 4,
        }
    }
}

struct Job {
    path: PathBuf,
    file_name: String,
    external_id: Option<i64>,
}

/// Import every save archive under `save_dir` into the store.
///
/// The store handle never leaves the calling thread; see the module
/// comment for the threading layout. Per-file failures are collected in
/// the returned summary, only setup-level problems (unreadable directory,
/// malformed override documents already rejected upstream) are errors.
pub fn import_saves(
    store: &mut Store,
    save_dir: &Path,
    overrides: &Overrides,
    bracket: &BracketData,
    picks: &[PickOrderRecord],
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut consumed = ConsumedOverrides::default();

    let files = discover_files(save_dir, overrides, &mut consumed)?;

    // Probe each candidate cheaply for the facts deduplication ranks on,
    // then group files believed to represent the same match.
    let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    let mut external_by_file: BTreeMap<String, Option<i64>> = BTreeMap::new();
    for (path, meta) in files {
        external_by_file.insert(meta.file_name.clone(), meta.external_id);
        match probe_file(&path, &meta) {
            Ok(candidate) => groups
                .entry(dedup::group_key(&meta))
                .or_default()
                .push(candidate),
            Err((stage, reason)) => summary.reports.push(FileReport {
                file_name: meta.file_name,
                outcome: Outcome::Failed { stage, reason },
            }),
        }
    }

    let mut jobs: Vec<Job> = Vec::new();
    for (_, group) in groups {
        let Some((best, skipped)) = dedup::select_best(group) else {
            continue;
        };
        for (loser, reason) in skipped {
            summary.reports.push(FileReport {
                file_name: loser.file_name,
                outcome: Outcome::Skipped { reason },
            });
        }
        match store.match_id_for_source(&best.file_name)? {
            Some(existing) if options.force => {
                store.delete_match(existing)?;
                push_job(&mut jobs, best, &external_by_file);
            }
            Some(_) => summary.reports.push(FileReport {
                file_name: best.file_name,
                outcome: Outcome::Skipped {
                    reason: "already imported (use --force to reimport)".to_string(),
                },
            }),
            None => push_job(&mut jobs, best, &external_by_file),
        }
    }

    // Participants must exist before any player can link to them
    let participants: Vec<(i64, &str)> = bracket
        .participants
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect();
    store.upsert_participants(&participants)?;

    let ctx = ReconcileCtx::new(overrides, bracket);
    let progress = ProgressBar::new(jobs.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{msg:30} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let worker_count = options.jobs.clamp(1, jobs.len().max(1));
    let queue = Arc::new(Mutex::new(jobs.into_iter()));
    let (tx, rx) = mpsc::channel::<(Job, Result<ParsedSave, (Stage, String)>)>();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            scope.spawn(move || loop {
                let job = queue.lock().expect("a parser worker panicked").next();
                let Some(job) = job else { break };
                let parsed = parse_save_file(&job.path);
                if tx.send((job, parsed)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        // Single writer: files load in arrival order, which is fine since
        // matches are independent of one another.
        for (job, parsed) in rx {
            progress.set_message(job.file_name.clone());
            let outcome = match parsed {
                Err((stage, reason)) => Outcome::Failed { stage, reason },
                Ok(parsed) => match load_match(
                    store,
                    &parsed,
                    &job.file_name,
                    job.external_id,
                    &ctx,
                    &mut consumed,
                ) {
                    Ok(match_id) => Outcome::Loaded { match_id },
                    Err(err) => Outcome::Failed {
                        stage: Stage::Load,
                        reason: format!("{:#}", err),
                    },
                },
            };
            progress.inc(1);
            summary.reports.push(FileReport {
                file_name: job.file_name,
                outcome,
            });
        }
    });
    progress.finish_and_clear();

    summary.draft_picks = load_draft_picks(store, picks, &ctx, &mut consumed)?;

    summary.unmatched_overrides = overrides.winners.warn_unmatched(&consumed.winners)
        + overrides.names.warn_unmatched(&consumed.names)
        + overrides.pick_orders.warn_unmatched(&consumed.pick_orders)
        + overrides.storage.warn_unmatched(&consumed.storage);

    Ok(summary)
}

fn push_job(jobs: &mut Vec<Job>, best: Candidate, external: &BTreeMap<String, Option<i64>>) {
    let external_id = external.get(&best.file_name).copied().flatten();
    jobs.push(Job {
        path: best.path,
        file_name: best.file_name,
        external_id,
    });
}

/// Scan the save directory for archives, then add alternate-storage
/// fallback files for matches whose save exceeded the primary channel.
fn discover_files(
    save_dir: &Path,
    overrides: &Overrides,
    consumed: &mut ConsumedOverrides,
) -> Result<Vec<(PathBuf, FileMeta)>> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(save_dir)
        .with_context(|| format!("Failed to read save directory: {:?}", save_dir))?;
    for entry in entries {
        let path = entry?.path();
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if is_zip {
            let meta = dedup::parse_filename(&path);
            out.push((path, meta));
        }
    }
    // Directory iteration order is platform-defined
    out.sort_by(|a, b| a.1.file_name.cmp(&b.1.file_name));

    for (key, fix) in overrides.storage.iter() {
        let path = PathBuf::from(&fix.path);
        let path = if path.is_absolute() {
            path
        } else {
            save_dir.join(path)
        };
        if !path.exists() {
            warn!(
                key,
                path = %path.display(),
                "alternate-storage override points at a missing file"
            );
            continue;
        }
        if out.iter().any(|(existing, _)| *existing == path) {
            continue;
        }
        let mut meta = dedup::parse_filename(&path);
        if meta.external_id.is_none() {
            meta.external_id = key.parse().ok();
        }
        consumed.storage.insert(key.to_string());
        out.push((path, meta));
    }

    Ok(out)
}

/// Cheap pre-parse of one candidate for the facts deduplication needs:
/// victory presence, the autosave marker, and file size.
fn probe_file(path: &Path, meta: &FileMeta) -> Result<Candidate, (Stage, String)> {
    let size = std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| (Stage::Extract, e.to_string()))?;
    let xml = read_save_xml(path).map_err(|e| (Stage::Extract, e.to_string()))?;
    let game =
        SaveGame::parse(&xml).map_err(|e| (Stage::Parse, ExtractError::Xml(e).to_string()))?;
    Ok(Candidate {
        path: path.to_path_buf(),
        file_name: meta.file_name.clone(),
        size,
        has_victory: game.winner().is_some(),
        autosave: game.match_info().autosave || meta.autosave_hint,
    })
}

fn parse_save_file(path: &Path) -> Result<ParsedSave, (Stage, String)> {
    let xml = read_save_xml(path).map_err(|e| (Stage::Extract, e.to_string()))?;
    let game =
        SaveGame::parse(&xml).map_err(|e| (Stage::Parse, ExtractError::Xml(e).to_string()))?;
    Ok(game.parse_all())
}
