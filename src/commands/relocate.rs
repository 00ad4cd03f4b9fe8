use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, collect_documents, persist_document};
use crate::migrate::lock;
use crate::migrate::relocate::{
    AssetMove, DirRelocateOutcome, MoveKind, MoveResolution, canonical_file_name, relocate_dir,
    relocate_file, sanitize_slug,
};
use crate::migrate::report::{MigrationReport, Outcome, append_to_ledger, ledger_path};
use crate::migrate::rewrite::rewrite_references;
use crate::migrate::util::rel_id;

#[derive(Debug, Clone)]
pub struct RelocateOptions {
    pub work_root: PathBuf,
    pub sources: Vec<PathBuf>,
    pub dest_root: PathBuf,
    pub docs: Vec<PathBuf>,
    pub rename_map: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn run(opts: &RelocateOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("relocate");
    report.detail(format!(
        "started {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    report.detail(format!("dest_root={}", opts.dest_root.display()));

    let lock = lock::acquire(&opts.work_root)?;
    report.detail(format!("lock={}", lock.path().display()));

    let mut outcomes = MigrationReport::new();
    let mut moves: Vec<AssetMove> = Vec::new();

    for entry in load_rename_map(opts.rename_map.as_deref())? {
        moves.push(entry);
    }

    // Every move completes and is recorded before any document is rewritten,
    // so a reference is never pointed at a destination that does not exist.
    for source in &opts.sources {
        let unit = rel_id(&opts.work_root, source);
        match relocate_one(opts, source, &unit, &mut outcomes, &mut report) {
            Ok(Some(mv)) => moves.push(mv),
            Ok(None) => {}
            Err(err) => {
                outcomes.push(
                    unit.clone(),
                    Outcome::Failed {
                        reason: format!("{err:#}"),
                    },
                );
                report.issue(format!("{unit}: {err:#}"));
            }
        }
    }

    if opts.dry_run {
        for mv in &moves {
            report.detail(format!("planned {} -> {}", mv.old, mv.new));
        }
    } else {
        rewrite_pass(opts, &moves, &mut outcomes, &mut report)?;
    }

    for line in outcomes.lines() {
        report.detail(line);
    }
    if !opts.dry_run {
        append_to_ledger(&ledger_path(&opts.work_root), &outcomes)?;
    }
    Ok(report)
}

/// Literal old→new filename pairs, injected as rewrite-only moves. The
/// mapping is configuration the caller supplies, never a built-in table.
fn load_rename_map(path: Option<&Path>) -> Result<Vec<AssetMove>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read rename map {}", path.display()))?;
    let parsed: BTreeMap<String, String> = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse rename map {}: {err}", path.display()))?;
    Ok(parsed
        .into_iter()
        .map(|(old, new)| AssetMove {
            old,
            new,
            kind: MoveKind::File,
        })
        .collect())
}

fn relocate_one(
    opts: &RelocateOptions,
    source: &Path,
    unit: &str,
    outcomes: &mut MigrationReport,
    report: &mut CommandReport,
) -> Result<Option<AssetMove>> {
    if !source.exists() {
        return absent_source(opts, source, unit, outcomes);
    }

    if opts.dry_run {
        let planned = if source.is_dir() {
            opts.dest_root.join(sanitize_slug(unit.rsplit('/').next().unwrap_or(unit)))
        } else {
            let name = source
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("asset");
            opts.dest_root.join(canonical_file_name(name))
        };
        report.detail(format!(
            "dry-run: would move {unit} -> {}",
            rel_id(&opts.work_root, &planned)
        ));
        return Ok(None);
    }

    if source.is_dir() {
        let outcome = relocate_dir(&opts.work_root, source, &opts.dest_root)?;
        if outcome.leftovers > 0 {
            report.detail(format!(
                "{unit}: {} entr(ies) left in source after move",
                outcome.leftovers
            ));
        }
        outcomes.push(unit, dir_outcome(&outcome));
        return Ok(Some(outcome.prefix_move));
    }

    let (mv, resolution) = relocate_file(&opts.work_root, source, &opts.dest_root)?;
    outcomes.push(unit, file_outcome(resolution, &mv.new));
    Ok(Some(mv))
}

/// A missing source whose destination already exists is the steady-state of
/// a re-run over a migrated tree: record it as already migrated and still
/// feed the move to the rewriter, so a run cancelled between move and
/// rewrite stays resumable.
fn absent_source(
    opts: &RelocateOptions,
    source: &Path,
    unit: &str,
    outcomes: &mut MigrationReport,
) -> Result<Option<AssetMove>> {
    let name = source
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("source has no file name: {}", source.display()))?;

    let dir_dest = opts.dest_root.join(sanitize_slug(name));
    if dir_dest.is_dir() {
        let mv = AssetMove {
            old: format!("{unit}/"),
            new: format!("{}/", rel_id(&opts.work_root, &dir_dest)),
            kind: MoveKind::DirPrefix,
        };
        outcomes.push(
            unit,
            Outcome::AssetDuplicateSkipped {
                dest: mv.new.clone(),
            },
        );
        return Ok(Some(mv));
    }

    let file_dest = opts.dest_root.join(canonical_file_name(name));
    if file_dest.is_file() {
        let mv = AssetMove {
            old: unit.to_string(),
            new: rel_id(&opts.work_root, &file_dest),
            kind: MoveKind::File,
        };
        outcomes.push(
            unit,
            Outcome::AssetDuplicateSkipped {
                dest: mv.new.clone(),
            },
        );
        return Ok(Some(mv));
    }

    Err(anyhow!("source not found: {}", source.display()))
}

fn file_outcome(resolution: MoveResolution, dest: &str) -> Outcome {
    let dest = dest.to_string();
    match resolution {
        MoveResolution::Moved => Outcome::AssetMoved { dest },
        MoveResolution::DuplicateSkipped => Outcome::AssetDuplicateSkipped { dest },
        MoveResolution::Renamed => Outcome::AssetRenamed { dest },
    }
}

fn dir_outcome(outcome: &DirRelocateOutcome) -> Outcome {
    let dest = outcome.prefix_move.new.clone();
    match outcome.resolution {
        MoveResolution::DuplicateSkipped => Outcome::AssetDuplicateSkipped { dest },
        _ => Outcome::AssetMoved { dest },
    }
}

fn rewrite_pass(
    opts: &RelocateOptions,
    moves: &[AssetMove],
    outcomes: &mut MigrationReport,
    report: &mut CommandReport,
) -> Result<()> {
    if moves.is_empty() {
        return Ok(());
    }
    let documents = collect_documents(&opts.docs, true)?;
    for path in &documents {
        let unit = rel_id(&opts.work_root, path);
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) => {
                outcomes.push(
                    unit.clone(),
                    Outcome::Failed {
                        reason: format!("failed to read: {err}"),
                    },
                );
                report.issue(format!("{unit}: failed to read: {err}"));
                continue;
            }
        };
        // A document still in a legacy encoding must not be round-tripped
        // through replacement characters; it fails here and gets rewritten
        // on the re-run after recovery.
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(_) => {
                let reason =
                    "not valid utf-8; recover the document before rewriting references";
                outcomes.push(
                    unit.clone(),
                    Outcome::Failed {
                        reason: reason.to_string(),
                    },
                );
                report.issue(format!("{unit}: {reason}"));
                continue;
            }
        };
        let rewritten = rewrite_references(&text, moves);
        if !rewritten.changed {
            outcomes.push(unit, Outcome::SkippedUnchanged);
            continue;
        }
        match persist_document(path, rewritten.text.as_bytes()) {
            Ok(()) => outcomes.push(
                unit,
                Outcome::ReferenceRewritten {
                    count: rewritten.rewritten,
                },
            ),
            Err(err) => {
                outcomes.push(
                    unit.clone(),
                    Outcome::Failed {
                        reason: format!("{err}"),
                    },
                );
                report.issue(format!("{unit}: {err}"));
            }
        }
    }
    Ok(())
}
