use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, collect_documents, persist_document};
use crate::error::MigrateError;
use crate::migrate::charset::{self, NormalizeAction};
use crate::migrate::config::{RecodeConfig, load_config};
use crate::migrate::lock;
use crate::migrate::recover::{RecoveryOutcome, recover_document};
use crate::migrate::report::{MigrationReport, Outcome, append_to_ledger, ledger_path};
use crate::migrate::util::rel_id;
use crate::migrate::warn::{self, WarnEvent};
use encoding_rs::Encoding;

#[derive(Debug, Clone)]
pub struct RecoverOptions {
    pub work_root: PathBuf,
    pub paths: Vec<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub recursive: bool,
    pub dry_run: bool,
}

pub fn run(opts: &RecoverOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("recover");
    report.detail(format!(
        "started {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    let cfg = load_config(opts.config_path.as_deref(), &opts.work_root)?;
    let lock = lock::acquire(&opts.work_root)?;
    report.detail(format!("lock={}", lock.path().display()));

    let documents = collect_documents(&opts.paths, opts.recursive)?;
    report.detail(format!("documents={}", documents.len()));
    if opts.dry_run {
        report.detail("dry-run: no document will be rewritten".to_string());
    }

    let mut outcomes = MigrationReport::new();
    for path in &documents {
        let unit = rel_id(&opts.work_root, path);
        if let Err(err) = process_document(opts, &cfg, path, &unit, &mut outcomes) {
            outcomes.push(
                unit.clone(),
                Outcome::Failed {
                    reason: format!("{err:#}"),
                },
            );
            report.issue(format!("{unit}: {err:#}"));
        }
    }

    for line in outcomes.lines() {
        report.detail(line);
    }
    if !opts.dry_run {
        append_to_ledger(&ledger_path(&opts.work_root), &outcomes)?;
    }
    Ok(report)
}

/// One unit of work, failure-isolated by the caller: read, recover,
/// normalize the declaration, persist once if anything changed.
fn process_document(
    opts: &RecoverOptions,
    cfg: &RecodeConfig,
    path: &std::path::Path,
    unit: &str,
    outcomes: &mut MigrationReport,
) -> Result<(), anyhow::Error> {
    let bytes = fs::read(path)
        .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", path.display()))?;
    let canonical = Encoding::for_label(cfg.recovery.canonical.as_bytes())
        .unwrap_or(encoding_rs::UTF_8);

    match recover_document(&bytes, unit, &cfg.recovery)? {
        RecoveryOutcome::Recovered(doc) => {
            if doc.ambiguous {
                warn::emit(WarnEvent {
                    code: "AMBIGUOUS_ENCODING",
                    stage: "recover",
                    unit,
                    detail: "tie resolved by candidate order",
                });
            }
            if doc.lossy {
                warn::emit(WarnEvent {
                    code: "PARTIAL_RECOVERY",
                    stage: "recover",
                    unit,
                    detail: "malformed sequences replaced during final decode",
                });
            }
            let normalized =
                charset::normalize_declaration(&doc.text, &cfg.recovery.canonical, &cfg.charset);
            if !opts.dry_run {
                let (encoded, _, _) = canonical.encode(&normalized.text);
                persist_document(path, &encoded).map_err(anyhow_from_write)?;
            }
            outcomes.push(
                unit,
                Outcome::Recovered {
                    encoding: doc.encoding,
                    lossy: doc.lossy,
                },
            );
        }
        RecoveryOutcome::NoConversionNeeded {
            already_canonical, ..
        } => {
            if !already_canonical {
                // Not target-script content and not valid canonical text;
                // rewriting a lossy decode would corrupt it.
                outcomes.push(unit, Outcome::NoConversionNeeded);
                return Ok(());
            }
            let (text, lossy) = canonical.decode_without_bom_handling(&bytes);
            if lossy {
                warn::emit(WarnEvent {
                    code: "PARTIAL_RECOVERY",
                    stage: "recover",
                    unit,
                    detail: "malformed sequences replaced during canonical decode",
                });
            }
            let normalized =
                charset::normalize_declaration(&text, &cfg.recovery.canonical, &cfg.charset);
            if normalized.action == NormalizeAction::Unchanged {
                outcomes.push(unit, Outcome::SkippedUnchanged);
            } else {
                if !opts.dry_run {
                    let (encoded, _, _) = canonical.encode(&normalized.text);
                    persist_document(path, &encoded).map_err(anyhow_from_write)?;
                }
                outcomes.push(unit, Outcome::DeclarationNormalized);
            }
        }
    }
    Ok(())
}

fn anyhow_from_write(err: MigrateError) -> anyhow::Error {
    anyhow::Error::new(err)
}
