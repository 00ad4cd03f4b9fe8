//! Append-only record of everything a run did. Entries are never mutated
//! after they are appended; the CLI renders them and mirrors them into a
//! JSONL ledger so partial runs stay auditable.

use crate::migrate::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Recovered { encoding: String, lossy: bool },
    NoConversionNeeded,
    DeclarationNormalized,
    AssetMoved { dest: String },
    AssetDuplicateSkipped { dest: String },
    AssetRenamed { dest: String },
    ReferenceRewritten { count: usize },
    SkippedUnchanged,
    Failed { reason: String },
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Recovered { .. } => "recovered",
            Self::NoConversionNeeded => "no-conversion-needed",
            Self::DeclarationNormalized => "declaration-normalized",
            Self::AssetMoved { .. } => "asset-moved",
            Self::AssetDuplicateSkipped { .. } => "asset-duplicate-skipped",
            Self::AssetRenamed { .. } => "asset-renamed",
            Self::ReferenceRewritten { .. } => "reference-rewritten",
            Self::SkippedUnchanged => "skipped-unchanged",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub unit: String,
    pub at_epoch_secs: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    entries: Vec<ReportEntry>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: impl Into<String>, outcome: Outcome) {
        self.entries.push(ReportEntry {
            unit: unit.into(),
            at_epoch_secs: now_epoch_secs().unwrap_or(0),
            outcome,
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| match &entry.outcome {
                Outcome::Recovered { encoding, lossy } if *lossy => {
                    format!("recovered {} from={encoding} (partial)", entry.unit)
                }
                Outcome::Recovered { encoding, .. } => {
                    format!("recovered {} from={encoding}", entry.unit)
                }
                Outcome::AssetMoved { dest }
                | Outcome::AssetRenamed { dest }
                | Outcome::AssetDuplicateSkipped { dest } => {
                    format!("{} {} -> {dest}", entry.outcome.tag(), entry.unit)
                }
                Outcome::ReferenceRewritten { count } => {
                    format!("reference-rewritten {} sites={count}", entry.unit)
                }
                Outcome::Failed { reason } => format!("failed {}: {reason}", entry.unit),
                other => format!("{} {}", other.tag(), entry.unit),
            })
            .collect()
    }
}

pub fn ledger_path(work_root: &Path) -> PathBuf {
    work_root.join(".site-recode").join("report.jsonl")
}

pub fn append_to_ledger(path: &Path, report: &MigrationReport) -> Result<()> {
    if report.entries.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut out = String::new();
    for entry in &report.entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(out.as_bytes())
        .with_context(|| format!("failed to append {}", path.display()))?;
    Ok(())
}
