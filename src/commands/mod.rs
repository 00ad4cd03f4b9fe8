pub mod recover;
pub mod relocate;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("html") | Some("htm")
    )
}

fn collect_from_dir(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in read_dir {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_from_dir(&path, recursive, out)?;
            }
        } else if is_document(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Expand the caller-supplied paths into the ordered document list. The
/// enumeration lives here, at the collaborator boundary: the core modules
/// never discover files on their own.
pub fn collect_documents(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_from_dir(path, recursive, &mut out)?;
        } else {
            out.push(path.clone());
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// Atomic write-back: a failed write never leaves a half-written document.
pub fn persist_document(path: &Path, bytes: &[u8]) -> Result<(), crate::error::MigrateError> {
    let as_write_failure = |source: std::io::Error| crate::error::MigrateError::WriteFailure {
        path: path.display().to_string(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(as_write_failure)?;
    use std::io::Write;
    tmp.write_all(bytes).map_err(as_write_failure)?;
    tmp.persist(path)
        .map_err(|err| as_write_failure(err.error))?;
    Ok(())
}
