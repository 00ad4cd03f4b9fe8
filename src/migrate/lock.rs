//! One run at a time: documents and assets are processed strictly
//! sequentially, and the lock keeps a second invocation from interleaving
//! filesystem mutation with an in-flight run.

use crate::error::MigrateError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

pub fn lock_path(work_root: &Path) -> PathBuf {
    work_root.join(".site-recode").join("run.lock")
}

pub fn acquire(work_root: &Path) -> Result<RunLock> {
    let path = lock_path(work_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.try_lock_exclusive()
        .map_err(|_| MigrateError::RunLocked(path.display().to_string()))?;
    Ok(RunLock { file, path })
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
