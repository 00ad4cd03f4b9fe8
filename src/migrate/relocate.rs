//! Moves assets to their canonical destination. The only module allowed to
//! mutate directory layout; re-runnable over a partially migrated tree, so a
//! destination that already exists is steady-state, never an error.

use crate::migrate::util::{file_hash, move_file, rel_id};
use crate::migrate::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Exact-identifier rewrite of references.
    File,
    /// Path-prefix rewrite: covers every reference under the old directory.
    DirPrefix,
}

/// How a move was resolved against the destination. Rewrite-only moves
/// (rename-map entries, already-migrated sources) carry no resolution of
/// their own; callers report those directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResolution {
    Moved,
    /// Destination already held byte-identical content; source deleted.
    DuplicateSkipped,
    /// Destination held different content; a numeric suffix was allocated.
    Renamed,
}

/// One relocation, consumed by the reference rewriter.
/// `old`/`new` are reference-visible identifiers relative to the work root.
#[derive(Debug, Clone)]
pub struct AssetMove {
    pub old: String,
    pub new: String,
    pub kind: MoveKind,
}

#[derive(Debug, Clone)]
pub struct DirRelocateOutcome {
    pub prefix_move: AssetMove,
    pub resolution: MoveResolution,
    pub children_moved: usize,
    pub duplicates_removed: usize,
    /// Children left behind because the destination held different content.
    pub leftovers: usize,
}

/// Canonical destination file name: slugified stem plus lower-cased extension.
pub fn canonical_file_name(name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let slug = sanitize_slug(stem);
    let base = if slug.is_empty() { "asset".to_string() } else { slug };
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{base}.{}", ext.to_ascii_lowercase()),
        None => base,
    }
}

/// Case-folded, non-alphanumeric runs collapsed to a single separator.
pub fn sanitize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// First unused `stem_N.ext` under `dir`.
fn suffixed_destination(dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());
    let mut i = 1usize;
    loop {
        let candidate = match ext {
            Some(ext) => dir.join(format!("{stem}_{i}.{ext}")),
            None => dir.join(format!("{stem}_{i}")),
        };
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

/// Three-tier collision policy: absent → move; identical → drop source;
/// different → move under a suffixed name. Never deletes non-duplicate
/// destination content, never loses source content.
fn place_file(source: &Path, dest: &Path) -> Result<(PathBuf, MoveResolution)> {
    if source == dest {
        return Ok((dest.to_path_buf(), MoveResolution::DuplicateSkipped));
    }
    if !dest.exists() {
        move_file(source, dest)?;
        return Ok((dest.to_path_buf(), MoveResolution::Moved));
    }

    let from_hash = file_hash(source)?;
    let to_hash = file_hash(dest)?;
    if from_hash == to_hash {
        fs::remove_file(source)
            .with_context(|| format!("failed to remove {}", source.display()))?;
        return Ok((dest.to_path_buf(), MoveResolution::DuplicateSkipped));
    }

    let dest_name = dest
        .file_name()
        .and_then(|s| s.to_str())
        .context("destination has no file name")?
        .to_string();
    let parent = dest.parent().context("destination has no parent")?;
    let suffixed = suffixed_destination(parent, &dest_name);
    move_file(source, &suffixed)?;
    Ok((suffixed, MoveResolution::Renamed))
}

pub fn relocate_file(
    work_root: &Path,
    source: &Path,
    dest_root: &Path,
) -> Result<(AssetMove, MoveResolution)> {
    let name = source
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("source has no file name: {}", source.display()))?;
    let dest = dest_root.join(canonical_file_name(name));
    let (final_dest, resolution) = place_file(source, &dest)?;
    Ok((
        AssetMove {
            old: rel_id(work_root, source),
            new: rel_id(work_root, &final_dest),
            kind: MoveKind::File,
        },
        resolution,
    ))
}

/// Relocate the immediate contents of `source` into
/// `dest_root/<slug(source name)>/`, then remove the emptied source
/// directory. A non-empty leftover is warned about and left intact.
pub fn relocate_dir(
    work_root: &Path,
    source: &Path,
    dest_root: &Path,
) -> Result<DirRelocateOutcome> {
    let name = source
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("source has no directory name: {}", source.display()))?;
    let slug = sanitize_slug(name);
    let dest_dir = dest_root.join(if slug.is_empty() { "assets" } else { slug.as_str() });
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut outcome = DirRelocateOutcome {
        prefix_move: AssetMove {
            old: format!("{}/", rel_id(work_root, source)),
            new: format!("{}/", rel_id(work_root, &dest_dir)),
            kind: MoveKind::DirPrefix,
        },
        resolution: MoveResolution::Moved,
        children_moved: 0,
        duplicates_removed: 0,
        leftovers: 0,
    };

    let read_dir =
        fs::read_dir(source).with_context(|| format!("failed to read {}", source.display()))?;
    for entry in read_dir {
        let child = entry?.path();
        let Some(child_name) = child.file_name().map(|v| v.to_owned()) else {
            outcome.leftovers += 1;
            continue;
        };
        let target = dest_dir.join(&child_name);

        if child.is_dir() {
            if target.exists() {
                outcome.leftovers += 1;
            } else {
                move_file(&child, &target)?;
                outcome.children_moved += 1;
            }
            continue;
        }

        if target.exists() {
            if file_hash(&child)? == file_hash(&target)? {
                fs::remove_file(&child)
                    .with_context(|| format!("failed to remove {}", child.display()))?;
                outcome.duplicates_removed += 1;
            } else {
                outcome.leftovers += 1;
            }
        } else {
            move_file(&child, &target)?;
            outcome.children_moved += 1;
        }
    }

    match fs::remove_dir(source) {
        Ok(_) => {}
        Err(_) => {
            warn::emit(WarnEvent {
                code: "DIR_NOT_EMPTY_AFTER_MOVE",
                stage: "relocate",
                unit: &outcome.prefix_move.old,
                detail: "source directory still has entries; left intact",
            });
        }
    }

    if outcome.children_moved == 0 && outcome.duplicates_removed > 0 && outcome.leftovers == 0 {
        outcome.resolution = MoveResolution::DuplicateSkipped;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn slug_and_canonical_name_are_stable() {
        assert_eq!(sanitize_slug("ENT1-P1_files"), "ent1-p1-files");
        assert_eq!(canonical_file_name("My Photo.JPG"), "my-photo.jpg");
        assert_eq!(canonical_file_name("photo.jpg"), "photo.jpg");
    }

    #[test]
    fn absent_destination_moves_directly() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("Old Photo.jpg");
        fs::write(&source, b"bytes").expect("write");
        let dest_root = tmp.path().join("images");

        let (mv, resolution) = relocate_file(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(resolution, MoveResolution::Moved);
        assert_eq!(mv.new, "images/old-photo.jpg");
        assert!(!source.exists());
        assert!(dest_root.join("old-photo.jpg").exists());
    }

    #[test]
    fn identical_destination_drops_the_source() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"same").expect("write");
        let dest_root = tmp.path().join("images");
        fs::create_dir_all(&dest_root).expect("mkdir");
        fs::write(dest_root.join("photo.jpg"), b"same").expect("write dest");

        let (_, resolution) = relocate_file(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(resolution, MoveResolution::DuplicateSkipped);
        assert!(!source.exists());
        assert_eq!(fs::read(dest_root.join("photo.jpg")).unwrap(), b"same");
    }

    #[test]
    fn different_destination_allocates_a_suffix() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"new content").expect("write");
        let dest_root = tmp.path().join("images");
        fs::create_dir_all(&dest_root).expect("mkdir");
        fs::write(dest_root.join("photo.jpg"), b"old content").expect("write dest");

        let (mv, resolution) = relocate_file(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(resolution, MoveResolution::Renamed);
        assert_eq!(mv.new, "images/photo_1.jpg");
        assert_eq!(fs::read(dest_root.join("photo.jpg")).unwrap(), b"old content");
        assert_eq!(fs::read(dest_root.join("photo_1.jpg")).unwrap(), b"new content");
    }

    #[test]
    fn directory_contents_move_and_source_is_removed() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("ENT1-P1_files");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("a.jpg"), b"a").expect("write");
        fs::write(source.join("b.png"), b"b").expect("write");
        let dest_root = tmp.path().join("page-assets");

        let outcome = relocate_dir(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(outcome.children_moved, 2);
        assert_eq!(outcome.leftovers, 0);
        assert!(!source.exists());
        assert_eq!(outcome.prefix_move.old, "ENT1-P1_files/");
        assert_eq!(outcome.prefix_move.new, "page-assets/ent1-p1-files/");
        assert!(dest_root.join("ent1-p1-files/a.jpg").exists());
    }

    #[test]
    fn conflicting_child_is_left_in_place_with_source_dir() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("gallery");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("a.jpg"), b"theirs").expect("write");
        let dest_root = tmp.path().join("page-assets");
        fs::create_dir_all(dest_root.join("gallery")).expect("mkdir dest");
        fs::write(dest_root.join("gallery/a.jpg"), b"ours").expect("write dest");

        let outcome = relocate_dir(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(outcome.leftovers, 1);
        assert!(source.join("a.jpg").exists());
        assert_eq!(fs::read(dest_root.join("gallery/a.jpg")).unwrap(), b"ours");
    }

    #[test]
    fn duplicate_children_are_removed_and_dir_resolves_as_skipped() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("gallery");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("a.jpg"), b"same").expect("write");
        let dest_root = tmp.path().join("page-assets");
        fs::create_dir_all(dest_root.join("gallery")).expect("mkdir dest");
        fs::write(dest_root.join("gallery/a.jpg"), b"same").expect("write dest");

        let outcome = relocate_dir(tmp.path(), &source, &dest_root).expect("relocate");
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.resolution, MoveResolution::DuplicateSkipped);
        assert!(!source.exists());
    }
}
