use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::content::TrashSink;
use crate::layout::is_path_located_in;

/// Remove `dir` if it holds no files. With `recursive`, empty subdirectories are
/// removed first. Only directories strictly inside `boundary` are touched.
/// Best effort: returns whether `dir` was removed.
pub fn delete_empty_dir(dir: &Path, recursive: bool, boundary: &Path) -> bool {
    if !dir.is_dir() || !is_path_located_in(dir, boundary) || dir == boundary {
        return false;
    }

    if recursive && let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                delete_empty_dir(&path, true, boundary);
            }
        }
    }

    let is_empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
    is_empty && fs::remove_dir(dir).is_ok()
}

/// Move a shadow file to mirror its content item's move. Skipped when the
/// source is missing or the destination already exists.
pub fn move_source_file(old: &Path, new: &Path, boundary: &Path) -> bool {
    if old == new {
        return false;
    }
    if !old.is_file() || new.exists() {
        debug!(from = %old.display(), to = %new.display(), "skipping shadow file move");
        return false;
    }

    if let Err(err) = mirror_move(old, new) {
        warn!(from = %old.display(), to = %new.display(), "shadow file move failed: {err}");
        return false;
    }
    if let Some(parent) = old.parent() {
        delete_empty_dir(parent, true, boundary);
    }
    true
}

/// Move a shadow directory to mirror a data directory's move, with the same
/// guards as [`move_source_file`].
pub fn move_source_dir(old: &Path, new: &Path, boundary: &Path) -> bool {
    if old == new {
        return false;
    }
    if !old.is_dir() || new.exists() {
        debug!(from = %old.display(), to = %new.display(), "skipping shadow directory move");
        return false;
    }

    if let Err(err) = mirror_move(old, new) {
        warn!(from = %old.display(), to = %new.display(), "shadow directory move failed: {err}");
        return false;
    }
    if let Some(parent) = old.parent() {
        delete_empty_dir(parent, true, boundary);
    }
    true
}

fn mirror_move(old: &Path, new: &Path) -> std::io::Result<()> {
    if let Some(parent) = new.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(old, new)
}

/// Send all scheduled shadow paths to the trash in one batch, then remove the
/// parent directories that became empty.
pub fn trash_scheduled(schedule: &BTreeSet<PathBuf>, trash: &mut dyn TrashSink, boundary: &Path) {
    if schedule.is_empty() {
        return;
    }

    let affected: BTreeSet<PathBuf> = schedule
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();

    let batch: Vec<PathBuf> = schedule.iter().cloned().collect();
    if let Err(err) = trash.send(&batch) {
        warn!("trashing shadow files: {err:#}");
    }

    for dir in affected {
        delete_empty_dir(&dir, true, boundary);
    }
}
