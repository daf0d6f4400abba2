use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::layout::normalize_path;

/// Paths the editor itself has just written, tracked over two generations.
///
/// Write completion and the watcher callback are not ordered within a tick, so a
/// flagged path stays ignored for at least one full tick and at most two.
#[derive(Debug, Default)]
pub struct EditorModifiedSet {
    current: HashSet<PathBuf>,
    previous: HashSet<PathBuf>,
}

impl EditorModifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as written by the editor. Re-flagging a path keeps it alive for
    /// another full tick.
    pub fn flag(&mut self, path: &Path) {
        if path.as_os_str().is_empty() {
            return;
        }
        let full = normalize_path(path);
        self.previous.remove(&full);
        self.current.insert(full);
    }

    /// Whether a change notification on `path` should be ignored.
    pub fn is_flagged(&self, path: &Path) -> bool {
        self.current.contains(&normalize_path(path))
    }

    /// Advance one tick: drop every path that was not re-flagged since the last
    /// rotation, then remember what is flagged right now.
    pub fn rotate(&mut self) {
        for path in &self.previous {
            self.current.remove(path);
        }
        self.previous = self.current.clone();
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_survives_first_rotation_only() {
        let mut set = EditorModifiedSet::new();
        let path = Path::new("/project/Data/A.res");
        set.flag(path);
        assert!(set.is_flagged(path));

        set.rotate();
        assert!(set.is_flagged(path), "still ignored during the next tick");

        set.rotate();
        assert!(!set.is_flagged(path), "expired after the second generation");
    }

    #[test]
    fn test_reflag_extends_lifetime() {
        let mut set = EditorModifiedSet::new();
        let path = Path::new("/project/Data/A.res");
        set.flag(path);
        set.rotate();
        set.flag(path);
        set.rotate();
        assert!(set.is_flagged(path));
        set.rotate();
        assert!(!set.is_flagged(path));
    }

    #[test]
    fn test_paths_are_normalized() {
        let mut set = EditorModifiedSet::new();
        set.flag(Path::new("/project/Data/./Sub/../A.res"));
        assert!(set.is_flagged(Path::new("/project/Data/A.res")));
    }

    #[test]
    fn test_empty_path_is_ignored() {
        let mut set = EditorModifiedSet::new();
        set.flag(Path::new(""));
        set.rotate();
        assert!(set.current.is_empty());
    }
}
