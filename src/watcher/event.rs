use std::path::{Path, PathBuf};

/// The kind of change a notification or semantic event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

/// A watcher notification exactly as delivered, before any reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub kind: ChangeKind,
    /// Current path. For renames this is the new path.
    pub path: PathBuf,
    /// Previous path, only present for renames.
    pub old_path: Option<PathBuf>,
    /// Whether the subscription believes this is a directory. Only consulted for
    /// deletions, where the path can no longer be queried.
    pub is_directory_hint: bool,
}

impl RawNotification {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::plain(ChangeKind::Created, path.into())
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::plain(ChangeKind::Changed, path.into())
    }

    pub fn deleted(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path: path.into(),
            old_path: None,
            is_directory_hint: is_directory,
        }
    }

    pub fn renamed(old_path: impl Into<PathBuf>, new_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: new_path.into(),
            old_path: Some(old_path.into()),
            is_directory_hint: false,
        }
    }

    fn plain(kind: ChangeKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            old_path: None,
            is_directory_hint: false,
        }
    }

    /// The previous path of a rename, or the current path for everything else.
    pub fn source_path(&self) -> &Path {
        self.old_path.as_deref().unwrap_or(&self.path)
    }
}

/// A classified, de-duplicated change produced by the coalescer.
///
/// `old_path` equals `path` for everything except renames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub old_path: PathBuf,
    pub is_directory: bool,
    pub kind: ChangeKind,
}

impl FileEvent {
    pub fn new(kind: ChangeKind, path: PathBuf, is_directory: bool) -> Self {
        debug_assert!(kind != ChangeKind::Renamed, "renames need an old path");
        Self {
            old_path: path.clone(),
            path,
            is_directory,
            kind,
        }
    }

    pub fn renamed(old_path: PathBuf, path: PathBuf, is_directory: bool) -> Self {
        Self {
            path,
            old_path,
            is_directory,
            kind: ChangeKind::Renamed,
        }
    }
}
