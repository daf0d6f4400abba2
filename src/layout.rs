use std::path::{Component, Path, PathBuf};

use crate::config::SyncConfig;

/// Resolved directory layout of one project.
///
/// Filesystem paths are absolute. Content paths are project-relative and use `/`
/// separators (`Data/Foo/X.res`), which is how content references store them.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub source_dir: PathBuf,
    pub source_media_dir: PathBuf,
    pub plugin_dirs: Vec<PathBuf>,
    pub app_data_file: PathBuf,
    pub user_data_file: PathBuf,
    pub trash_dir: PathBuf,
    content_extension: String,
}

impl Layout {
    pub fn new(root: &Path, config: &SyncConfig) -> Self {
        let root = normalize_path(root);
        Self {
            data_dir: root.join(&config.data_dir),
            source_dir: root.join(&config.source_dir),
            source_media_dir: root.join(&config.source_media_dir),
            plugin_dirs: config.plugin_dirs.iter().map(|d| root.join(d)).collect(),
            app_data_file: root.join(&config.app_data_file),
            user_data_file: root.join(&config.user_data_file),
            trash_dir: root.join(&config.trash_dir),
            content_extension: config.content_extension.trim_start_matches('.').to_owned(),
            root,
        }
    }

    /// Whether `path` names a content file, judged by its extension only.
    pub fn is_content_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.content_extension))
    }

    /// Convert an absolute filesystem path into a content path. Returns `None` for
    /// paths outside the project root.
    pub fn content_path(&self, fs_path: &Path) -> Option<String> {
        let relative = normalize_path(fs_path)
            .strip_prefix(&self.root)
            .ok()?
            .to_path_buf();
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }

    /// Convert a content path back into an absolute filesystem path.
    pub fn fs_path(&self, content_path: &str) -> PathBuf {
        content_path
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// The shadow directory mirroring a directory of the data tree.
    pub fn mirror_dir(&self, data_path: &Path) -> Option<PathBuf> {
        let relative = normalize_path(data_path)
            .strip_prefix(&self.data_dir)
            .ok()?
            .to_path_buf();
        Some(self.source_media_dir.join(relative))
    }

    pub fn is_in_source_media(&self, path: &Path) -> bool {
        is_path_located_in(path, &self.source_media_dir)
    }

    pub fn content_extension(&self) -> &str {
        &self.content_extension
    }
}

/// Make `path` absolute and resolve `.` and `..` lexically, without touching the
/// filesystem (the path may already be gone).
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Component-wise containment: `/a/bc` is not located in `/a/b`.
pub fn is_path_located_in(path: &Path, dir: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(dir))
}

/// Whether any component of `path` below `root` is hidden (dot-prefixed).
pub fn is_hidden(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(s) => s.to_str().is_some_and(|s| s.starts_with('.')),
        _ => false,
    })
}
