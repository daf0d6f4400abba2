use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SyncConfig;
use crate::layout::Layout;

/// Walk the data tree and collect every content file, sorted by path.
///
/// Hidden entries are skipped, and so is anything matching `config.exclude`.
/// `.gitignore` rules are not applied: ignored content is still content.
pub fn walk_content_files(layout: &Layout, config: &SyncConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !layout.data_dir.is_dir() {
        return files;
    }

    let walker = ignore::WalkBuilder::new(&layout.data_dir)
        .standard_filters(false)
        .hidden(true)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("walking content files: {err}");
                continue;
            }
        };

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        if !layout.is_content_file(path) || config.is_excluded(relative(path, &layout.root)) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    files
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_walk_finds_only_content_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), &SyncConfig::default());
        fs::create_dir_all(layout.data_dir.join("Sub")).unwrap();
        fs::create_dir_all(layout.data_dir.join(".hidden")).unwrap();
        fs::write(layout.data_dir.join("A.res"), "{}").unwrap();
        fs::write(layout.data_dir.join("Sub/B.Material.res"), "{}").unwrap();
        fs::write(layout.data_dir.join("notes.txt"), "").unwrap();
        fs::write(layout.data_dir.join(".hidden/C.res"), "{}").unwrap();

        let files = walk_content_files(&layout, &SyncConfig::default());
        assert_eq!(
            files,
            vec![
                layout.data_dir.join("A.res"),
                layout.data_dir.join("Sub/B.Material.res"),
            ]
        );
    }

    #[test]
    fn test_walk_respects_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            exclude: vec!["Backup".into()],
            ..Default::default()
        };
        let layout = Layout::new(dir.path(), &config);
        fs::create_dir_all(layout.data_dir.join("Backup")).unwrap();
        fs::write(layout.data_dir.join("A.res"), "{}").unwrap();
        fs::write(layout.data_dir.join("Backup/A.res"), "{}").unwrap();

        let files = walk_content_files(&layout, &config);
        assert_eq!(files, vec![layout.data_dir.join("A.res")]);
    }

    #[test]
    fn test_walk_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), &SyncConfig::default());
        assert!(walk_content_files(&layout, &SyncConfig::default()).is_empty());
    }
}
