use std::path::{Path, PathBuf};

use crate::layout::Layout;

/// Resolves which shadow-tree source files belong to a content item.
pub trait SourceMapper {
    /// Existing source files of the content item at `content_path`.
    fn source_files(&self, content_path: &str) -> Vec<PathBuf>;

    /// Where `source` should live once its content item moved from `old_content`
    /// to `new_content`.
    fn relocate(&self, source: &Path, old_content: &str, new_content: &str) -> PathBuf;
}

/// [`SourceMapper`] for a shadow tree that mirrors the data tree: the sources of
/// `Data/a/X.Kind.res` are the files in `<source media>/a/` named `X` or `X.*`.
#[derive(Debug, Clone)]
pub struct MirrorMapper {
    layout: Layout,
}

impl MirrorMapper {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn mirror_parent(&self, content_path: &str) -> Option<PathBuf> {
        let fs_path = self.layout.fs_path(content_path);
        self.layout.mirror_dir(fs_path.parent()?)
    }
}

/// `Hero.Pixmap.res` yields `Hero`.
fn base_name(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    Some(name.split('.').next().unwrap_or(name))
}

impl SourceMapper for MirrorMapper {
    fn source_files(&self, content_path: &str) -> Vec<PathBuf> {
        let Some(dir) = self.mirror_parent(content_path) else {
            return Vec::new();
        };
        let Some(base) = base_name(Path::new(content_path)) else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n == base || n.starts_with(&format!("{base}.")))
            })
            .collect();
        files.sort();
        files
    }

    fn relocate(&self, source: &Path, old_content: &str, new_content: &str) -> PathBuf {
        let (Some(new_dir), Some(old_base), Some(new_base), Some(name)) = (
            self.mirror_parent(new_content),
            base_name(Path::new(old_content)),
            base_name(Path::new(new_content)),
            source.file_name().and_then(|n| n.to_str()),
        ) else {
            return source.to_path_buf();
        };

        let suffix = name.strip_prefix(old_base).unwrap_or("");
        new_dir.join(format!("{new_base}{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use std::fs;

    #[test]
    fn test_source_files_match_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), &SyncConfig::default());
        let media = layout.source_media_dir.join("Sprites");
        fs::create_dir_all(&media).unwrap();
        fs::write(media.join("Hero.png"), "").unwrap();
        fs::write(media.join("Hero.psd"), "").unwrap();
        fs::write(media.join("Heroine.png"), "").unwrap();

        let mapper = MirrorMapper::new(layout.clone());
        let files = mapper.source_files("Data/Sprites/Hero.Pixmap.res");
        assert_eq!(files, vec![media.join("Hero.png"), media.join("Hero.psd")]);
    }

    #[test]
    fn test_relocate_keeps_source_extension() {
        let layout = Layout::new(Path::new("/p"), &SyncConfig::default());
        let mapper = MirrorMapper::new(layout);
        let moved = mapper.relocate(
            Path::new("/p/Source/Media/Sprites/Hero.png"),
            "Data/Sprites/Hero.Pixmap.res",
            "Data/Chars/Knight.Pixmap.res",
        );
        assert_eq!(moved, PathBuf::from("/p/Source/Media/Chars/Knight.png"));
    }
}
