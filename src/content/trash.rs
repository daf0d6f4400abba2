use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Reversible delete: accepts a batch of files or directories to get rid of.
pub trait TrashSink {
    fn send(&mut self, paths: &[PathBuf]) -> anyhow::Result<()>;
}

/// [`TrashSink`] that moves each batch into its own subdirectory of a trash
/// directory, keeping paths relative to the project root.
#[derive(Debug, Clone)]
pub struct TrashDir {
    root: PathBuf,
    dir: PathBuf,
}

impl TrashDir {
    pub fn new(root: &Path, dir: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dir: dir.to_path_buf(),
        }
    }
}

impl TrashSink for TrashDir {
    fn send(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let batch_dir = self.dir.join(stamp.to_string());

        let mut failed = 0usize;
        for path in paths {
            if !path.exists() {
                continue;
            }
            let relative = path
                .strip_prefix(&self.root)
                .ok()
                .map(Path::to_path_buf)
                .or_else(|| path.file_name().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("unnamed"));
            let target = batch_dir.join(relative);

            let moved = target
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| std::fs::rename(path, &target));
            if let Err(err) = moved {
                warn!(path = %path.display(), "could not move to trash: {err}");
                failed += 1;
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} paths could not be moved to trash", paths.len());
        }
        Ok(())
    }
}
