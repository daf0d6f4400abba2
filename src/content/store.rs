use std::io::Write;
use std::path::Path;

use anyhow::Context;

use super::Resource;

/// Loads and saves content objects, bypassing the cache.
pub trait ContentStore {
    fn load(&self, path: &Path) -> anyhow::Result<Resource>;
    fn save(&self, path: &Path, resource: &Resource) -> anyhow::Result<()>;
}

/// [`ContentStore`] persisting resources as pretty-printed JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStore;

impl ContentStore for JsonStore {
    fn load(&self, path: &Path) -> anyhow::Result<Resource> {
        let contents =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Writes to a temp file next to the target, then renames it in place.
    fn save(&self, path: &Path, resource: &Resource) -> anyhow::Result<()> {
        let dir = path
            .parent()
            .with_context(|| format!("{} has no parent directory", path.display()))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, resource)?;
        tmp.as_file().flush()?;
        tmp.persist(path)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
