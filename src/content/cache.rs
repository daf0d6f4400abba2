use std::collections::BTreeMap;

use super::Resource;

/// Path-keyed registry of loaded content. Entries are only ever inserted, removed
/// or moved as a whole.
pub trait ContentCache {
    fn contains(&self, path: &str) -> bool;
    fn get(&self, path: &str) -> Option<&Resource>;
    fn get_mut(&mut self, path: &str) -> Option<&mut Resource>;
    fn insert(&mut self, path: String, resource: Resource);
    fn remove(&mut self, path: &str) -> Option<Resource>;
    /// Remove every entry located in directory `dir`. Returns how many were removed.
    fn remove_tree(&mut self, dir: &str) -> usize;
    /// Move one entry. Returns false if nothing was cached under `old`.
    fn rename(&mut self, old: &str, new: &str) -> bool;
    /// Move every entry located in directory `old` below `new`.
    fn rename_tree(&mut self, old: &str, new: &str) -> usize;
    fn loaded_paths(&self) -> Vec<String>;
}

/// In-memory [`ContentCache`] ordered by content path.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, Resource>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree_keys(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl ContentCache for MemoryCache {
    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn get(&self, path: &str) -> Option<&Resource> {
        self.entries.get(path)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Resource> {
        self.entries.get_mut(path)
    }

    fn insert(&mut self, path: String, resource: Resource) {
        self.entries.insert(path, resource);
    }

    fn remove(&mut self, path: &str) -> Option<Resource> {
        self.entries.remove(path)
    }

    fn remove_tree(&mut self, dir: &str) -> usize {
        let keys = self.tree_keys(dir);
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.entries.remove(old) {
            Some(resource) => {
                self.entries.insert(new.to_owned(), resource);
                true
            }
            None => false,
        }
    }

    fn rename_tree(&mut self, old: &str, new: &str) -> usize {
        let old = old.trim_end_matches('/');
        let new = new.trim_end_matches('/');
        let keys = self.tree_keys(old);
        for key in &keys {
            if let Some(resource) = self.entries.remove(key) {
                let moved = format!("{new}{}", &key[old.len()..]);
                self.entries.insert(moved, resource);
            }
        }
        keys.len()
    }

    fn loaded_paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(paths: &[&str]) -> MemoryCache {
        let mut cache = MemoryCache::new();
        for p in paths {
            cache.insert((*p).to_owned(), Resource::new("Test"));
        }
        cache
    }

    #[test]
    fn test_remove_tree_is_component_wise() {
        let mut cache = cache_with(&["Data/Foo/A.res", "Data/Foo/Sub/B.res", "Data/FooBar/C.res"]);
        assert_eq!(cache.remove_tree("Data/Foo"), 2);
        assert_eq!(cache.loaded_paths(), vec!["Data/FooBar/C.res"]);
    }

    #[test]
    fn test_rename_tree_moves_descendants() {
        let mut cache = cache_with(&["Data/Foo/A.res", "Data/Foo/Sub/B.res", "Data/Other.res"]);
        assert_eq!(cache.rename_tree("Data/Foo", "Data/Bar"), 2);
        assert_eq!(
            cache.loaded_paths(),
            vec!["Data/Bar/A.res", "Data/Bar/Sub/B.res", "Data/Other.res"]
        );
    }

    #[test]
    fn test_rename_missing_entry() {
        let mut cache = cache_with(&["Data/A.res"]);
        assert!(!cache.rename("Data/B.res", "Data/C.res"));
        assert!(cache.rename("Data/A.res", "Data/C.res"));
        assert!(cache.contains("Data/C.res"));
        assert!(!cache.contains("Data/A.res"));
    }
}
