pub mod buffer;
pub mod coalesce;
pub mod event;
pub mod self_write;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::event::{EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, warn};

use crate::layout::Layout;

use event::RawNotification;

/// The watched roots of a project. Each root has its own buffer and is
/// reconciled differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchRoot {
    /// The primary content tree.
    Data,
    /// The shadow source-media tree.
    Source,
    /// Directories holding plugin binaries.
    Plugin,
}

/// Handle to the running subscriptions. Dropping it stops watching.
pub struct WatcherHandle {
    _watchers: Vec<RecommendedWatcher>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("watchers", &self._watchers.len())
            .finish()
    }
}

/// Subscribe to every watched root of `layout`.
///
/// The data tree must exist. Missing source or plugin roots are skipped with a
/// warning. Events arrive on the returned receiver tagged with their root, still
/// in notify's shape; feed them through a [`Translator`] per root.
pub fn start_watchers(
    layout: &Layout,
) -> anyhow::Result<(WatcherHandle, tokio_mpsc::Receiver<(WatchRoot, notify::Event)>)> {
    let (tx, rx) = tokio_mpsc::channel::<(WatchRoot, notify::Event)>(1024);

    let mut roots = vec![(WatchRoot::Data, layout.data_dir.clone())];
    roots.push((WatchRoot::Source, layout.source_media_dir.clone()));
    roots.extend(layout.plugin_dirs.iter().map(|d| (WatchRoot::Plugin, d.clone())));

    let mut watchers = Vec::with_capacity(roots.len());
    for (root, dir) in roots {
        if !dir.is_dir() {
            if root == WatchRoot::Data {
                anyhow::bail!("data directory {} does not exist", dir.display());
            }
            warn!(dir = %dir.display(), "not watching missing {root:?} directory");
            continue;
        }

        let tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    // Receiver dropped means the session is shutting down.
                    let _ = tx.blocking_send((root, event));
                }
                Err(err) => warn!("watcher error on {root:?}: {err}"),
            }
        })
        .with_context(|| format!("failed to create watcher for {}", dir.display()))?;
        watcher
            .watch(&dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        debug!(dir = %dir.display(), "watching {root:?}");
        watchers.push(watcher);
    }

    Ok((
        WatcherHandle {
            _watchers: watchers,
        },
        rx,
    ))
}

/// Turns notify events of one root into [`RawNotification`]s.
///
/// Platforms report renames differently: inotify sends `From`, `To` and then a
/// combined `Both`; Windows sends an adjacent `From`/`To` pair. Both collapse to
/// a single rename here. A `From` whose partner never arrives (moved out of the
/// watched tree) becomes a deletion on the next event or [`Translator::flush`].
///
/// Known directories are tracked so deletions can carry a directory hint even
/// when the platform does not say what was removed.
#[derive(Debug, Default)]
pub struct Translator {
    known_dirs: HashSet<PathBuf>,
    pending_from: Option<(PathBuf, Option<usize>)>,
    pending_is_stale: bool,
    last_rename: Option<(PathBuf, PathBuf)>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A translator that already knows every directory below `root`.
    pub fn with_known_dirs(root: &Path) -> Self {
        let mut translator = Self::new();
        let walker = ignore::WalkBuilder::new(root)
            .standard_filters(false)
            .build();
        for entry in walker.flatten() {
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                translator.known_dirs.insert(entry.into_path());
            }
        }
        translator
    }

    pub fn translate(&mut self, event: &notify::Event) -> Vec<RawNotification> {
        let mut out = Vec::new();

        let is_rename_half = matches!(
            event.kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        );
        if !is_rename_half {
            out.extend(self.flush());
        }

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                if let Some(from) = event.paths.first() {
                    self.pending_from = Some((from.clone(), event.attrs.tracker()));
                    self.pending_is_stale = false;
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let Some(to) = event.paths.first() else {
                    return out;
                };
                match self.pending_from.take() {
                    Some((from, tracker)) if tracker == event.attrs.tracker() => {
                        self.last_rename = Some((from.clone(), to.clone()));
                        out.push(self.renamed(&from, to));
                    }
                    unpaired => {
                        self.pending_from = unpaired;
                        out.extend(self.flush());
                        out.push(self.created(to));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let [from, to] = &event.paths[..] else {
                    return out;
                };
                let pair = (from.clone(), to.clone());
                if self.last_rename.as_ref() == Some(&pair) {
                    self.last_rename = None;
                } else {
                    out.extend(self.flush());
                    out.push(self.renamed(from, to));
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &event.paths {
                    if path.exists() {
                        out.push(self.created(path));
                    } else {
                        out.push(self.deleted(path, false));
                    }
                }
            }
            EventKind::Create(_) => {
                out.extend(event.paths.iter().map(|p| self.created(p)));
            }
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
                out.extend(event.paths.iter().cloned().map(RawNotification::changed));
            }
            EventKind::Remove(kind) => {
                let is_folder = kind == RemoveKind::Folder;
                for path in &event.paths {
                    out.push(self.deleted(path, is_folder));
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_))
            | EventKind::Access(_)
            | EventKind::Any
            | EventKind::Other => {}
        }

        out
    }

    /// Report an unpaired rename source as deleted.
    pub fn flush(&mut self) -> Option<RawNotification> {
        let (from, _) = self.pending_from.take()?;
        Some(self.deleted(&from, false))
    }

    /// Periodic variant of [`flush`](Self::flush): a pending `From` is only
    /// given up once it has already survived one call, so its `To` still has
    /// a full period to arrive.
    pub fn flush_stale(&mut self) -> Option<RawNotification> {
        self.pending_from.as_ref()?;
        if !self.pending_is_stale {
            self.pending_is_stale = true;
            return None;
        }
        self.flush()
    }

    fn created(&mut self, path: &Path) -> RawNotification {
        if path.is_dir() {
            self.known_dirs.insert(path.to_path_buf());
        }
        RawNotification::created(path)
    }

    fn deleted(&mut self, path: &Path, is_folder: bool) -> RawNotification {
        let is_directory = is_folder || self.known_dirs.contains(path);
        self.known_dirs.retain(|d| !d.starts_with(path));
        RawNotification::deleted(path, is_directory)
    }

    fn renamed(&mut self, from: &Path, to: &Path) -> RawNotification {
        let moved: Vec<PathBuf> = self
            .known_dirs
            .iter()
            .filter(|d| d.starts_with(from))
            .cloned()
            .collect();
        for dir in moved {
            self.known_dirs.remove(&dir);
            if let Ok(rest) = dir.strip_prefix(from) {
                self.known_dirs.insert(to.join(rest));
            }
        }
        if to.is_dir() {
            self.known_dirs.insert(to.to_path_buf());
        }
        RawNotification::renamed(from, to)
    }
}
