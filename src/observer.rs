use std::path::{Path, PathBuf};

use crate::watcher::event::{ChangeKind, FileEvent};

/// Notification about a content file or directory in the data tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    Created {
        path: PathBuf,
        is_directory: bool,
    },
    Deleted {
        path: PathBuf,
        is_directory: bool,
    },
    Modified {
        path: PathBuf,
        is_directory: bool,
    },
    Renamed {
        path: PathBuf,
        old_path: PathBuf,
        is_directory: bool,
    },
}

impl From<&FileEvent> for ContentEvent {
    fn from(event: &FileEvent) -> Self {
        let path = event.path.clone();
        let is_directory = event.is_directory;
        match event.kind {
            ChangeKind::Created => ContentEvent::Created { path, is_directory },
            ChangeKind::Deleted => ContentEvent::Deleted { path, is_directory },
            ChangeKind::Changed => ContentEvent::Modified { path, is_directory },
            ChangeKind::Renamed => ContentEvent::Renamed {
                path,
                old_path: event.old_path.clone(),
                is_directory,
            },
        }
    }
}

/// Passed to begin-global-rename hooks before a rename's downstream effects are
/// committed. Any hook may set `cancel`; later hooks see the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginGlobalRename {
    pub path: PathBuf,
    pub old_path: PathBuf,
    pub is_directory: bool,
    pub cancel: bool,
}

type ContentHandler = Box<dyn FnMut(&ContentEvent)>;
type PluginHandler = Box<dyn FnMut(&Path)>;
type RenameHook = Box<dyn FnMut(&mut BeginGlobalRename)>;

/// Registered observers. Each list may be empty and is invoked in registration
/// order.
#[derive(Default)]
pub struct Observers {
    content: Vec<ContentHandler>,
    plugin: Vec<PluginHandler>,
    begin_rename: Vec<RenameHook>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("content", &self.content.len())
            .field("plugin", &self.plugin.len())
            .field("begin_rename", &self.begin_rename.len())
            .finish()
    }
}

impl Observers {
    pub fn on_content(&mut self, handler: impl FnMut(&ContentEvent) + 'static) {
        self.content.push(Box::new(handler));
    }

    pub fn on_plugin_changed(&mut self, handler: impl FnMut(&Path) + 'static) {
        self.plugin.push(Box::new(handler));
    }

    pub fn on_begin_global_rename(&mut self, hook: impl FnMut(&mut BeginGlobalRename) + 'static) {
        self.begin_rename.push(Box::new(hook));
    }

    pub(crate) fn emit_content(&mut self, event: &ContentEvent) {
        for handler in &mut self.content {
            handler(event);
        }
    }

    pub(crate) fn emit_plugin_changed(&mut self, path: &Path) {
        for handler in &mut self.plugin {
            handler(path);
        }
    }

    /// Run every hook and report whether the rename was cancelled.
    pub(crate) fn begin_global_rename(&mut self, event: &FileEvent) -> bool {
        let mut args = BeginGlobalRename {
            path: event.path.clone(),
            old_path: event.old_path.clone(),
            is_directory: event.is_directory,
            cancel: false,
        };
        for hook in &mut self.begin_rename {
            hook(&mut args);
        }
        args.cancel
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.plugin.clear();
        self.begin_rename.clear();
    }
}
