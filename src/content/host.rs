use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::info;

use super::Resource;
use crate::config::ReloadPolicy;

/// How the currently open scene is held by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SceneMode {
    #[default]
    None,
    /// Open from a file and editable normally.
    Saved(String),
    /// Open in an isolated sandbox session whose in-memory changes are discarded
    /// on exit; rewrites must go to the file directly.
    Sandbox(String),
    /// Never saved; only exists in memory.
    RuntimeOnly,
}

/// The editor around the reconciliation engine: what is open, what is unsaved,
/// and where user-facing decisions and notifications go.
pub trait EditorHost {
    /// Whether `path` is the content currently open for editing.
    fn is_active_content(&self, path: &str) -> bool;

    fn has_unsaved_changes(&self, path: &str) -> bool;

    /// Ask whether an externally changed item with local state may be reloaded.
    fn confirm_reload(&mut self, path: &str) -> bool;

    /// The active item was evicted after a confirmed reload; open it again.
    fn reload_active(&mut self, path: &str);

    fn scene_mode(&self) -> SceneMode;

    /// Run `rewrite` on the in-memory scene if there is one. Returns its result,
    /// or 0 when no runtime scene exists.
    fn rewrite_runtime_scene(
        &mut self,
        rewrite: &mut dyn FnMut(&mut Resource) -> usize,
    ) -> usize;

    /// The in-memory scene had its properties changed.
    fn runtime_scene_modified(&mut self);

    /// Cached content items had their properties changed in place.
    fn content_modified(&mut self, paths: &[String]);

    /// Re-import the given shadow source files.
    fn reimport(&mut self, paths: Vec<PathBuf>);
}

/// State behind a [`HeadlessHost`]. Inputs are set by the embedder; the rest
/// records what the engine asked the host to do.
#[derive(Debug, Default)]
pub struct HostState {
    pub policy: ReloadPolicy,
    pub active: Option<String>,
    pub unsaved: HashSet<String>,
    pub scene: SceneMode,
    pub runtime_scene: Option<Resource>,

    pub reload_prompts: Vec<String>,
    pub reloaded: Vec<String>,
    pub modified: Vec<String>,
    pub runtime_scene_notifications: usize,
    pub reimported: Vec<PathBuf>,
}

/// Non-interactive [`EditorHost`]. Clones share state, so an embedder can keep a
/// handle after giving one to the engine.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    state: Rc<RefCell<HostState>>,
}

impl HeadlessHost {
    pub fn new(policy: ReloadPolicy) -> Self {
        let host = Self::default();
        host.state_mut().policy = policy;
        host
    }

    pub fn state(&self) -> Ref<'_, HostState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, HostState> {
        self.state.borrow_mut()
    }
}

impl EditorHost for HeadlessHost {
    fn is_active_content(&self, path: &str) -> bool {
        self.state().active.as_deref() == Some(path)
    }

    fn has_unsaved_changes(&self, path: &str) -> bool {
        self.state().unsaved.contains(path)
    }

    fn confirm_reload(&mut self, path: &str) -> bool {
        let mut state = self.state_mut();
        state.reload_prompts.push(path.to_owned());
        state.policy == ReloadPolicy::Always
    }

    fn reload_active(&mut self, path: &str) {
        let mut state = self.state_mut();
        state.unsaved.remove(path);
        state.reloaded.push(path.to_owned());
    }

    fn scene_mode(&self) -> SceneMode {
        self.state().scene.clone()
    }

    fn rewrite_runtime_scene(
        &mut self,
        rewrite: &mut dyn FnMut(&mut Resource) -> usize,
    ) -> usize {
        match self.state_mut().runtime_scene.as_mut() {
            Some(scene) => rewrite(scene),
            None => 0,
        }
    }

    fn runtime_scene_modified(&mut self) {
        self.state_mut().runtime_scene_notifications += 1;
    }

    fn content_modified(&mut self, paths: &[String]) {
        let mut state = self.state_mut();
        for path in paths {
            state.unsaved.insert(path.clone());
        }
        state.modified.extend(paths.iter().cloned());
    }

    fn reimport(&mut self, paths: Vec<PathBuf>) {
        for path in &paths {
            info!(path = %path.display(), "re-import requested");
        }
        self.state_mut().reimported.extend(paths);
    }
}
