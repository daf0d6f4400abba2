//! Global reference rewrite after content was renamed.
//!
//! A pass walks every place that can hold a content reference (the two
//! configuration objects, the open scene and every content file) and points
//! references at renamed items to their new location. The pass is a state
//! machine advanced one unit of work per [`ReferenceRewriter::step`] call, so a
//! host can interleave it with its own event loop and show progress.
//!
//! A pass is not transactional: files already saved stay saved if the host stops
//! stepping. Per-file failures are logged and collected in the
//! [`RewriteSummary`]; the pass moves on to the next file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::content::{Collaborators, SceneMode, VisitReferences, kind_from_file_name};
use crate::layout::Layout;
use crate::walker::walk_content_files;
use crate::watcher::self_write::EditorModifiedSet;

/// One committed rename, in content paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub old: String,
    pub new: String,
    pub is_directory: bool,
    /// Kind of the renamed item, when it is a file whose name encodes one.
    pub kind: Option<String>,
}

/// Renames collected from one reconciliation pass, rewritten together.
pub type RenameBatch = Vec<RenameEntry>;

/// Point every reference in `target` affected by `batch` at its new location.
/// Returns how many references were changed.
///
/// Default content, explicit nulls and empty paths are left alone. The first
/// matching rename wins for each reference.
pub fn rewrite_references<T: VisitReferences + ?Sized>(
    target: &mut T,
    batch: &[RenameEntry],
) -> usize {
    let mut count = 0;
    target.visit_references(&mut |reference| {
        if reference.is_default_content() {
            return;
        }
        let Some(path) = reference.path.as_mut() else {
            return;
        };
        if path.is_empty() {
            return;
        }

        for entry in batch {
            if !entry.is_directory && *path == entry.old {
                *path = entry.new.clone();
                count += 1;
                break;
            }
            if entry.is_directory
                && let Some(rest) = path.strip_prefix(entry.old.as_str())
                && rest.starts_with('/')
            {
                let moved = format!("{}{rest}", entry.new);
                *path = moved;
                count += 1;
                break;
            }
        }
    });
    count
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AppData,
    UserData,
    ActiveScene,
    ResourceFiles,
    Done,
}

/// What a host can show after each step.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteProgress {
    pub description: String,
    /// Between 0 and 1.
    pub progress: f32,
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteSummary {
    /// References changed, over all objects.
    pub references: usize,
    /// Files saved back to disk.
    pub saved: Vec<PathBuf>,
    /// Cached content changed in place.
    pub cached_modified: Vec<String>,
    /// Files skipped because their kind cannot reference any renamed item.
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Everything a rewrite step needs from its owner.
pub struct RewriteContext<'a> {
    pub layout: &'a Layout,
    pub config: &'a SyncConfig,
    pub env: &'a mut Collaborators,
    pub modified: &'a mut EditorModifiedSet,
}

/// A resumable rewrite pass over one rename batch.
#[derive(Debug)]
pub struct ReferenceRewriter {
    batch: RenameBatch,
    stage: Stage,
    /// Kinds of the renamed items, or `None` when every file must be visited.
    target_kinds: Option<Vec<String>>,
    files: Option<Vec<PathBuf>>,
    next_file: usize,
    progress: f32,
    summary: RewriteSummary,
}

impl ReferenceRewriter {
    pub fn new(batch: RenameBatch) -> Self {
        let target_kinds = if batch.iter().any(|e| e.is_directory) {
            None
        } else {
            batch.iter().map(|e| e.kind.clone()).collect::<Option<Vec<_>>>()
        };

        Self {
            batch,
            stage: Stage::AppData,
            target_kinds,
            files: None,
            next_file: 0,
            progress: 0.0,
            summary: RewriteSummary::default(),
        }
    }

    pub fn batch(&self) -> &[RenameEntry] {
        &self.batch
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn summary(&self) -> &RewriteSummary {
        &self.summary
    }

    /// Perform one unit of work: one configuration object, the open scene, or
    /// one content file.
    pub fn step(&mut self, cx: &mut RewriteContext<'_>) -> RewriteProgress {
        let description = match self.stage {
            Stage::AppData => {
                let path = cx.layout.app_data_file.clone();
                self.rewrite_file(&path, cx);
                self.stage = Stage::UserData;
                self.progress += 0.05;
                "application data".to_owned()
            }
            Stage::UserData => {
                let path = cx.layout.user_data_file.clone();
                self.rewrite_file(&path, cx);
                self.stage = Stage::ActiveScene;
                self.progress += 0.05;
                "user data".to_owned()
            }
            Stage::ActiveScene => {
                self.rewrite_active_scene(cx);
                self.stage = Stage::ResourceFiles;
                "current scene".to_owned()
            }
            Stage::ResourceFiles => self.step_resource_files(cx),
            Stage::Done => "done".to_owned(),
        };

        RewriteProgress {
            description,
            progress: self.progress.min(1.0),
            done: self.is_done(),
        }
    }

    /// Step until done and return the summary.
    pub fn run_to_completion(&mut self, cx: &mut RewriteContext<'_>) -> &RewriteSummary {
        while !self.is_done() {
            self.step(cx);
        }
        &self.summary
    }

    fn step_resource_files(&mut self, cx: &mut RewriteContext<'_>) -> String {
        let files = self
            .files
            .get_or_insert_with(|| walk_content_files(cx.layout, cx.config));

        let Some(file) = files.get(self.next_file).cloned() else {
            self.finish(cx);
            return "done".to_owned();
        };
        let total = files.len();
        self.next_file += 1;

        if self.can_skip(&file, cx) {
            self.summary.skipped += 1;
        } else {
            self.rewrite_content_file(&file, cx);
        }
        self.progress += 0.9 / total as f32;

        file.display().to_string()
    }

    /// Only pure file renames can be filtered by kind; files whose kind is unknown
    /// are always visited.
    fn can_skip(&self, file: &Path, cx: &RewriteContext<'_>) -> bool {
        let (Some(targets), Some(holder)) = (&self.target_kinds, kind_from_file_name(file)) else {
            return false;
        };
        !targets
            .iter()
            .any(|target| cx.env.capability.can_reference(&holder, target))
    }

    fn rewrite_content_file(&mut self, file: &Path, cx: &mut RewriteContext<'_>) {
        let Some(content_path) = cx.layout.content_path(file) else {
            return;
        };

        if let Some(resource) = cx.env.cache.get_mut(&content_path) {
            let count = rewrite_references(resource, &self.batch);
            if count > 0 {
                debug!(path = %content_path, count, "rewrote cached content");
                self.summary.references += count;
                self.summary.cached_modified.push(content_path);
            }
            return;
        }

        self.rewrite_file(file, cx);
    }

    /// Load an uncached file standalone, rewrite it and save it back when
    /// something changed. Configuration objects are always saved.
    fn rewrite_file(&mut self, file: &Path, cx: &mut RewriteContext<'_>) {
        let is_config = file == cx.layout.app_data_file || file == cx.layout.user_data_file;
        if is_config && !file.exists() {
            return;
        }

        let mut resource = match cx.env.store.load(file) {
            Ok(r) => r,
            Err(err) => {
                self.fail(file, err);
                return;
            }
        };

        let count = rewrite_references(&mut resource, &self.batch);
        self.summary.references += count;
        if count == 0 && !is_config {
            return;
        }

        cx.modified.flag(file);
        match cx.env.store.save(file, &resource) {
            Ok(()) => self.summary.saved.push(file.to_path_buf()),
            Err(err) => self.fail(file, err),
        }
    }

    fn rewrite_active_scene(&mut self, cx: &mut RewriteContext<'_>) {
        match cx.env.host.scene_mode() {
            SceneMode::Sandbox(path) => {
                // The sandbox throws its state away on exit, so write the file itself.
                let file = cx.layout.fs_path(&path);
                self.rewrite_file(&file, cx);
            }
            SceneMode::RuntimeOnly => {
                let batch = &self.batch;
                let count = cx
                    .env
                    .host
                    .rewrite_runtime_scene(&mut |scene| rewrite_references(scene, batch));
                if count > 0 {
                    self.summary.references += count;
                    cx.env.host.runtime_scene_modified();
                }
            }
            SceneMode::Saved(_) | SceneMode::None => {}
        }
    }

    fn finish(&mut self, cx: &mut RewriteContext<'_>) {
        if !self.summary.cached_modified.is_empty() {
            cx.env.host.content_modified(&self.summary.cached_modified);
        }
        self.stage = Stage::Done;
        self.progress = 1.0;

        info!(
            renames = self.batch.len(),
            references = self.summary.references,
            saved = self.summary.saved.len(),
            cached = self.summary.cached_modified.len(),
            skipped = self.summary.skipped,
            failures = self.summary.failures.len(),
            "reference rewrite finished"
        );
    }

    fn fail(&mut self, file: &Path, err: anyhow::Error) {
        warn!(path = %file.display(), "reference rewrite failed: {err:#}");
        self.summary
            .failures
            .push((file.to_path_buf(), format!("{err:#}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentRef, ContentStore, Field, HeadlessHost, JsonStore, Resource};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn file_rename(old: &str, new: &str) -> RenameEntry {
        RenameEntry {
            old: old.into(),
            new: new.into(),
            is_directory: false,
            kind: kind_from_file_name(Path::new(new)),
        }
    }

    fn dir_rename(old: &str, new: &str) -> RenameEntry {
        RenameEntry {
            old: old.into(),
            new: new.into(),
            is_directory: true,
            kind: None,
        }
    }

    fn refs(paths: &[Option<&str>]) -> Resource {
        let items = paths
            .iter()
            .map(|p| {
                Field::Ref(ContentRef {
                    path: p.map(str::to_owned),
                })
            })
            .collect();
        Resource::new("Holder").with_field("refs", Field::List(items))
    }

    #[test]
    fn test_exact_file_match_is_rewritten() {
        let mut res = refs(&[Some("Data/A.res"), Some("Data/AB.res")]);
        let count = rewrite_references(&mut res, &[file_rename("Data/A.res", "Data/B.res")]);
        assert_eq!(count, 1);
        assert_eq!(res.reference_paths(), vec!["Data/B.res", "Data/AB.res"]);
    }

    #[test]
    fn test_directory_prefix_is_replaced() {
        let mut res = refs(&[
            Some("Data/Foo/X.res"),
            Some("Data/Foo/Deep/Y.res"),
            Some("Data/FooBar/Z.res"),
            Some("Data/Other/Y.res"),
        ]);
        let count = rewrite_references(&mut res, &[dir_rename("Data/Foo", "Data/Bar")]);
        assert_eq!(count, 2);
        assert_eq!(
            res.reference_paths(),
            vec![
                "Data/Bar/X.res",
                "Data/Bar/Deep/Y.res",
                "Data/FooBar/Z.res",
                "Data/Other/Y.res"
            ]
        );
    }

    #[test]
    fn test_skips_default_null_and_empty() {
        let mut res = refs(&[Some("Default:Data/A.res"), None, Some("")]);
        let batch = [
            file_rename("Default:Data/A.res", "Data/B.res"),
            file_rename("", "Data/C.res"),
        ];
        assert_eq!(rewrite_references(&mut res, &batch), 0);
    }

    #[test]
    fn test_first_match_wins() {
        let mut res = refs(&[Some("Data/A.res")]);
        let batch = [
            file_rename("Data/A.res", "Data/B.res"),
            file_rename("Data/B.res", "Data/C.res"),
        ];
        assert_eq!(rewrite_references(&mut res, &batch), 1);
        assert_eq!(res.reference_paths(), vec!["Data/B.res"]);
    }

    struct Fixture {
        _dir: TempDir,
        layout: Layout,
        config: SyncConfig,
        host: HeadlessHost,
        env: Collaborators,
        modified: EditorModifiedSet,
    }

    impl Fixture {
        fn new(config: SyncConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let layout = Layout::new(dir.path(), &config);
            std::fs::create_dir_all(&layout.data_dir).unwrap();
            let (env, host) = Collaborators::headless(&layout, &config);
            Self {
                _dir: dir,
                layout,
                config,
                host,
                env,
                modified: EditorModifiedSet::new(),
            }
        }

        fn write(&self, content_path: &str, resource: &Resource) {
            JsonStore
                .save(&self.layout.fs_path(content_path), resource)
                .unwrap();
        }

        fn read(&self, content_path: &str) -> Resource {
            JsonStore.load(&self.layout.fs_path(content_path)).unwrap()
        }

        fn run(&mut self, batch: RenameBatch) -> RewriteSummary {
            let mut rewriter = ReferenceRewriter::new(batch);
            let mut cx = RewriteContext {
                layout: &self.layout,
                config: &self.config,
                env: &mut self.env,
                modified: &mut self.modified,
            };
            rewriter.run_to_completion(&mut cx).clone()
        }
    }

    #[test]
    fn test_uncached_files_are_saved_and_flagged() {
        let mut fx = Fixture::new(SyncConfig::default());
        fx.write("Data/Holder.res", &refs(&[Some("Data/A.res")]));
        fx.write("Data/Unrelated.res", &refs(&[Some("Data/Z.res")]));

        let summary = fx.run(vec![file_rename("Data/A.res", "Data/B.res")]);

        assert_eq!(summary.references, 1);
        let holder = fx.layout.fs_path("Data/Holder.res");
        assert_eq!(summary.saved, vec![holder.clone()]);
        assert!(fx.modified.is_flagged(&holder));
        assert_eq!(fx.read("Data/Holder.res").reference_paths(), vec!["Data/B.res"]);
    }

    #[test]
    fn test_cached_content_is_rewritten_in_place() {
        let mut fx = Fixture::new(SyncConfig::default());
        let on_disk = refs(&[Some("Data/A.res")]);
        fx.write("Data/Holder.res", &on_disk);
        fx.env.cache.insert("Data/Holder.res".into(), on_disk.clone());

        let summary = fx.run(vec![file_rename("Data/A.res", "Data/B.res")]);

        assert_eq!(summary.cached_modified, vec!["Data/Holder.res"]);
        assert!(summary.saved.is_empty());
        assert_eq!(fx.read("Data/Holder.res"), on_disk, "file untouched");
        let mut cached = fx.env.cache.get("Data/Holder.res").unwrap().clone();
        assert_eq!(cached.reference_paths(), vec!["Data/B.res"]);
        assert_eq!(fx.host.state().modified, vec!["Data/Holder.res"]);
    }

    #[test]
    fn test_kind_filter_skips_files_that_cannot_reference() {
        let config = SyncConfig {
            references: BTreeMap::from([("Pixmap".to_string(), Vec::new())]),
            ..Default::default()
        };
        let mut fx = Fixture::new(config);
        fx.write("Data/Tex.Pixmap.res", &refs(&[Some("Data/A.Material.res")]));
        fx.write("Data/Unknown.res", &refs(&[Some("Data/A.Material.res")]));

        let summary = fx.run(vec![file_rename("Data/A.Material.res", "Data/B.Material.res")]);

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            fx.read("Data/Tex.Pixmap.res").reference_paths(),
            vec!["Data/A.Material.res"]
        );
        assert_eq!(
            fx.read("Data/Unknown.res").reference_paths(),
            vec!["Data/B.Material.res"]
        );
    }

    #[test]
    fn test_directory_rename_disables_kind_filter() {
        let config = SyncConfig {
            references: BTreeMap::from([("Pixmap".to_string(), Vec::new())]),
            ..Default::default()
        };
        let mut fx = Fixture::new(config);
        fx.write("Data/Tex.Pixmap.res", &refs(&[Some("Data/Foo/A.res")]));

        let summary = fx.run(vec![dir_rename("Data/Foo", "Data/Bar")]);
        assert_eq!(summary.skipped, 0);
        assert_eq!(
            fx.read("Data/Tex.Pixmap.res").reference_paths(),
            vec!["Data/Bar/A.res"]
        );
    }

    #[test]
    fn test_config_objects_are_rewritten_and_saved() {
        let mut fx = Fixture::new(SyncConfig::default());
        JsonStore
            .save(&fx.layout.app_data_file, &refs(&[Some("Data/Start.Scene.res")]))
            .unwrap();

        let summary = fx.run(vec![file_rename("Data/Start.Scene.res", "Data/Intro.Scene.res")]);

        assert!(summary.saved.contains(&fx.layout.app_data_file));
        assert!(!fx.layout.user_data_file.exists());
        let mut app = JsonStore.load(&fx.layout.app_data_file).unwrap();
        assert_eq!(app.reference_paths(), vec!["Data/Intro.Scene.res"]);
    }

    #[test]
    fn test_runtime_scene_is_rewritten_and_notified() {
        let mut fx = Fixture::new(SyncConfig::default());
        {
            let mut state = fx.host.state_mut();
            state.scene = SceneMode::RuntimeOnly;
            state.runtime_scene = Some(refs(&[Some("Data/A.res")]));
        }

        fx.run(vec![file_rename("Data/A.res", "Data/B.res")]);

        let mut state = fx.host.state_mut();
        assert_eq!(state.runtime_scene_notifications, 1);
        let scene = state.runtime_scene.as_mut().unwrap();
        assert_eq!(scene.reference_paths(), vec!["Data/B.res"]);
    }

    #[test]
    fn test_sandbox_scene_is_saved_to_file() {
        let mut fx = Fixture::new(SyncConfig::default());
        let scene_dir = fx.layout.root.join("Sandbox");
        let scene_file = scene_dir.join("Level.Scene.res");
        JsonStore.save(&scene_file, &refs(&[Some("Data/A.res")])).unwrap();
        fx.host.state_mut().scene = SceneMode::Sandbox("Sandbox/Level.Scene.res".into());

        let summary = fx.run(vec![file_rename("Data/A.res", "Data/B.res")]);

        assert!(summary.saved.contains(&scene_file));
        let mut scene = JsonStore.load(&scene_file).unwrap();
        assert_eq!(scene.reference_paths(), vec!["Data/B.res"]);
    }

    #[test]
    fn test_failures_do_not_abort_the_pass() {
        let mut fx = Fixture::new(SyncConfig::default());
        std::fs::write(fx.layout.data_dir.join("Broken.res"), "not json").unwrap();
        fx.write("Data/Holder.res", &refs(&[Some("Data/A.res")]));

        let summary = fx.run(vec![file_rename("Data/A.res", "Data/B.res")]);

        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].0.ends_with("Broken.res"));
        assert_eq!(fx.read("Data/Holder.res").reference_paths(), vec!["Data/B.res"]);
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_done() {
        let mut fx = Fixture::new(SyncConfig::default());
        for i in 0..4 {
            fx.write(&format!("Data/F{i}.res"), &refs(&[Some("Data/A.res")]));
        }

        let mut rewriter = ReferenceRewriter::new(vec![file_rename("Data/A.res", "Data/B.res")]);
        let mut cx = RewriteContext {
            layout: &fx.layout,
            config: &fx.config,
            env: &mut fx.env,
            modified: &mut fx.modified,
        };

        let mut last = 0.0;
        let mut steps = 0;
        loop {
            let progress = rewriter.step(&mut cx);
            assert!(progress.progress >= last);
            last = progress.progress;
            steps += 1;
            if progress.done {
                break;
            }
        }
        assert_eq!(last, 1.0);
        // app data, user data, scene, four files, finish
        assert_eq!(steps, 8);
    }
}
