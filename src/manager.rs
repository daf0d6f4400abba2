use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::content::Collaborators;
use crate::layout::{Layout, is_hidden};
use crate::observer::Observers;
use crate::reconcile::{handle_data_events, handle_source_events};
use crate::rewrite::{ReferenceRewriter, RewriteContext, RewriteProgress, RewriteSummary};
use crate::watcher::WatchRoot;
use crate::watcher::buffer::EventBuffer;
use crate::watcher::coalesce::coalesce;
use crate::watcher::event::{ChangeKind, FileEvent, RawNotification};
use crate::watcher::self_write::EditorModifiedSet;

/// Owns all reconciliation state of one editor session.
///
/// Notifications are pushed as they arrive and reconciled in batches by
/// [`tick`](Self::tick). Reference rewrites produced by a tick are queued and
/// advanced by [`pump_rewrite`](Self::pump_rewrite), one step per call. While a
/// rewrite is queued or running, data-tree notifications stay buffered.
#[derive(Debug)]
pub struct FileEventManager {
    layout: Layout,
    config: SyncConfig,
    env: Collaborators,
    observers: Observers,

    data_events: EventBuffer,
    source_events: EventBuffer,
    modified: EditorModifiedSet,
    reimport: BTreeSet<PathBuf>,

    rewrites: VecDeque<ReferenceRewriter>,
    completed: Vec<RewriteSummary>,
    last_tick: Option<Instant>,
}

impl FileEventManager {
    /// Start a session for the project at `root`.
    pub fn init(root: &Path, config: SyncConfig, env: Collaborators) -> Self {
        let layout = Layout::new(root, &config);
        info!(root = %layout.root.display(), "file event manager started");
        Self {
            layout,
            config,
            env,
            observers: Observers::default(),
            data_events: EventBuffer::new(),
            source_events: EventBuffer::new(),
            modified: EditorModifiedSet::new(),
            reimport: BTreeSet::new(),
            rewrites: VecDeque::new(),
            completed: Vec::new(),
            last_tick: None,
        }
    }

    /// End the session. Pending rewrites are finished first; their saves are
    /// already partly on disk. Everything else is dropped, observers included.
    pub fn terminate(&mut self) -> Vec<RewriteSummary> {
        self.finish_rewrites();
        self.data_events.clear();
        self.source_events.clear();
        self.modified.clear();
        self.reimport.clear();
        self.observers.clear();
        self.last_tick = None;
        info!("file event manager stopped");
        std::mem::take(&mut self.completed)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.env
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.env
    }

    pub fn observers_mut(&mut self) -> &mut Observers {
        &mut self.observers
    }

    pub fn reimport_schedule(&self) -> &BTreeSet<PathBuf> {
        &self.reimport
    }

    pub fn is_rewriting(&self) -> bool {
        !self.rewrites.is_empty()
    }

    /// Route a notification to the buffer of the root it came from.
    pub fn push(&mut self, root: WatchRoot, notification: RawNotification) {
        match root {
            WatchRoot::Data => self.push_data(notification),
            WatchRoot::Source => self.push_source(notification),
            WatchRoot::Plugin => self.push_plugin(&notification),
        }
    }

    pub fn push_data(&mut self, notification: RawNotification) {
        if let Some(notification) = self.visible(notification) {
            self.data_events.push(notification);
        }
    }

    pub fn push_source(&mut self, notification: RawNotification) {
        if let Some(notification) = self.visible(notification) {
            self.source_events.push(notification);
        }
    }

    /// Plugin binaries are reported right away; nothing is buffered.
    pub fn push_plugin(&mut self, notification: &RawNotification) {
        let relevant = matches!(notification.kind, ChangeKind::Created | ChangeKind::Changed);
        if relevant && self.config.is_plugin_binary(&notification.path) {
            debug!(path = %notification.path.display(), "plugin binary changed");
            self.observers.emit_plugin_changed(&notification.path);
        }
    }

    /// Record that the editor itself is writing `path`, so the resulting change
    /// notification is not mistaken for an external edit.
    pub fn flag_editor_modified(&mut self, path: &Path) {
        self.modified.flag(path);
    }

    /// Run a tick if at least the configured interval has passed since the last
    /// one. Hosts call this whenever they are idle and not blocked on a modal
    /// interaction. Returns whether a tick ran.
    pub fn on_idle(&mut self, now: Instant) -> bool {
        let interval = Duration::from_millis(self.config.tick_interval_ms);
        if let Some(last) = self.last_tick
            && now.saturating_duration_since(last) < interval
        {
            return false;
        }
        self.last_tick = Some(now);
        self.tick();
        true
    }

    /// One reconciliation pass: source tree first, then the data tree unless a
    /// rewrite is pending, then advance the self-write generations.
    pub fn tick(&mut self) {
        if !self.source_events.is_empty() {
            let events = coalesce(self.source_events.drain_all(), &self.modified);
            let events = self.resolve_hidden_renames(events);
            let scheduled = handle_source_events(&events, &self.layout, &mut self.reimport);
            if scheduled > 0 {
                debug!(scheduled, "source files scheduled for re-import");
            }
        }

        // The rewriter's own saves must still count as self-writes once data
        // events are processed again.
        if self.is_rewriting() {
            return;
        }

        if !self.data_events.is_empty() {
            let events = coalesce(self.data_events.drain_all(), &self.modified);
            let events = self.resolve_hidden_renames(events);
            let batch =
                handle_data_events(&events, &self.layout, &mut self.env, &mut self.observers);
            if !batch.is_empty() {
                info!(renames = batch.len(), "queueing reference rewrite");
                self.rewrites.push_back(ReferenceRewriter::new(batch));
            }
        }

        self.modified.rotate();
    }

    /// Advance the active rewrite by one step. Returns `None` when nothing is
    /// queued.
    pub fn pump_rewrite(&mut self) -> Option<RewriteProgress> {
        let rewriter = self.rewrites.front_mut()?;
        let mut cx = RewriteContext {
            layout: &self.layout,
            config: &self.config,
            env: &mut self.env,
            modified: &mut self.modified,
        };
        let progress = rewriter.step(&mut cx);

        if progress.done
            && let Some(done) = self.rewrites.pop_front()
        {
            self.completed.push(done.summary().clone());
        }
        Some(progress)
    }

    /// Drive every queued rewrite to completion.
    pub fn finish_rewrites(&mut self) {
        while self.pump_rewrite().is_some() {}
    }

    /// Summaries of rewrites finished since the last call.
    pub fn take_completed_rewrites(&mut self) -> Vec<RewriteSummary> {
        std::mem::take(&mut self.completed)
    }

    /// The editor window was activated: wait `reimport_delay_ms` so the tool
    /// that touched the files can release them, then
    /// [`reimport_scheduled`](Self::reimport_scheduled). Blocks the calling
    /// thread; async hosts wait on their own timer and call
    /// `reimport_scheduled` directly.
    pub fn on_activated(&mut self) -> Vec<PathBuf> {
        if self.reimport.is_empty() {
            return Vec::new();
        }
        std::thread::sleep(self.reimport_delay());
        self.reimport_scheduled()
    }

    pub fn reimport_delay(&self) -> Duration {
        Duration::from_millis(self.config.reimport_delay_ms)
    }

    /// Hand every scheduled source file that still exists to the host for
    /// re-import and clear the schedule. Returns what was handed over.
    pub fn reimport_scheduled(&mut self) -> Vec<PathBuf> {
        let files: Vec<PathBuf> = std::mem::take(&mut self.reimport)
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        if !files.is_empty() {
            info!(count = files.len(), "re-importing changed source files");
            self.env.host.reimport(files.clone());
        }
        files
    }

    /// Drop notifications about hidden or excluded paths. A rename out of sight
    /// is a deletion of its visible source. A rename from a hidden path onto a
    /// visible one stays a rename so the coalescer can still pair it with an
    /// earlier deletion of the target.
    fn visible(&self, notification: RawNotification) -> Option<RawNotification> {
        let old_visible = notification.old_path.as_deref().map(|p| self.is_visible(p));
        match (self.is_visible(&notification.path), old_visible) {
            (true, _) => Some(notification),
            (false, Some(true)) => {
                let is_directory = notification.path.is_dir();
                notification
                    .old_path
                    .map(|old| RawNotification::deleted(old, is_directory))
            }
            (false, _) => None,
        }
    }

    /// A rename from a hidden path that survived coalescing replaced its target
    /// in place (an atomic save through a temp file): report it as a change,
    /// unless the editor wrote it.
    fn resolve_hidden_renames(&self, events: Vec<FileEvent>) -> Vec<FileEvent> {
        events
            .into_iter()
            .filter_map(|event| {
                if event.kind != ChangeKind::Renamed || self.is_visible(&event.old_path) {
                    return Some(event);
                }
                if self.modified.is_flagged(&event.path) {
                    debug!(path = %event.path.display(), "ignoring self-written replace");
                    return None;
                }
                Some(FileEvent::new(ChangeKind::Changed, event.path, event.is_directory))
            })
            .collect()
    }

    fn is_visible(&self, path: &Path) -> bool {
        if is_hidden(path, &self.layout.root) {
            return false;
        }
        let relative = path.strip_prefix(&self.layout.root).unwrap_or(path);
        !self.config.is_excluded(relative)
    }
}
