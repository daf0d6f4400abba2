use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::content::{Collaborators, kind_from_file_name};
use crate::layout::Layout;
use crate::observer::{ContentEvent, Observers};
use crate::rewrite::{RenameBatch, RenameEntry};
use crate::watcher::event::{ChangeKind, FileEvent};

use super::shadow;

/// Applies semantic events from the data tree to the content cache and the
/// shadow tree, then notifies observers. Returns the renames that still need a
/// global reference rewrite.
pub fn handle_data_events(
    events: &[FileEvent],
    layout: &Layout,
    env: &mut Collaborators,
    observers: &mut Observers,
) -> RenameBatch {
    let mut renames = RenameBatch::new();
    let mut delete_schedule = BTreeSet::new();

    for event in events {
        match event.kind {
            ChangeKind::Changed => handle_change(event, layout, env),
            ChangeKind::Deleted => handle_delete(event, layout, env, &mut delete_schedule),
            ChangeKind::Renamed => handle_rename(event, layout, env, observers, &mut renames),
            ChangeKind::Created => {}
        }
    }

    if !delete_schedule.is_empty() {
        info!(count = delete_schedule.len(), "trashing shadow files of deleted content");
        shadow::trash_scheduled(&delete_schedule, env.trash.as_mut(), &layout.source_media_dir);
    }

    for event in events {
        if is_content_or_directory(event, layout) {
            observers.emit_content(&ContentEvent::from(event));
        }
    }

    renames
}

fn is_content_or_directory(event: &FileEvent, layout: &Layout) -> bool {
    event.is_directory || layout.is_content_file(&event.path)
}

/// Evict content changed outside the editor. Active or unsaved content is only
/// evicted after the host confirms.
fn handle_change(event: &FileEvent, layout: &Layout, env: &mut Collaborators) {
    if !layout.is_content_file(&event.path) {
        return;
    }
    let Some(path) = layout.content_path(&event.path) else {
        return;
    };
    if !env.cache.contains(&path) {
        return;
    }

    let is_active = env.host.is_active_content(&path);
    if is_active || env.host.has_unsaved_changes(&path) {
        if env.host.confirm_reload(&path) {
            env.cache.remove(&path);
            if is_active {
                env.host.reload_active(&path);
            }
        } else {
            debug!(%path, "keeping local copy of externally changed content");
        }
    } else {
        debug!(%path, "evicting externally changed content");
        env.cache.remove(&path);
    }
}

fn handle_delete(
    event: &FileEvent,
    layout: &Layout,
    env: &mut Collaborators,
    schedule: &mut BTreeSet<PathBuf>,
) {
    if !is_content_or_directory(event, layout) {
        return;
    }
    let Some(path) = layout.content_path(&event.path) else {
        return;
    };

    if event.is_directory {
        if let Some(mirror) = layout.mirror_dir(&event.path)
            && mirror.is_dir()
        {
            schedule.insert(mirror);
        }
        let removed = env.cache.remove_tree(&path);
        debug!(%path, removed, "content directory deleted");
    } else {
        schedule.extend(env.sources.source_files(&path).into_iter().filter(|f| f.is_file()));
        env.cache.remove(&path);
        debug!(%path, "content deleted");
    }
}

fn handle_rename(
    event: &FileEvent,
    layout: &Layout,
    env: &mut Collaborators,
    observers: &mut Observers,
    renames: &mut RenameBatch,
) {
    if !is_content_or_directory(event, layout) {
        return;
    }
    let (Some(old), Some(new)) = (
        layout.content_path(&event.old_path),
        layout.content_path(&event.path),
    ) else {
        return;
    };

    // Resolve sources while the registry still knows the old location.
    let old_sources = if event.is_directory {
        Vec::new()
    } else {
        env.sources.source_files(&old)
    };

    if event.is_directory {
        env.cache.rename_tree(&old, &new);
    } else {
        env.cache.rename(&old, &new);
    }

    let is_empty_dir = event.is_directory
        && std::fs::read_dir(&event.path).is_ok_and(|mut entries| entries.next().is_none());
    if is_empty_dir || observers.begin_global_rename(event) {
        debug!(%old, %new, "rename skipped for reference rewrite");
        return;
    }

    let boundary = &layout.source_media_dir;
    if event.is_directory {
        if let (Some(old_mirror), Some(new_mirror)) =
            (layout.mirror_dir(&event.old_path), layout.mirror_dir(&event.path))
        {
            shadow::move_source_dir(&old_mirror, &new_mirror, boundary);
        }
    } else {
        let new_sources = env.sources.source_files(&new);
        for (i, old_source) in old_sources.iter().enumerate() {
            let new_source = new_sources
                .get(i)
                .cloned()
                .unwrap_or_else(|| env.sources.relocate(old_source, &old, &new));
            shadow::move_source_file(old_source, &new_source, boundary);
        }
    }

    renames.push(RenameEntry {
        kind: (!event.is_directory)
            .then(|| kind_from_file_name(&event.path))
            .flatten(),
        old,
        new,
        is_directory: event.is_directory,
    });
}
