use std::collections::VecDeque;
use std::path::Path;

use tracing::debug;

use super::event::{ChangeKind, FileEvent, RawNotification};
use super::self_write::EditorModifiedSet;

/// Reconcile a drained buffer into semantic events, querying the filesystem to
/// decide whether a surviving path is a directory.
pub fn coalesce(raw: Vec<RawNotification>, modified: &EditorModifiedSet) -> Vec<FileEvent> {
    coalesce_with(raw, modified, |path| path.is_dir())
}

/// Same as [`coalesce`], with the directory check supplied by the caller.
///
/// Notifications are consumed oldest first. Each head notification may absorb
/// later ones (see [`fold_head`]); the surviving events keep production order.
pub fn coalesce_with<F>(
    raw: Vec<RawNotification>,
    modified: &EditorModifiedSet,
    is_dir: F,
) -> Vec<FileEvent>
where
    F: Fn(&Path) -> bool,
{
    let mut queue: VecDeque<RawNotification> = raw.into();
    let mut events = Vec::new();

    while let Some(head) = queue.pop_front() {
        let Some(folded) = fold_head(head, &mut queue) else {
            continue;
        };

        if folded.kind == ChangeKind::Changed && modified.is_flagged(&folded.path) {
            debug!(path = %folded.path.display(), "ignoring self-written change");
            continue;
        }

        let is_directory = match folded.kind {
            ChangeKind::Deleted => folded.is_directory_hint || is_dir(&folded.path),
            _ => is_dir(&folded.path),
        };

        let event = match folded.old_path {
            Some(old_path) if folded.kind == ChangeKind::Renamed => {
                FileEvent::renamed(old_path, folded.path, is_directory)
            }
            _ => FileEvent::new(folded.kind, folded.path, is_directory),
        };
        events.push(event);
    }

    events
}

/// Apply the reconciliation rules to the head of the queue, removing any later
/// notifications it absorbs. Returns `None` when the head turns out to be a no-op.
///
/// Rules, in order of precedence:
/// 1. renames chain into a single rename (A→B + B→C = A→C, regardless of order)
/// 2. a rename that ends where it started is dropped
/// 3. delete + rename onto the deleted path becomes a change
/// 4. delete + create of the same file name becomes a rename
pub fn fold_head(
    head: RawNotification,
    queue: &mut VecDeque<RawNotification>,
) -> Option<RawNotification> {
    match head.kind {
        ChangeKind::Renamed => fold_rename_chain(head, queue),
        ChangeKind::Deleted => Some(fold_deletion(head, queue)),
        _ => Some(head),
    }
}

fn fold_rename_chain(
    head: RawNotification,
    queue: &mut VecDeque<RawNotification>,
) -> Option<RawNotification> {
    let mut old = head.source_path().to_path_buf();
    let mut new = head.path;

    loop {
        let forward = queue
            .iter()
            .position(|e| e.kind == ChangeKind::Renamed && e.old_path.as_deref() == Some(&new));
        if let Some(next) = forward.and_then(|i| queue.remove(i)) {
            new = next.path;
            continue;
        }

        let backward = queue
            .iter()
            .position(|e| e.kind == ChangeKind::Renamed && e.path == old);
        if let Some(prev) = backward.and_then(|i| queue.remove(i)) {
            old = prev.source_path().to_path_buf();
            continue;
        }

        break;
    }

    if old == new {
        debug!(path = %new.display(), "discarding rename without a name change");
        return None;
    }
    Some(RawNotification::renamed(old, new))
}

fn fold_deletion(del: RawNotification, queue: &mut VecDeque<RawNotification>) -> RawNotification {
    let replaced = queue
        .iter()
        .position(|e| e.kind == ChangeKind::Renamed && e.path == del.path);
    if let Some(i) = replaced {
        queue.remove(i);
        return RawNotification::changed(del.path);
    }

    let file_name = del.path.file_name();
    let recreated = queue
        .iter()
        .position(|e| e.kind == ChangeKind::Created && e.path.file_name() == file_name);
    if let Some(create) = recreated.and_then(|i| queue.remove(i)) {
        if create.path == del.path {
            return RawNotification::changed(del.path);
        }
        return RawNotification::renamed(del.path, create.path);
    }

    del
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(raw: Vec<RawNotification>) -> Vec<FileEvent> {
        coalesce_with(raw, &EditorModifiedSet::new(), |_| false)
    }

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_rename_chain_folds_forward() {
        let events = run(vec![
            RawNotification::renamed("/d/A", "/d/B"),
            RawNotification::renamed("/d/B", "/d/C"),
        ]);
        assert_eq!(events, vec![FileEvent::renamed(p("/d/A"), p("/d/C"), false)]);
    }

    #[test]
    fn test_rename_chain_folds_in_reverse_buffer_order() {
        let events = run(vec![
            RawNotification::renamed("/d/B", "/d/C"),
            RawNotification::renamed("/d/A", "/d/B"),
        ]);
        assert_eq!(events, vec![FileEvent::renamed(p("/d/A"), p("/d/C"), false)]);
    }

    #[test]
    fn test_long_rename_chain() {
        let events = run(vec![
            RawNotification::renamed("/d/C", "/d/D"),
            RawNotification::renamed("/d/A", "/d/B"),
            RawNotification::changed("/d/X"),
            RawNotification::renamed("/d/B", "/d/C"),
        ]);
        assert_eq!(
            events,
            vec![
                FileEvent::renamed(p("/d/A"), p("/d/D"), false),
                FileEvent::new(ChangeKind::Changed, p("/d/X"), false),
            ]
        );
    }

    #[test]
    fn test_rename_back_and_forth_is_discarded() {
        let events = run(vec![
            RawNotification::renamed("/d/A", "/d/B"),
            RawNotification::renamed("/d/B", "/d/A"),
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_noop_rename_is_discarded() {
        let events = run(vec![RawNotification::renamed("/d/A", "/d/A")]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_delete_then_rename_onto_same_path_is_change() {
        let events = run(vec![
            RawNotification::deleted("/d/A", false),
            RawNotification::renamed("/d/A.tmp", "/d/A"),
        ]);
        assert_eq!(events, vec![FileEvent::new(ChangeKind::Changed, p("/d/A"), false)]);
    }

    #[test]
    fn test_delete_then_create_same_name_is_rename() {
        let events = run(vec![
            RawNotification::deleted("/d/one/A.res", false),
            RawNotification::created("/d/two/A.res"),
        ]);
        assert_eq!(
            events,
            vec![FileEvent::renamed(p("/d/one/A.res"), p("/d/two/A.res"), false)]
        );
    }

    #[test]
    fn test_delete_then_create_same_path_is_change() {
        let events = run(vec![
            RawNotification::deleted("/d/A", false),
            RawNotification::created("/d/A"),
        ]);
        assert_eq!(events, vec![FileEvent::new(ChangeKind::Changed, p("/d/A"), false)]);
    }

    #[test]
    fn test_delete_then_create_different_name_is_untouched() {
        let events = run(vec![
            RawNotification::deleted("/d/A", false),
            RawNotification::created("/d/B"),
        ]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeKind::Deleted);
        assert_eq!(events[1].kind, ChangeKind::Created);
    }

    #[test]
    fn test_single_event_is_unchanged() {
        for raw in [
            RawNotification::created("/d/A"),
            RawNotification::changed("/d/A"),
            RawNotification::deleted("/d/A", false),
        ] {
            let kind = raw.kind;
            let events = run(vec![raw]);
            assert_eq!(events, vec![FileEvent::new(kind, p("/d/A"), false)]);
        }
        let events = run(vec![RawNotification::renamed("/d/A", "/d/B")]);
        assert_eq!(events, vec![FileEvent::renamed(p("/d/A"), p("/d/B"), false)]);
    }

    #[test]
    fn test_self_written_change_is_dropped() {
        let mut modified = EditorModifiedSet::new();
        modified.flag(Path::new("/d/A"));
        let events = coalesce_with(
            vec![RawNotification::changed("/d/A"), RawNotification::changed("/d/B")],
            &modified,
            |_| false,
        );
        assert_eq!(events, vec![FileEvent::new(ChangeKind::Changed, p("/d/B"), false)]);
    }

    #[test]
    fn test_self_write_filter_only_applies_to_changes() {
        let mut modified = EditorModifiedSet::new();
        modified.flag(Path::new("/d/A"));
        let events = coalesce_with(vec![RawNotification::created("/d/A")], &modified, |_| false);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_deleted_directory_uses_hint() {
        let events = run(vec![RawNotification::deleted("/d/Folder", true)]);
        assert!(events[0].is_directory);
    }

    #[test]
    fn test_directory_flag_from_filesystem() {
        let events = coalesce_with(
            vec![
                RawNotification::renamed("/d/Old", "/d/New"),
                RawNotification::changed("/d/file"),
            ],
            &EditorModifiedSet::new(),
            |path| path == Path::new("/d/New"),
        );
        assert!(events[0].is_directory);
        assert!(!events[1].is_directory);
    }

    #[test]
    fn test_no_output_rename_has_equal_paths() {
        let raw = vec![
            RawNotification::renamed("/d/A", "/d/B"),
            RawNotification::deleted("/d/C", false),
            RawNotification::renamed("/d/B", "/d/A"),
            RawNotification::created("/d/C"),
            RawNotification::renamed("/d/X", "/d/X"),
            RawNotification::deleted("/d/Y", false),
            RawNotification::renamed("/d/Z", "/d/Y"),
        ];
        for event in run(raw) {
            if event.kind == ChangeKind::Renamed {
                assert_ne!(event.path, event.old_path);
            } else {
                assert_eq!(event.path, event.old_path);
            }
        }
    }

    #[test]
    fn test_output_preserves_production_order() {
        let events = run(vec![
            RawNotification::created("/d/1"),
            RawNotification::changed("/d/2"),
            RawNotification::deleted("/d/3", false),
        ]);
        let paths: Vec<_> = events.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![p("/d/1"), p("/d/2"), p("/d/3")]);
    }
}
