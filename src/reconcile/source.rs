use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::layout::Layout;
use crate::watcher::event::{ChangeKind, FileEvent};

/// Schedule changed source-media files for re-import. Structural changes in the
/// shadow tree are ignored here; they follow the data tree instead.
pub fn handle_source_events(
    events: &[FileEvent],
    layout: &Layout,
    reimport: &mut BTreeSet<PathBuf>,
) -> usize {
    let mut scheduled = 0;
    for event in events {
        if event.kind != ChangeKind::Changed {
            continue;
        }
        if event.path.is_file() && layout.is_in_source_media(&event.path) {
            debug!(path = %event.path.display(), "scheduling re-import");
            if reimport.insert(event.path.clone()) {
                scheduled += 1;
            }
        }
    }
    scheduled
}
