//! Filesystem notification reconciliation for a content editor.
//!
//! Raw watcher notifications for the content tree, the shadow source tree and
//! the plugin directories are buffered per root and, once per idle tick,
//! coalesced into semantic events (created, changed, deleted, renamed). The
//! reconcilers apply those events to the content cache and the shadow tree, and
//! renames are followed by a resumable pass that rewrites path references in
//! every content item.
//!
//! [`manager::FileEventManager`] ties the pieces together.

pub mod config;
pub mod content;
pub mod layout;
pub mod manager;
pub mod observer;
pub mod reconcile;
pub mod rewrite;
pub mod walker;
pub mod watcher;

pub use manager::FileEventManager;
