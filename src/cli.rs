use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keeps a content project's cache, shadow source tree and cross-content
/// references in sync with changes made on disk.
///
/// content-sync watches the data tree, the source-media tree and the plugin
/// directories, folds bursts of raw notifications into clean events, and rewrites
/// path references after content is renamed or moved.
#[derive(Parser, Debug)]
#[command(
    name = "content-sync",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a project and reconcile changes until interrupted (Ctrl-C).
    Watch {
        /// Path to the project root.
        path: PathBuf,

        /// Log every reconciliation decision.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Rewrite every reference to a renamed content item or directory.
    ///
    /// Use this after moving content while no watcher was running. Paths are
    /// project-relative content paths such as `Data/Sprites/Hero.Pixmap.res`.
    Rewrite {
        /// Path to the project root.
        path: PathBuf,

        /// Old content path.
        #[arg(long)]
        from: String,

        /// New content path.
        #[arg(long)]
        to: String,

        /// The renamed item is a directory; rewrite every path below it.
        #[arg(long)]
        dir: bool,

        /// Output the summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration of a project.
    Config {
        /// Path to the project root.
        path: PathBuf,

        /// Output as JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
}
