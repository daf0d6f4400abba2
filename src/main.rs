mod cli;

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use content_sync::FileEventManager;
use content_sync::config::SyncConfig;
use content_sync::content::{Collaborators, kind_from_file_name};
use content_sync::layout::Layout;
use content_sync::rewrite::{ReferenceRewriter, RenameEntry, RewriteContext, RewriteSummary};
use content_sync::watcher::self_write::EditorModifiedSet;
use content_sync::watcher::{Translator, WatchRoot, start_watchers};

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "content_sync=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Watch { verbose: true, .. }));

    match cli.command {
        Commands::Watch { path, .. } => watch(&path),
        Commands::Rewrite {
            path,
            from,
            to,
            dir,
            json,
        } => rewrite(&path, from, to, dir, json),
        Commands::Config { path, json } => print_config(&path, json),
    }
}

fn watch(root: &Path) -> Result<()> {
    let config = SyncConfig::load(root);
    let layout = Layout::new(root, &config);
    let (env, _host) = Collaborators::headless(&layout, &config);
    let tick = Duration::from_millis(config.tick_interval_ms.max(1));

    let mut manager = FileEventManager::init(root, config, env);
    manager
        .observers_mut()
        .on_content(|event| info!("{event:?}"));
    manager
        .observers_mut()
        .on_plugin_changed(|path| info!(path = %path.display(), "plugin binary changed"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(run_watch_loop(&mut manager, &layout, tick));

    for summary in manager.terminate() {
        report(&summary);
    }
    result
}

async fn run_watch_loop(
    manager: &mut FileEventManager,
    layout: &Layout,
    tick: Duration,
) -> Result<()> {
    let (_handle, mut rx) = start_watchers(layout)?;
    println!("Watching {} (Ctrl-C to stop)", layout.root.display());

    let mut translators = HashMap::from([
        (WatchRoot::Data, Translator::with_known_dirs(&layout.data_dir)),
        (WatchRoot::Source, Translator::with_known_dirs(&layout.source_media_dir)),
        (WatchRoot::Plugin, Translator::new()),
    ]);

    let mut reimport_at: Option<Instant> = None;
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            // Queued events go first so a rename's second half is translated
            // before the interval gives up on its first.
            biased;

            Some((root, event)) = rx.recv() => {
                let translator = translators.entry(root).or_default();
                for notification in translator.translate(&event) {
                    manager.push(root, notification);
                }
            }
            _ = interval.tick() => {
                for (root, translator) in &mut translators {
                    if let Some(notification) = translator.flush_stale() {
                        manager.push(*root, notification);
                    }
                }

                manager.on_idle(Instant::now());
                pump_rewrites(manager, tick / 2);
                for summary in manager.take_completed_rewrites() {
                    report(&summary);
                }

                // No window to activate; a non-empty schedule counts as an
                // activation once the re-import delay has passed.
                if manager.reimport_schedule().is_empty() {
                    reimport_at = None;
                } else {
                    let now = Instant::now();
                    let due = *reimport_at.get_or_insert(now + manager.reimport_delay());
                    if now >= due {
                        manager.reimport_scheduled();
                        reimport_at = None;
                    }
                }
            }
            res = &mut ctrl_c => {
                if let Err(err) = res {
                    warn!("failed to listen for Ctrl-C: {err}");
                }
                info!("interrupted, finishing pending work");
                return Ok(());
            }
        }
    }
}

/// Step the active rewrite until it finishes or `budget` runs out.
fn pump_rewrites(manager: &mut FileEventManager, budget: Duration) {
    let deadline = Instant::now() + budget;
    while let Some(progress) = manager.pump_rewrite() {
        debug!(
            progress = progress.progress,
            "rewriting references: {}", progress.description
        );
        if progress.done || Instant::now() >= deadline {
            break;
        }
    }
}

fn rewrite(root: &Path, from: String, to: String, dir: bool, json: bool) -> Result<()> {
    let config = SyncConfig::load(root);
    let layout = Layout::new(root, &config);
    anyhow::ensure!(
        layout.data_dir.is_dir(),
        "data directory {} does not exist",
        layout.data_dir.display()
    );

    let (mut env, _host) = Collaborators::headless(&layout, &config);
    let mut modified = EditorModifiedSet::new();
    let entry = RenameEntry {
        kind: if dir {
            None
        } else {
            kind_from_file_name(Path::new(&to))
        },
        old: from,
        new: to,
        is_directory: dir,
    };

    let mut rewriter = ReferenceRewriter::new(vec![entry]);
    let mut cx = RewriteContext {
        layout: &layout,
        config: &config,
        env: &mut env,
        modified: &mut modified,
    };
    let summary = rewriter.run_to_completion(&mut cx);

    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "Rewrote {} reference(s), saved {} file(s).",
            summary.references,
            summary.saved.len()
        );
        for (path, err) in &summary.failures {
            println!("  failed: {}: {err}", path.display());
        }
    }
    Ok(())
}

fn print_config(root: &Path, json: bool) -> Result<()> {
    let config = SyncConfig::load(root);
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("failed to serialize configuration")?
        );
    }
    Ok(())
}

fn report(summary: &RewriteSummary) {
    println!(
        "Reference rewrite: {} reference(s), {} saved, {} cached, {} failed",
        summary.references,
        summary.saved.len(),
        summary.cached_modified.len(),
        summary.failures.len()
    );
}
