use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the configuration file looked up at the project root.
pub const CONFIG_FILE: &str = "content-sync.toml";

/// How a headless host answers "discard unsaved or active content and reload?".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    /// Discard the cached copy and reload from disk.
    #[default]
    Always,
    /// Keep the stale cached copy.
    Never,
}

/// Configuration loaded from `content-sync.toml` at the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Primary content tree, relative to the project root.
    pub data_dir: String,
    /// Shadow tree root, relative to the project root.
    pub source_dir: String,
    /// Part of the shadow tree mirroring the data tree.
    pub source_media_dir: String,
    /// Directories watched for plugin binaries.
    pub plugin_dirs: Vec<String>,
    /// Extension identifying content files (without the dot).
    pub content_extension: String,
    /// File name suffixes identifying plugin binaries, matched case-insensitively.
    pub plugin_suffixes: Vec<String>,
    /// Minimum time between two reconciliation passes.
    pub tick_interval_ms: u64,
    /// Grace period before scheduled re-imports run on activation.
    pub reimport_delay_ms: u64,
    pub app_data_file: String,
    pub user_data_file: String,
    /// Destination of trashed shadow files, relative to the project root.
    pub trash_dir: String,
    /// Additional glob patterns whose notifications are dropped.
    pub exclude: Vec<String>,
    pub reload_policy: ReloadPolicy,
    /// Which content kinds each kind may reference. Kinds missing here may
    /// reference anything.
    pub references: BTreeMap<String, Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: "Data".into(),
            source_dir: "Source".into(),
            source_media_dir: "Source/Media".into(),
            plugin_dirs: vec!["Plugins".into()],
            content_extension: "res".into(),
            plugin_suffixes: vec![".core.dll".into(), ".editor.dll".into()],
            tick_interval_ms: 100,
            reimport_delay_ms: 50,
            app_data_file: "AppData.dat".into(),
            user_data_file: "UserData.dat".into(),
            trash_dir: ".trash".into(),
            exclude: Vec::new(),
            reload_policy: ReloadPolicy::default(),
            references: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from `content-sync.toml` in the given root directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Returns true if `path` matches any exclusion pattern, either as a whole or
    /// through one of its components.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();
        self.exclude.iter().any(|pattern| {
            let Ok(matcher) = glob::Pattern::new(pattern) else {
                return false;
            };
            matcher.matches(&path_str)
                || path
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .any(|s| matcher.matches(s))
        })
    }

    /// Whether `path` ends in one of the plugin binary suffixes.
    pub fn is_plugin_binary(&self, path: &Path) -> bool {
        let lower = path.to_string_lossy().to_lowercase();
        self.plugin_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }
}
