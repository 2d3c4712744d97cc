// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// cmd = ["node", "server.js"]
/// env = { PORT = "3000" }
///
/// [watch]
/// roots = ["src"]
/// ignore = ["**/*.log"]
/// deps = 0
///
/// [compile]
/// cmd = ["tsc", "--outDir", "build", "{path}"]
/// config = "tsconfig.json"
///
/// [plugin.css]
/// match = ["**/*.css"]
/// cmd = ["npm", "run", "css"]
/// core_ignore = ["**/*.css"]
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub compile: Option<CompileSection>,

    /// Plugin listeners from `[plugin.<name>]`, keyed by name.
    #[serde(default)]
    pub plugin: BTreeMap<String, PluginConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on a
/// non-empty runner command and compilable glob patterns.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerSection,
    pub watch: WatchSection,
    pub compile: Option<CompileSection>,
    pub plugin: BTreeMap<String, PluginConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            runner: raw.runner,
            watch: raw.watch,
            compile: raw.compile,
            plugin: raw.plugin,
        }
    }

    /// All plugin `core_ignore` patterns, in plugin name order.
    pub fn plugin_core_ignores(&self) -> Vec<String> {
        self.plugin
            .values()
            .flat_map(|p| p.core_ignore.iter().cloned())
            .collect()
    }
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Runner argv. Executed directly, not through a shell.
    #[serde(default)]
    pub cmd: Vec<String>,

    /// Extra environment merged over the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Grace period between the polite and the forceful tree kill.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// Clear the terminal before each respawn.
    #[serde(default)]
    pub clear: bool,
}

fn default_kill_timeout_ms() -> u64 {
    2000
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            cmd: Vec::new(),
            env: BTreeMap::new(),
            kill_timeout_ms: default_kill_timeout_ms(),
            clear: false,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directories watched recursively, relative to the config file's directory.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,

    /// Allow patterns for the core listener. Empty means "everything".
    #[serde(default, rename = "match")]
    pub allow: Vec<String>,

    /// Deny patterns for the core listener; also applied to reported
    /// dependencies.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Maximum number of dependency-directory crossings for a reported
    /// dependency to be watched. `-1` is unlimited, `0` watches none.
    #[serde(default)]
    pub deps: i64,

    /// Path component that marks a dependency boundary.
    #[serde(default = "default_deps_dir")]
    pub deps_dir: String,
}

fn default_roots() -> Vec<String> {
    vec![".".to_string()]
}

fn default_deps_dir() -> String {
    "node_modules".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            allow: Vec::new(),
            ignore: Vec::new(),
            deps: 0,
            deps_dir: default_deps_dir(),
        }
    }
}

/// `[compile]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileSection {
    /// Compiler argv; every `{path}` is replaced with the changed file.
    pub cmd: Vec<String>,

    /// Compiler configuration file. A change to it re-derives the session's
    /// matcher and compiler state, same as a change to the devsup config.
    #[serde(default)]
    pub config: Option<String>,
}

/// `[plugin.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginConfig {
    #[serde(default, rename = "match")]
    pub allow: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,

    /// Command run (fire-and-forget) when a matching file changes.
    #[serde(default)]
    pub cmd: Option<Vec<String>>,

    /// Paths the core listener must not restart the runner for.
    #[serde(default)]
    pub core_ignore: Vec<String>,
}
