#![allow(dead_code)]

use std::path::{Path, PathBuf};

use devsup::config::{ConfigFile, PluginConfig, RawConfigFile};
use devsup::engine::{CoreOptions, SupervisorCore};
use devsup::types::{ChangeEvent, ChangeKind};
use devsup::watch::{CoreFilter, DepsPolicy, PatternMatcher};

/// Project root used by core-level tests. Nothing is read from it.
pub const TEST_ROOT: &str = "/project";

/// A change event for `rel` under [`TEST_ROOT`].
pub fn change(rel: &str) -> ChangeEvent {
    change_kind(ChangeKind::Change, rel)
}

pub fn change_kind(kind: ChangeKind, rel: &str) -> ChangeEvent {
    ChangeEvent::new(kind, Path::new(TEST_ROOT).join(rel), rel)
}

/// Absolute path under [`TEST_ROOT`].
pub fn project_path(rel: &str) -> PathBuf {
    Path::new(TEST_ROOT).join(rel)
}

/// Builder for `SupervisorCore` to simplify test setup.
pub struct CoreBuilder {
    allow: Vec<String>,
    ignore: Vec<String>,
    plugin_ignore: Vec<String>,
    deps: i64,
    deps_dir: String,
    config_files: Vec<String>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self {
            allow: Vec::new(),
            ignore: Vec::new(),
            plugin_ignore: Vec::new(),
            deps: 0,
            deps_dir: "node_modules".to_string(),
            config_files: vec!["Devsup.toml".to_string()],
        }
    }

    pub fn allow(mut self, pattern: &str) -> Self {
        self.allow.push(pattern.to_string());
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.ignore.push(pattern.to_string());
        self
    }

    pub fn plugin_ignore(mut self, pattern: &str) -> Self {
        self.plugin_ignore.push(pattern.to_string());
        self
    }

    pub fn deps(mut self, depth: i64) -> Self {
        self.deps = depth;
        self
    }

    pub fn config_file(mut self, rel: &str) -> Self {
        self.config_files.push(rel.to_string());
        self
    }

    pub fn build(self) -> SupervisorCore {
        let matcher = PatternMatcher::build(&self.allow, &self.ignore)
            .expect("test patterns must compile");
        let plugin_ignore = PatternMatcher::ignoring(&self.plugin_ignore)
            .expect("test patterns must compile");
        let options = CoreOptions {
            root: PathBuf::from(TEST_ROOT),
            config_files: self.config_files,
        };
        SupervisorCore::new(
            options,
            CoreFilter::new(matcher, plugin_ignore),
            DepsPolicy::new(self.deps, self.deps_dir),
        )
    }
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(cmd: &[&str]) -> Self {
        let mut config = RawConfigFile::default();
        config.runner.cmd = cmd.iter().map(|s| s.to_string()).collect();
        Self { config }
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.config.watch.ignore.push(pattern.to_string());
        self
    }

    pub fn allow(mut self, pattern: &str) -> Self {
        self.config.watch.allow.push(pattern.to_string());
        self
    }

    pub fn deps(mut self, depth: i64) -> Self {
        self.config.watch.deps = depth;
        self
    }

    pub fn plugin(mut self, name: &str, plugin: PluginConfig) -> Self {
        self.config.plugin.insert(name.to_string(), plugin);
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
