// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Settings given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `[runner].cmd` when non-empty.
    pub command: Vec<String>,
    pub deps: Option<i64>,
    pub clear: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, raw: &mut RawConfigFile) {
        if !self.command.is_empty() {
            raw.runner.cmd = self.command.clone();
        }
        if let Some(deps) = self.deps {
            raw.watch.deps = deps;
        }
        if self.clear {
            raw.runner.clear = true;
        }
    }
}

/// Load, apply overrides, validate.
///
/// A missing config file is tolerated when the overrides carry a runner
/// command, so `devsup -- node app.js` works without any TOML.
pub fn load_with_overrides(
    path: impl AsRef<Path>,
    overrides: &ConfigOverrides,
) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw = if !path.exists() && !overrides.command.is_empty() {
        RawConfigFile::default()
    } else {
        load_from_path(path)?
    };
    overrides.apply(&mut raw);
    ConfigFile::try_from(raw)
}

/// Default config path: `Devsup.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Devsup.toml")
}
