// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevsupError, Result};
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevsupError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_runner(cfg)?;
    validate_watch(cfg)?;
    validate_compile(cfg)?;
    validate_plugins(cfg)?;
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    match cfg.runner.cmd.first() {
        None => Err(DevsupError::ConfigError(
            "[runner].cmd must name a program (or pass one after `--`)".to_string(),
        )),
        Some(program) if program.trim().is_empty() => Err(DevsupError::ConfigError(
            "[runner].cmd has an empty program name".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.deps < -1 {
        return Err(DevsupError::ConfigError(format!(
            "[watch].deps must be >= -1 (got {})",
            cfg.watch.deps
        )));
    }
    if cfg.watch.roots.is_empty() {
        return Err(DevsupError::ConfigError(
            "[watch].roots must list at least one directory".to_string(),
        ));
    }
    if cfg.watch.deps_dir.trim().is_empty() {
        return Err(DevsupError::ConfigError(
            "[watch].deps_dir must not be empty".to_string(),
        ));
    }

    // Malformed globs fail here, at load time, never at match time.
    build_globset(&cfg.watch.allow)?;
    build_globset(&cfg.watch.ignore)?;
    Ok(())
}

fn validate_compile(cfg: &RawConfigFile) -> Result<()> {
    if let Some(compile) = &cfg.compile {
        if compile.cmd.is_empty() {
            return Err(DevsupError::ConfigError(
                "[compile].cmd must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_plugins(cfg: &RawConfigFile) -> Result<()> {
    for (name, plugin) in cfg.plugin.iter() {
        if let Some(cmd) = &plugin.cmd {
            if cmd.is_empty() {
                return Err(DevsupError::ConfigError(format!(
                    "plugin '{}' has an empty `cmd`",
                    name
                )));
            }
        }
        for patterns in [&plugin.allow, &plugin.ignore, &plugin.core_ignore] {
            build_globset(patterns).map_err(|e| {
                DevsupError::ConfigError(format!("plugin '{}': {}", name, e))
            })?;
        }
    }
    Ok(())
}
