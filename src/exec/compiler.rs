// src/exec/compiler.rs

//! The compile step run for changed files, and the detached command helper
//! shared with plugin listeners.
//!
//! Compilation is fire-and-forget: the engine never waits on it, and its
//! failures reach the user through the event sink, not a return value.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::sink::{SharedSink, SinkEvent};

/// Placeholder in compiler / plugin argv replaced by the changed file.
pub const PATH_PLACEHOLDER: &str = "{path}";

pub trait Compiler: Send + Sync + fmt::Debug {
    fn compile_changed(&self, path: &Path, sink: &SharedSink);
}

/// Used when no `[compile]` section is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopCompiler;

impl Compiler for NoopCompiler {
    fn compile_changed(&self, path: &Path, _sink: &SharedSink) {
        debug!(?path, "no compiler configured; skipping compile step");
    }
}

/// Runs `[compile].cmd` once per changed file.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    argv: Vec<String>,
    cwd: PathBuf,
}

impl CommandCompiler {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
        }
    }
}

impl Compiler for CommandCompiler {
    fn compile_changed(&self, path: &Path, sink: &SharedSink) {
        let argv = substitute_path(&self.argv, path);
        spawn_detached("compile".to_string(), argv, self.cwd.clone(), sink.clone());
    }
}

pub fn build_compiler(cfg: &ConfigFile, cwd: &Path) -> Arc<dyn Compiler> {
    match &cfg.compile {
        Some(section) => Arc::new(CommandCompiler::new(section.cmd.clone(), cwd)),
        None => Arc::new(NoopCompiler),
    }
}

/// Replace every `{path}` in `argv` with `path`. Without a placeholder the
/// path is appended as the final argument.
pub fn substitute_path(argv: &[String], path: &Path) -> Vec<String> {
    let path_str = path.to_string_lossy();
    if argv.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
        argv.iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path_str))
            .collect()
    } else {
        let mut out = argv.to_vec();
        out.push(path_str.into_owned());
        out
    }
}

/// Run `argv` in the background, forwarding its output to `sink` and
/// reporting a failed start or non-zero exit there too.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_detached(label: String, argv: Vec<String>, cwd: PathBuf, sink: SharedSink) {
    tokio::spawn(async move {
        let Some((program, args)) = argv.split_first() else {
            warn!(%label, "empty command; nothing to run");
            return;
        };

        debug!(%label, cmd = ?argv, "running command");
        let output = Command::new(program)
            .args(args)
            .current_dir(&cwd)
            .output()
            .await;

        match output {
            Ok(out) => {
                for chunk in [&out.stdout, &out.stderr] {
                    for line in String::from_utf8_lossy(chunk).lines() {
                        sink.emit(SinkEvent::Logging {
                            data: line.to_string(),
                        });
                    }
                }
                if !out.status.success() {
                    warn!(%label, exit_code = ?out.status.code(), "command failed");
                    sink.emit(SinkEvent::Logging {
                        data: format!("[{label}] exited with {}", out.status),
                    });
                }
            }
            Err(e) => {
                warn!(%label, error = %e, "failed to start command");
                sink.emit(SinkEvent::Logging {
                    data: format!("[{label}] failed to start {program}: {e}"),
                });
            }
        }
    });
}
