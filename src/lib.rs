// src/lib.rs

pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sink;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, ConfigOverrides, load_with_overrides};
use crate::engine::{
    ConfigReloader, CoreOptions, Reconfiguration, Supervisor, SupervisorCore, SupervisorEvent,
};
use crate::errors::Result;
use crate::exec::{EvalSource, ProjectLayout, RealRunnerBackend, RunnerSpec, build_compiler};
use crate::sink::{SharedSink, StdoutSink};
use crate::types::SessionOutcome;
use crate::watch::path_utils::{relative_or_full, resolve_under};
use crate::watch::{
    DepsPolicy, ErrorHook, WatchControl, WatchSession, build_core_filter, core_listener,
    plugin_listener,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - the core supervisor and its IO shell
/// - the real runner backend and compiler
/// - the file watcher with core and plugin listeners
/// - Ctrl-C / SIGTERM relay
pub async fn run(args: CliArgs) -> Result<SessionOutcome> {
    let config_path = args.config.clone();
    let overrides = overrides_from_args(&args);
    let cfg = load_with_overrides(&config_path, &overrides)?;

    let root = config_root_dir(&config_path);
    let root = root.canonicalize().unwrap_or(root);
    let roots: Vec<PathBuf> = cfg
        .watch
        .roots
        .iter()
        .map(|r| resolve_under(&root, r))
        .collect();

    if args.dry_run {
        print_dry_run(&cfg, &root, &roots);
        return Ok(SessionOutcome::Shutdown);
    }

    let config_abs = config_path.canonicalize().ok();
    let watched_configs = config_files(&cfg, &root, config_abs.as_deref());

    let (events_tx, events_rx) = mpsc::unbounded_channel::<SupervisorEvent>();
    let sink: SharedSink = Arc::new(StdoutSink);

    let filter = build_core_filter(&cfg)?;
    let deps = DepsPolicy::from_config(&cfg);
    let compiler = build_compiler(&cfg, &root);

    let layout = ProjectLayout {
        root: root.clone(),
        roots: roots.clone(),
        config: config_abs.clone(),
    };
    let eval = args.eval.clone().map(|code| EvalSource {
        code,
        filename: args.eval_filename.clone(),
    });
    let spec = RunnerSpec::from_config(&cfg, layout, eval);
    let backend = RealRunnerBackend::new(spec, events_tx.clone(), sink.clone());

    let options = CoreOptions {
        root: root.clone(),
        config_files: watched_configs
            .iter()
            .map(|p| relative_or_full(&root, p))
            .collect(),
    };
    let core = SupervisorCore::new(options, filter, deps);
    let mut supervisor = Supervisor::new(core, events_rx, backend, compiler, sink.clone());

    // A watcher that cannot start is not fatal: the runner still runs.
    match start_watch(&root, &roots, &cfg, &watched_configs, events_tx.clone(), sink) {
        Ok(session) => supervisor = supervisor.with_watch(Box::new(session)),
        Err(e) => error!(error = %e, "failed to start file watcher; continuing without restart on change"),
    }

    if let Some(path) = config_abs {
        supervisor = supervisor.with_reloader(Box::new(FileReloader {
            path,
            overrides,
            root: root.clone(),
        }));
    }

    spawn_signal_relay(events_tx);

    supervisor.run().await
}

fn overrides_from_args(args: &CliArgs) -> ConfigOverrides {
    ConfigOverrides {
        command: args.command.clone(),
        deps: args.deps,
        clear: args.clear,
    }
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "app/Devsup.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Devsup.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Absolute paths of every file whose change re-derives session state: the
/// devsup config itself and the compiler's config, if any.
fn config_files(cfg: &ConfigFile, root: &Path, config_abs: Option<&Path>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = config_abs.map(Path::to_path_buf).into_iter().collect();
    if let Some(compile_config) = cfg.compile.as_ref().and_then(|c| c.config.as_ref()) {
        files.push(resolve_under(root, compile_config));
    }
    files
}

fn start_watch(
    root: &Path,
    roots: &[PathBuf],
    cfg: &ConfigFile,
    watched_configs: &[PathBuf],
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    sink: SharedSink,
) -> Result<WatchSession> {
    let error_tx = events_tx.clone();
    let on_error: ErrorHook = Arc::new(move |error: String| {
        let _ = error_tx.send(SupervisorEvent::WatcherFailed { error });
    });

    let mut session = WatchSession::start(root, roots, on_error)?;

    session.on_event(core_listener(events_tx));
    for (name, plugin) in cfg.plugin.iter() {
        session.on_event(plugin_listener(name, plugin, root, sink.clone())?);
        debug!(plugin = %name, "plugin listener registered");
    }

    // Config files outside the watched roots still need to be seen.
    for file in watched_configs {
        let covered = roots.iter().any(|r| file.starts_with(r));
        if !covered {
            if let Err(e) = session.add_silently(file) {
                warn!(path = ?file, error = %e, "failed to watch config file");
            }
        }
    }

    Ok(session)
}

/// Reloads the config file and re-derives matcher / compiler state.
struct FileReloader {
    path: PathBuf,
    overrides: ConfigOverrides,
    root: PathBuf,
}

impl ConfigReloader for FileReloader {
    fn reload(&mut self) -> Result<Reconfiguration> {
        let cfg = load_with_overrides(&self.path, &self.overrides)?;
        Ok(Reconfiguration {
            filter: build_core_filter(&cfg)?,
            deps: DepsPolicy::from_config(&cfg),
            compiler: build_compiler(&cfg, &self.root),
        })
    }
}

/// Turn Ctrl-C (and SIGTERM on unix) into `ShutdownRequested`.
fn spawn_signal_relay(events_tx: mpsc::UnboundedSender<SupervisorEvent>) {
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("termination signal received");
        let _ = events_tx.send(SupervisorEvent::ShutdownRequested);
    });
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!(error = %e, "failed to listen for Ctrl+C");
                    }
                }
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
}

/// Simple dry-run output: print the resolved session.
fn print_dry_run(cfg: &ConfigFile, root: &Path, roots: &[PathBuf]) {
    println!("devsup dry-run");
    println!("  root: {}", root.display());
    println!("  runner.cmd: {:?}", cfg.runner.cmd);
    if !cfg.runner.env.is_empty() {
        println!("  runner.env: {:?}", cfg.runner.env);
    }
    println!("  runner.kill_timeout_ms = {}", cfg.runner.kill_timeout_ms);
    println!();

    println!("watch:");
    for r in roots {
        println!("  - {}", r.display());
    }
    if !cfg.watch.allow.is_empty() {
        println!("  match: {:?}", cfg.watch.allow);
    }
    if !cfg.watch.ignore.is_empty() {
        println!("  ignore: {:?}", cfg.watch.ignore);
    }
    println!("  deps: {} (boundary {:?})", cfg.watch.deps, cfg.watch.deps_dir);

    if let Some(compile) = &cfg.compile {
        println!();
        println!("compile: {:?}", compile.cmd);
        if let Some(c) = &compile.config {
            println!("  config: {c}");
        }
    }

    if !cfg.plugin.is_empty() {
        println!();
        println!("plugins ({}):", cfg.plugin.len());
        for (name, plugin) in cfg.plugin.iter() {
            println!("  - {name}");
            if !plugin.allow.is_empty() {
                println!("      match: {:?}", plugin.allow);
            }
            if let Some(cmd) = &plugin.cmd {
                println!("      cmd: {:?}", cmd);
            }
            if !plugin.core_ignore.is_empty() {
                println!("      core_ignore: {:?}", plugin.core_ignore);
            }
        }
    }

    debug!("dry-run complete (nothing spawned)");
}
