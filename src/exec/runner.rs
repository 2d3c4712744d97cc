// src/exec/runner.rs

//! One spawned runner process.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::control::{CONTROL_ADDR_ENV, ControlChannel};
use crate::engine::SupervisorEvent;
use crate::errors::{DevsupError, Result};
use crate::exec::tree_kill::terminate_tree;
use crate::sink::{SharedSink, SinkEvent};
use crate::types::RunnerId;

pub const RUNNER_ID_ENV: &str = "DEVSUP_RUNNER_ID";
pub const LAYOUT_ENV: &str = "DEVSUP_LAYOUT";
pub const EVAL_ENV: &str = "DEVSUP_EVAL";
pub const EVAL_FILENAME_ENV: &str = "DEVSUP_EVAL_FILENAME";

/// Where the project lives, serialized into the runner's environment so it
/// can find the same root without rediscovering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub roots: Vec<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Code evaluated by the runner instead of a script (`--eval`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalSource {
    pub code: String,
    pub filename: String,
}

/// Everything needed to start a runner; identical for every respawn.
#[derive(Debug, Clone)]
pub struct RunnerSpec {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub kill_timeout: Duration,
    pub clear: bool,
    pub layout: ProjectLayout,
    pub eval: Option<EvalSource>,
}

impl RunnerSpec {
    pub fn from_config(cfg: &ConfigFile, layout: ProjectLayout, eval: Option<EvalSource>) -> Self {
        Self {
            argv: cfg.runner.cmd.clone(),
            env: cfg.runner.env.clone(),
            cwd: layout.root.clone(),
            kill_timeout: Duration::from_millis(cfg.runner.kill_timeout_ms),
            clear: cfg.runner.clear,
            layout,
            eval,
        }
    }

    /// Variables injected on top of the inherited environment.
    pub fn injected_env(&self, id: RunnerId, control_addr: &str) -> Result<Vec<(String, String)>> {
        let mut vars: Vec<(String, String)> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let layout = serde_json::to_string(&self.layout)
            .context("serializing project layout for the runner")?;

        vars.push((CONTROL_ADDR_ENV.to_string(), control_addr.to_string()));
        vars.push((RUNNER_ID_ENV.to_string(), id.0.to_string()));
        vars.push((LAYOUT_ENV.to_string(), layout));

        if let Some(eval) = &self.eval {
            vars.push((EVAL_ENV.to_string(), eval.code.clone()));
            vars.push((EVAL_FILENAME_ENV.to_string(), eval.filename.clone()));
        }

        Ok(vars)
    }
}

/// Handle to one live runner.
///
/// The OS child itself is owned by a background task that waits for it and
/// reports `RunnerExited` exactly once, when the OS says it is gone. This
/// handle only holds the ways to ask it to stop.
pub struct RunnerProcess {
    id: RunnerId,
    pid: Option<u32>,
    control: ControlChannel,
    terminate: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for RunnerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerProcess")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl RunnerProcess {
    /// Spawn the runner described by `spec`.
    ///
    /// stdout and stderr are forwarded line by line to `sink` as
    /// `SinkEvent::Logging`. Must be called from within a Tokio runtime.
    pub fn spawn(
        id: RunnerId,
        spec: &RunnerSpec,
        events: mpsc::UnboundedSender<SupervisorEvent>,
        sink: SharedSink,
    ) -> Result<Self> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| DevsupError::SpawnError("empty runner command".to_string()))?;

        let control = ControlChannel::open(id, events.clone())?;
        let env = spec.injected_env(id, &control.addr().to_string())?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        // Own process group, so the whole tree can be signalled together.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| DevsupError::SpawnError(format!("{program}: {e}")))?;
        let pid = child.id();

        forward_output(id, "stdout", child.stdout.take(), sink.clone());
        forward_output(id, "stderr", child.stderr.take(), sink);

        let (terminate_tx, terminate_rx) = oneshot::channel();
        tokio::spawn(watch_exit(id, child, terminate_rx, spec.kill_timeout, events));

        Ok(Self {
            id,
            pid,
            control,
            terminate: Some(terminate_tx),
        })
    }

    pub fn id(&self) -> RunnerId {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Graceful: close the control channel.
    pub fn disconnect(&mut self) {
        self.control.disconnect();
    }

    /// Forceful: signal the whole process tree. Only the first call sends
    /// anything.
    pub fn terminate(&mut self) {
        match self.terminate.take() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(runner = %self.id, "runner already exited; nothing to terminate");
                }
            }
            None => debug!(runner = %self.id, "terminate already requested"),
        }
    }
}

async fn watch_exit(
    id: RunnerId,
    mut child: Child,
    terminate_rx: oneshot::Receiver<()>,
    grace: Duration,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        requested = terminate_rx => {
            match requested {
                Ok(()) => {
                    if let Err(e) = terminate_tree(&mut child, grace).await {
                        warn!(runner = %id, error = %e, "failed to terminate runner process tree");
                    }
                }
                // Handle dropped without a request: keep waiting.
                Err(_) => debug!(runner = %id, "runner handle dropped"),
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => {
            info!(runner = %id, exit_code = ?status.code(), success = status.success(), "runner process exited");
            status.code()
        }
        Err(e) => {
            warn!(runner = %id, error = %e, "failed waiting for runner process");
            None
        }
    };

    if events.send(SupervisorEvent::RunnerExited { runner: id, code }).is_err() {
        debug!(runner = %id, "supervisor gone; exit not reported");
    }
}

fn forward_output<R>(id: RunnerId, stream: &'static str, reader: Option<R>, sink: SharedSink)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else {
        warn!(runner = %id, stream, "no pipe available for runner output");
        return;
    };

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => sink.emit(SinkEvent::Logging { data: line }),
                Ok(None) => break,
                Err(e) => {
                    debug!(runner = %id, stream, error = %e, "runner output stream error");
                    break;
                }
            }
        }
        debug!(runner = %id, stream, "runner output stream closed");
    });
}

