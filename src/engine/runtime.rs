// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::{Compiler, RunnerBackend};
use crate::sink::SharedSink;
use crate::types::SessionOutcome;
use crate::watch::WatchControl;

use super::core::SupervisorCore;
use super::{ConfigReloader, CoreCommand, CoreStep, SupervisorEvent};

/// Drives the core supervisor in response to `SupervisorEvent`s and carries
/// out the commands it returns.
///
/// This is a pure IO shell around `SupervisorCore`, which contains all the
/// restart semantics. Events are handled strictly one at a time, in arrival
/// order; nothing here blocks waiting for a process to exit.
pub struct Supervisor<B: RunnerBackend> {
    core: SupervisorCore,
    event_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    backend: B,
    watch: Option<Box<dyn WatchControl>>,
    compiler: Arc<dyn Compiler>,
    sink: SharedSink,
    reloader: Option<Box<dyn ConfigReloader>>,
}

impl<B: RunnerBackend> fmt::Debug for Supervisor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: RunnerBackend> Supervisor<B> {
    pub fn new(
        core: SupervisorCore,
        event_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
        backend: B,
        compiler: Arc<dyn Compiler>,
        sink: SharedSink,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            watch: None,
            compiler,
            sink,
            reloader: None,
        }
    }

    /// Attach the watch session. Without one the supervisor still runs, just
    /// without file-triggered restarts.
    pub fn with_watch(mut self, watch: Box<dyn WatchControl>) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn with_reloader(mut self, reloader: Box<dyn ConfigReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Main event loop.
    ///
    /// Boots the first runner, then feeds every event into the core and
    /// executes the returned commands until the core finishes the session.
    ///
    /// Shutdown waits for the runner to exit with no upper bound; a runner
    /// that survives SIGKILL keeps the session alive.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        info!("supervisor started");

        let boot = self.core.boot();
        if let Some(outcome) = self.execute(boot).await? {
            return Ok(outcome);
        }

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("supervisor event channel closed; exiting");
                    return Ok(SessionOutcome::Shutdown);
                }
            };

            debug!(?event, "supervisor received event");

            if let SupervisorEvent::WatcherFailed { error } = &event {
                error!(%error, "file watcher failed; restart on change may be unavailable");
            }

            let step = self.core.step(event);
            if let Some(outcome) = self.execute(step).await? {
                info!(?outcome, "supervisor exiting");
                return Ok(outcome);
            }
        }
    }

    /// Execute the commands of one step. Returns the outcome once the core
    /// has finished the session.
    async fn execute(&mut self, step: CoreStep) -> Result<Option<SessionOutcome>> {
        let mut outcome = None;

        for command in step.commands {
            if let CoreCommand::Finish(o) = command {
                outcome = Some(o);
                continue;
            }
            self.execute_command(command).await?;
        }

        if !step.keep_running {
            return Ok(Some(outcome.unwrap_or(SessionOutcome::Shutdown)));
        }
        Ok(None)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::PauseWatch => {
                if let Some(watch) = &self.watch {
                    watch.pause();
                }
            }
            CoreCommand::ResumeWatch => {
                if let Some(watch) = &self.watch {
                    watch.resume();
                }
            }
            CoreCommand::ReloadConfig => self.reload_config(),
            CoreCommand::Compile(path) => self.compiler.compile_changed(&path, &self.sink),
            CoreCommand::Spawn(id) => self.backend.spawn(id).await,
            CoreCommand::Disconnect(id) => self.backend.disconnect(id),
            CoreCommand::Terminate(id) => self.backend.terminate(id),
            CoreCommand::AddWatchPath(path) => match self.watch.as_mut() {
                Some(watch) => {
                    if let Err(e) = watch.add_silently(&path) {
                        warn!(?path, error = %e, "failed to watch required path");
                        self.core.forget_required(&path);
                    }
                }
                None => debug!(?path, "no watch session; required path not watched"),
            },
            CoreCommand::Emit(event) => self.sink.emit(event),
            CoreCommand::ReportError(message) => error!(%message, "runner error"),
            CoreCommand::Finish(_) => {}
        }
        Ok(())
    }

    fn reload_config(&mut self) {
        let Some(reloader) = self.reloader.as_mut() else {
            debug!("no config reloader; keeping current configuration");
            return;
        };

        match reloader.reload() {
            Ok(next) => {
                info!("configuration reloaded");
                self.core.reconfigure(next.filter, next.deps);
                self.compiler = next.compiler;
            }
            Err(e) => warn!(error = %e, "config reload failed; keeping previous configuration"),
        }
    }
}
