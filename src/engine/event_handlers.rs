// src/engine/event_handlers.rs

//! Event handling logic for the core supervisor.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::control::ControlMessage;
use crate::engine::core::SupervisorCore;
use crate::sink::SinkEvent;
use crate::types::{ChangeEvent, ChangeKind, RunnerId, SessionOutcome};
use crate::watch::path_utils::relative_or_full;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    PauseWatch,
    ResumeWatch,
    /// Re-derive matcher / compiler state from the configuration files.
    ReloadConfig,
    /// Fire-and-forget compile of a changed file.
    Compile(PathBuf),
    Spawn(RunnerId),
    /// Graceful: close the runner's control channel.
    Disconnect(RunnerId),
    /// Forceful: signal the runner's whole process tree.
    Terminate(RunnerId),
    /// Watch a dependency the runner reported, without emitting an event.
    AddWatchPath(PathBuf),
    Emit(SinkEvent),
    ReportError(String),
    Finish(SessionOutcome),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn idle() -> Self {
        Self::proceed(Vec::new())
    }

    pub fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn stop(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

impl SupervisorCore {
    /// Handle a filesystem notification.
    ///
    /// A relevant change pauses watching right away, so writes caused by the
    /// restart itself (compiled output, logs) cannot re-trigger it. The
    /// configuration files are always relevant, and so are watched
    /// dependencies unless an ignore rule denies them.
    pub(super) fn handle_file_change(&mut self, change: ChangeEvent) -> CoreStep {
        if self.shutting_down {
            debug!(path = %change.rel, "shutting down; ignoring change");
            return CoreStep::idle();
        }

        let is_config = self.options.config_files.iter().any(|f| *f == change.rel);
        // Dependencies the runner reported bypass the allow list, like they
        // did when they were added.
        let is_required =
            self.required.contains(&change.path) && !self.filter.is_ignored(&change.rel);
        if !is_config && !is_required && !self.filter.accepts(&change.rel) {
            debug!(path = %change.rel, "change not relevant to the runner");
            return CoreStep::idle();
        }

        info!(kind = %change.kind, path = %change.rel, "change detected");

        let mut commands = Vec::new();
        if !self.watch_paused {
            self.watch_paused = true;
            commands.push(CoreCommand::PauseWatch);
        }
        if is_config {
            commands.push(CoreCommand::ReloadConfig);
        } else if change.kind != ChangeKind::Unlink {
            commands.push(CoreCommand::Compile(change.path.clone()));
        }
        commands.extend(self.request_restart());

        CoreStep::proceed(commands)
    }

    /// Start a restart unless one is already in flight.
    ///
    /// The live runner is stopped and its replacement spawned from the exit
    /// notification; a runner that already exited is replaced immediately.
    fn request_restart(&mut self) -> Vec<CoreCommand> {
        if self.restarting {
            debug!("restart already in flight; coalescing trigger");
            return Vec::new();
        }
        self.restarting = true;

        let live = self.current.as_ref().map(|s| !s.is_exited()).unwrap_or(false);
        if live {
            info!("restarting runner");
            self.stop_current(false)
        } else {
            info!("no live runner; spawning");
            self.spawn_next()
        }
    }

    /// Stop the current runner, to be followed by a respawn.
    ///
    /// No-op when it already exited or is already stopping. With
    /// `will_terminate` the runner is known to be exiting on its own, so no
    /// termination signal is sent.
    pub(super) fn stop_current(&mut self, will_terminate: bool) -> Vec<CoreCommand> {
        let Some(slot) = self.current.as_mut() else {
            return Vec::new();
        };
        let id = slot.id();

        match slot.begin_stop(true, !will_terminate) {
            None => {
                debug!(runner = %id, "stop ignored; runner already stopping or exited");
                Vec::new()
            }
            Some(plan) => {
                debug!(runner = %id, ?plan, "stopping runner");
                let mut commands = Vec::new();
                if plan.disconnect {
                    commands.push(CoreCommand::Disconnect(id));
                }
                if plan.terminate {
                    commands.push(CoreCommand::Terminate(id));
                }
                commands
            }
        }
    }

    pub(super) fn handle_spawned(&mut self, runner: RunnerId) -> CoreStep {
        if !self.is_current(runner) {
            debug!(runner = %runner, "spawn completion of superseded runner");
            return CoreStep::idle();
        }
        let running = self.current.as_mut().map(|s| s.mark_running()).unwrap_or(false);
        if !running {
            // Stopped before the spawn completed; the exit still owes a respawn.
            debug!(runner = %runner, "spawn completed for a runner already stopping");
            return CoreStep::idle();
        }
        self.restarting = false;
        debug!(runner = %runner, "runner spawn completed");
        CoreStep::idle()
    }

    pub(super) fn handle_spawn_failed(&mut self, runner: RunnerId, error: String) -> CoreStep {
        if !self.is_current(runner) {
            return CoreStep::idle();
        }
        if let Some(slot) = self.current.as_mut() {
            slot.mark_exited();
        }
        self.restarting = false;

        let mut commands = vec![CoreCommand::ReportError(format!(
            "runner {runner} failed to start: {error}"
        ))];
        if self.shutting_down {
            self.finished = true;
            commands.push(CoreCommand::Finish(SessionOutcome::Shutdown));
            return CoreStep::stop(commands);
        }

        // Keep watching so that fixing the problem retries the spawn.
        commands.extend(self.resume_watch());
        CoreStep::proceed(commands)
    }

    pub(super) fn handle_exited(&mut self, runner: RunnerId, code: Option<i32>) -> CoreStep {
        if !self.is_current(runner) {
            debug!(runner = %runner, ?code, "exit of superseded runner");
            return CoreStep::idle();
        }

        let respawn = match self.current.as_mut() {
            Some(slot) => {
                let respawn = slot.respawn();
                slot.mark_exited();
                respawn
            }
            None => return CoreStep::idle(),
        };

        if self.shutting_down {
            info!(runner = %runner, ?code, "runner stopped; session shutting down");
            return self.finish(SessionOutcome::Shutdown);
        }

        if !respawn {
            match code {
                Some(code) => {
                    // Nothing asked for this exit: crash loudly.
                    warn!(runner = %runner, exit_code = code, "runner exited on its own; ending session");
                    return self.finish(SessionOutcome::RunnerExited(code));
                }
                None => warn!(runner = %runner, "runner killed by a signal; waiting for the next change"),
            }
        }

        if self.restarting {
            info!(runner = %runner, "previous runner exited; spawning replacement");
            return CoreStep::proceed(self.spawn_next());
        }

        debug!(runner = %runner, ?code, "runner exited; no restart pending");
        CoreStep::idle()
    }

    pub(super) fn handle_connection(&mut self, runner: RunnerId, connected: bool) -> CoreStep {
        if !self.is_current(runner) {
            return CoreStep::idle();
        }
        if let Some(slot) = self.current.as_mut() {
            if connected {
                slot.mark_connected();
            } else {
                slot.mark_disconnected();
            }
        }
        CoreStep::idle()
    }

    pub(super) fn handle_control(&mut self, runner: RunnerId, message: ControlMessage) -> CoreStep {
        if !self.is_current(runner) {
            debug!(runner = %runner, kind = message.kind(), "message from superseded runner ignored");
            return CoreStep::idle();
        }

        match message {
            ControlMessage::RequiredPath { path } => CoreStep::proceed(self.handle_required(path)),
            ControlMessage::Error {
                message,
                will_terminate,
            } => {
                let mut commands = vec![CoreCommand::ReportError(message)];
                if self.shutting_down {
                    return CoreStep::proceed(commands);
                }
                commands.extend(self.stop_current(will_terminate));
                // Future changes must still be able to restart.
                commands.extend(self.resume_watch());
                CoreStep::proceed(commands)
            }
            ControlMessage::Ready => {
                let stopping = self.current.as_ref().map(|s| s.is_stopping()).unwrap_or(false);
                if stopping || self.shutting_down {
                    debug!(runner = %runner, "ready from a stopping runner ignored");
                    return CoreStep::idle();
                }
                let mut commands = self.resume_watch();
                commands.push(CoreCommand::Emit(SinkEvent::ServerReady));
                CoreStep::proceed(commands)
            }
        }
    }

    /// Decide whether a dependency the runner loaded gets watched.
    fn handle_required(&mut self, path: PathBuf) -> Vec<CoreCommand> {
        let rel = relative_or_full(&self.options.root, &path);

        if self.filter.is_ignored(&rel) {
            debug!(path = %rel, "required path ignored by pattern");
            return Vec::new();
        }
        if !self.deps.allows(Path::new(&rel)) {
            debug!(path = %rel, max_depth = self.deps.max_depth, "required path nested too deep in dependencies");
            return Vec::new();
        }
        if !self.required.insert(path.clone()) {
            return Vec::new();
        }

        debug!(path = %rel, "watching required path");
        vec![CoreCommand::AddWatchPath(path)]
    }

    pub(super) fn handle_shutdown(&mut self) -> CoreStep {
        if self.shutting_down {
            debug!("shutdown already in progress");
            return CoreStep::idle();
        }
        self.shutting_down = true;
        self.restarting = false;
        info!("shutdown requested");

        let live = self.current.as_ref().map(|s| !s.is_exited()).unwrap_or(false);
        if !live {
            return self.finish(SessionOutcome::Shutdown);
        }

        let Some(slot) = self.current.as_mut() else {
            return CoreStep::idle();
        };
        let id = slot.id();
        let mut commands = Vec::new();

        match slot.begin_stop(false, true) {
            Some(plan) => {
                if plan.disconnect {
                    commands.push(CoreCommand::Disconnect(id));
                }
                if plan.terminate {
                    commands.push(CoreCommand::Terminate(id));
                }
            }
            None => {
                // A restart stop is already in flight: cancel its respawn and
                // make sure the tree is signalled.
                if slot.finalize_stop() {
                    commands.push(CoreCommand::Terminate(id));
                }
            }
        }

        CoreStep::proceed(commands)
    }

    fn resume_watch(&mut self) -> Vec<CoreCommand> {
        if self.watch_paused {
            self.watch_paused = false;
            vec![CoreCommand::ResumeWatch]
        } else {
            Vec::new()
        }
    }

    fn finish(&mut self, outcome: SessionOutcome) -> CoreStep {
        self.finished = true;
        CoreStep::stop(vec![CoreCommand::Finish(outcome)])
    }
}
