// src/engine/core.rs

//! Pure core supervisor state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`SupervisorEvent`]s and produces:
//! - an updated core state
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Supervisor`) is responsible for:
//! - reading events from the channel
//! - spawning / stopping runner processes through a backend
//! - pausing / resuming the watch session
//! - handling shutdown
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::engine::event_handlers::{CoreCommand, CoreStep};
use crate::engine::slot::{RunnerSlot, RunnerState};
use crate::engine::{CoreOptions, SessionPhase, SupervisorEvent};
use crate::types::RunnerId;
use crate::watch::{CoreFilter, DepsPolicy};

/// Pure core state.
///
/// Owns the only "current runner" slot. Nothing outside this type mutates the
/// runner's flags.
#[derive(Debug)]
pub struct SupervisorCore {
    pub(super) options: CoreOptions,
    pub(super) filter: CoreFilter,
    pub(super) deps: DepsPolicy,
    pub(super) current: Option<RunnerSlot>,
    pub(super) next_id: u64,
    /// A restart is in flight; further triggers coalesce into it.
    pub(super) restarting: bool,
    /// Mirror of the watch session's pause state, changed only by the
    /// commands this core issues.
    pub(super) watch_paused: bool,
    pub(super) shutting_down: bool,
    pub(super) finished: bool,
    /// Dependencies already added to the watch session.
    pub(super) required: HashSet<PathBuf>,
}

impl SupervisorCore {
    pub fn new(options: CoreOptions, filter: CoreFilter, deps: DepsPolicy) -> Self {
        Self {
            options,
            filter,
            deps,
            current: None,
            next_id: 1,
            restarting: false,
            watch_paused: false,
            shutting_down: false,
            finished: false,
            required: HashSet::new(),
        }
    }

    /// Initial boot: spawn the first runner. The watch session starts
    /// unpaused.
    pub fn boot(&mut self) -> CoreStep {
        info!("booting first runner");
        CoreStep::proceed(self.spawn_next())
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: SupervisorEvent) -> CoreStep {
        if self.finished {
            debug!(?event, "session already terminated; ignoring event");
            return CoreStep::stop(Vec::new());
        }

        match event {
            SupervisorEvent::FileChanged(change) => self.handle_file_change(change),
            SupervisorEvent::RunnerSpawned { runner } => self.handle_spawned(runner),
            SupervisorEvent::SpawnFailed { runner, error } => self.handle_spawn_failed(runner, error),
            SupervisorEvent::RunnerExited { runner, code } => self.handle_exited(runner, code),
            SupervisorEvent::ControlConnected { runner } => self.handle_connection(runner, true),
            SupervisorEvent::ControlDisconnected { runner } => self.handle_connection(runner, false),
            SupervisorEvent::Control { runner, message } => self.handle_control(runner, message),
            SupervisorEvent::WatcherFailed { error } => {
                // Non-fatal: the runner keeps going without file-triggered
                // restarts. The shell logs it.
                debug!(%error, "watcher failure noted");
                CoreStep::idle()
            }
            SupervisorEvent::ShutdownRequested => self.handle_shutdown(),
        }
    }

    /// Swap in freshly derived matcher state.
    pub fn reconfigure(&mut self, filter: CoreFilter, deps: DepsPolicy) {
        self.filter = filter;
        self.deps = deps;
    }

    /// Drop a dependency from the watched set so a later report of the same
    /// path is tried again. Used when adding it to the watch session failed.
    pub fn forget_required(&mut self, path: &Path) {
        self.required.remove(path);
    }

    pub fn current_runner(&self) -> Option<&RunnerSlot> {
        self.current.as_ref()
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting
    }

    pub fn is_watch_paused(&self) -> bool {
        self.watch_paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn phase(&self) -> SessionPhase {
        if self.finished {
            return SessionPhase::Terminated;
        }
        if self.shutting_down {
            return SessionPhase::Stopping;
        }
        let Some(slot) = &self.current else {
            return SessionPhase::Starting;
        };
        match (slot.state(), self.restarting) {
            (_, true) => SessionPhase::Restarting,
            (RunnerState::Starting, false) => SessionPhase::Starting,
            (RunnerState::Running, false) => SessionPhase::Running,
            (RunnerState::Stopping { .. }, false) => SessionPhase::Stopping,
            (RunnerState::Exited, false) => SessionPhase::Idle,
        }
    }

    /// Whether `runner` is the current slot. Events from superseded runners
    /// are dropped by every handler.
    pub(super) fn is_current(&self, runner: RunnerId) -> bool {
        self.current.as_ref().map(|s| s.id() == runner).unwrap_or(false)
    }

    pub(super) fn allocate_id(&mut self) -> RunnerId {
        let id = RunnerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fill the slot with a new runner and ask the shell to spawn it.
    pub(super) fn spawn_next(&mut self) -> Vec<CoreCommand> {
        let id = self.allocate_id();
        self.current = Some(RunnerSlot::starting(id));
        debug!(runner = %id, "requesting spawn");
        vec![CoreCommand::Spawn(id)]
    }
}
