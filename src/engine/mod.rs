// src/engine/mod.rs

//! Restart coordination engine for devsup.
//!
//! This module ties together:
//! - the current runner slot and its stop / respawn bookkeeping
//! - restart coalescing (at most one restart in flight)
//! - watch pause / resume timing
//! - the main event loop that reacts to:
//!   - file-watch notifications
//!   - runner spawn / exit notifications
//!   - control-channel messages from the runner
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::control::ControlMessage;
use crate::errors::Result;
use crate::exec::Compiler;
use crate::types::{ChangeEvent, RunnerId};
use crate::watch::{CoreFilter, DepsPolicy};

/// Events flowing into the engine. Every event source, including the
/// completion of asynchronous work, goes through this one queue.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// A filesystem notification from the watch session.
    FileChanged(ChangeEvent),
    /// A requested spawn completed.
    RunnerSpawned { runner: RunnerId },
    /// A requested spawn failed.
    SpawnFailed { runner: RunnerId, error: String },
    /// The OS reported the runner gone. `code` is `None` for signal deaths.
    RunnerExited { runner: RunnerId, code: Option<i32> },
    /// The runner connected its control channel.
    ControlConnected { runner: RunnerId },
    /// The runner closed its control channel.
    ControlDisconnected { runner: RunnerId },
    /// A message from the runner.
    Control {
        runner: RunnerId,
        message: ControlMessage,
    },
    /// The notifier hit a runtime error. Restart-on-change may be degraded.
    WatcherFailed { error: String },
    /// External termination request (Ctrl-C, SIGTERM).
    ShutdownRequested,
}

/// Coarse state of the whole session, derived from the core's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Starting,
    Running,
    Stopping,
    Restarting,
    /// The runner exited with nothing pending; the next change restarts it.
    Idle,
    Terminated,
}

/// Freshly derived matcher / compiler state after a config file changed.
#[derive(Debug, Clone)]
pub struct Reconfiguration {
    pub filter: CoreFilter,
    pub deps: DepsPolicy,
    pub compiler: Arc<dyn Compiler>,
}

/// Re-derives configuration-dependent state on demand.
pub trait ConfigReloader: Send {
    fn reload(&mut self) -> Result<Reconfiguration>;
}

/// Core options fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct CoreOptions {
    /// Project root; reported dependency paths are matched relative to it.
    pub root: PathBuf,
    /// Root-relative paths whose change triggers a reload before restarting.
    pub config_files: Vec<String>,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod slot;

pub use self::core::SupervisorCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Supervisor;
pub use slot::{Connection, RunnerSlot, RunnerState};
