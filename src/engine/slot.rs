// src/engine/slot.rs

//! Bookkeeping for the single "current runner" slot.
//!
//! All flag changes go through the named transitions below; the engine never
//! pokes at the state ad hoc.

use crate::types::RunnerId;

/// Lifecycle of one runner as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Spawn requested, completion not yet reported.
    Starting,
    Running,
    /// A stop is in flight. `respawn` says whether the exit is expected to be
    /// followed by a fresh spawn (supervisor-initiated stops) or not
    /// (session shutdown).
    Stopping { respawn: bool },
    /// The OS reported the process gone. Terminal.
    Exited,
}

/// Control-channel connection as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Unknown,
    Connected,
    Disconnected,
}

/// What a stop request must actually do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPlan {
    pub disconnect: bool,
    pub terminate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSlot {
    id: RunnerId,
    state: RunnerState,
    connection: Connection,
    signalled: bool,
}

impl RunnerSlot {
    pub fn starting(id: RunnerId) -> Self {
        Self {
            id,
            state: RunnerState::Starting,
            connection: Connection::Unknown,
            signalled: false,
        }
    }

    pub fn id(&self) -> RunnerId {
        self.id
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_exited(&self) -> bool {
        self.state == RunnerState::Exited
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self.state, RunnerState::Stopping { .. })
    }

    /// Whether the pending exit should lead to a respawn.
    pub fn respawn(&self) -> bool {
        matches!(self.state, RunnerState::Stopping { respawn: true })
    }

    /// Whether a termination signal has been requested for this runner.
    pub fn signalled(&self) -> bool {
        self.signalled
    }

    /// Returns true only on the `Starting -> Running` transition; a runner
    /// asked to stop before its spawn completed stays `Stopping`.
    pub fn mark_running(&mut self) -> bool {
        if self.state == RunnerState::Starting {
            self.state = RunnerState::Running;
            true
        } else {
            false
        }
    }

    pub fn mark_connected(&mut self) {
        if !self.is_exited() {
            self.connection = Connection::Connected;
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.connection = Connection::Disconnected;
    }

    pub fn mark_exited(&mut self) {
        self.state = RunnerState::Exited;
        self.connection = Connection::Disconnected;
    }

    /// Begin stopping. Returns `None` when the runner already exited or a
    /// stop is already in flight, which makes repeated stops no-ops.
    ///
    /// `signal` asks for a forceful tree kill in addition to disconnecting.
    pub fn begin_stop(&mut self, respawn: bool, signal: bool) -> Option<StopPlan> {
        match self.state {
            RunnerState::Exited | RunnerState::Stopping { .. } => None,
            RunnerState::Starting | RunnerState::Running => {
                self.state = RunnerState::Stopping { respawn };
                let disconnect = self.connection == Connection::Connected;
                if disconnect {
                    self.connection = Connection::Disconnected;
                }
                let terminate = signal && !self.signalled;
                if terminate {
                    self.signalled = true;
                }
                Some(StopPlan {
                    disconnect,
                    terminate,
                })
            }
        }
    }

    /// Turn an in-flight stop into a final one (no respawn). Returns true if
    /// a termination signal still needs to be sent.
    pub fn finalize_stop(&mut self) -> bool {
        if let RunnerState::Stopping { .. } = self.state {
            self.state = RunnerState::Stopping { respawn: false };
        }
        if self.signalled || self.is_exited() {
            false
        } else {
            self.signalled = true;
            true
        }
    }
}
