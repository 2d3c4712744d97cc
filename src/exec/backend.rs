// src/exec/backend.rs

//! Pluggable runner backend abstraction.
//!
//! The engine talks to a `RunnerBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation in [`RealRunnerBackend`].
//!
//! Backends never return results directly: spawn completion, exit and
//! control traffic all come back as `SupervisorEvent`s on the engine's queue.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::SupervisorEvent;
use crate::exec::runner::{RunnerProcess, RunnerSpec};
use crate::sink::SharedSink;
use crate::types::RunnerId;

/// Trait abstracting how runner processes are started and stopped.
pub trait RunnerBackend: Send {
    /// Start runner `id`. Completion is reported as `RunnerSpawned` or
    /// `SpawnFailed`.
    fn spawn(&mut self, id: RunnerId) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Close runner `id`'s control channel.
    fn disconnect(&mut self, id: RunnerId);

    /// Signal runner `id`'s process tree to terminate.
    fn terminate(&mut self, id: RunnerId);
}

/// Real backend used in production.
///
/// Holds at most one [`RunnerProcess`]; spawning a new one discards the
/// previous handle.
pub struct RealRunnerBackend {
    spec: RunnerSpec,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    sink: SharedSink,
    current: Option<RunnerProcess>,
}

impl RealRunnerBackend {
    pub fn new(
        spec: RunnerSpec,
        events: mpsc::UnboundedSender<SupervisorEvent>,
        sink: SharedSink,
    ) -> Self {
        Self {
            spec,
            events,
            sink,
            current: None,
        }
    }

    fn process_mut(&mut self, id: RunnerId) -> Option<&mut RunnerProcess> {
        match self.current.as_mut() {
            Some(p) if p.id() == id => Some(p),
            _ => {
                debug!(runner = %id, "no live handle for runner");
                None
            }
        }
    }
}

impl RunnerBackend for RealRunnerBackend {
    fn spawn(&mut self, id: RunnerId) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.spec.clear {
                print!("\x1b[2J\x1b[H");
            }

            let event = match RunnerProcess::spawn(id, &self.spec, self.events.clone(), self.sink.clone()) {
                Ok(process) => {
                    info!(runner = %id, pid = ?process.pid(), cmd = ?self.spec.argv, "runner started");
                    self.current = Some(process);
                    SupervisorEvent::RunnerSpawned { runner: id }
                }
                Err(e) => {
                    error!(runner = %id, error = %e, "failed to start runner");
                    SupervisorEvent::SpawnFailed {
                        runner: id,
                        error: e.to_string(),
                    }
                }
            };

            if self.events.send(event).is_err() {
                debug!(runner = %id, "supervisor gone; spawn result not reported");
            }
        })
    }

    fn disconnect(&mut self, id: RunnerId) {
        if let Some(process) = self.process_mut(id) {
            process.disconnect();
        }
    }

    fn terminate(&mut self, id: RunnerId) {
        if let Some(process) = self.process_mut(id) {
            process.terminate();
        }
    }
}
