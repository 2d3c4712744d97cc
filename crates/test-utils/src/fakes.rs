use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use devsup::engine::SupervisorEvent;
use devsup::errors::{DevsupError, Result};
use devsup::exec::{Compiler, RunnerBackend};
use devsup::sink::{EventSink, SharedSink, SinkEvent};
use devsup::types::RunnerId;
use devsup::watch::WatchControl;

/// What the supervisor asked the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Spawn(RunnerId),
    Disconnect(RunnerId),
    Terminate(RunnerId),
}

/// A fake runner backend that:
/// - records every call
/// - reports `RunnerSpawned` immediately for each spawn
/// - optionally reports `RunnerExited { code: None }` when terminated,
///   like a process that honours SIGTERM.
pub struct FakeBackend {
    events: mpsc::UnboundedSender<SupervisorEvent>,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    exit_on_terminate: bool,
}

impl FakeBackend {
    pub fn new(
        events: mpsc::UnboundedSender<SupervisorEvent>,
        calls: Arc<Mutex<Vec<BackendCall>>>,
    ) -> Self {
        Self {
            events,
            calls,
            exit_on_terminate: true,
        }
    }

    pub fn exit_on_terminate(mut self, value: bool) -> Self {
        self.exit_on_terminate = value;
        self
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RunnerBackend for FakeBackend {
    fn spawn(&mut self, id: RunnerId) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.record(BackendCall::Spawn(id));
            let _ = self.events.send(SupervisorEvent::RunnerSpawned { runner: id });
        })
    }

    fn disconnect(&mut self, id: RunnerId) {
        self.record(BackendCall::Disconnect(id));
    }

    fn terminate(&mut self, id: RunnerId) {
        self.record(BackendCall::Terminate(id));
        if self.exit_on_terminate {
            let _ = self
                .events
                .send(SupervisorEvent::RunnerExited { runner: id, code: None });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Pause,
    Resume,
    Add(PathBuf),
}

/// Watch session stand-in that records pause / resume / add calls.
///
/// Adds are recorded even when `fail_adds` makes them return an error.
#[derive(Clone, Default)]
pub struct RecordingWatch {
    pub calls: Arc<Mutex<Vec<WatchCall>>>,
    paused: Arc<Mutex<bool>>,
    failing_adds: Arc<AtomicBool>,
}

impl RecordingWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every following `add_silently` fail, or succeed again.
    pub fn fail_adds(&self, fail: bool) {
        self.failing_adds.store(fail, Ordering::SeqCst);
    }
}

impl WatchControl for RecordingWatch {
    fn pause(&self) {
        *self.paused.lock().unwrap() = true;
        self.calls.lock().unwrap().push(WatchCall::Pause);
    }

    fn resume(&self) {
        *self.paused.lock().unwrap() = false;
        self.calls.lock().unwrap().push(WatchCall::Resume);
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }

    fn add_silently(&mut self, path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(WatchCall::Add(path.to_path_buf()));
        if self.failing_adds.load(Ordering::SeqCst) {
            return Err(DevsupError::IoError(std::io::Error::other("no space left for watches")));
        }
        Ok(())
    }
}

/// Sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Compiler that only records which paths it was asked to compile.
#[derive(Debug, Default)]
pub struct RecordingCompiler {
    pub compiled: Mutex<Vec<PathBuf>>,
}

impl RecordingCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn compiled(&self) -> Vec<PathBuf> {
        self.compiled.lock().unwrap().clone()
    }
}

impl Compiler for RecordingCompiler {
    fn compile_changed(&self, path: &Path, _sink: &SharedSink) {
        self.compiled.lock().unwrap().push(path.to_path_buf());
    }
}
