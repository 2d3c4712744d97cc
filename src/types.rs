use std::fmt;
use std::path::PathBuf;

/// Identity of one spawned runner process within a supervisor session.
///
/// Ids increase monotonically, so an event tagged with an id other than the
/// current runner's comes from a superseded process and can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunnerId(pub u64);

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of filesystem notification delivered by the watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
        };
        f.write_str(s)
    }
}

/// One `(eventType, path)` notification.
///
/// `path` is the absolute path reported by the notifier; `rel` is the same
/// path relative to the project root with forward slashes, which is what
/// glob patterns are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub rel: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>, rel: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            rel: rel.into(),
        }
    }
}

/// How a supervisor session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// An external termination request was honoured.
    Shutdown,
    /// The runner exited on its own with no restart pending; the session
    /// propagates its exit code.
    RunnerExited(i32),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Shutdown => 0,
            SessionOutcome::RunnerExited(code) => *code,
        }
    }
}
