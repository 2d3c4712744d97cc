// src/watch/listeners.rs

//! Ordered listener fan-out.
//!
//! Every listener sees every delivered event, in registration order. Each
//! decides relevance independently through its own predicate; one listener
//! rejecting an event never hides it from the next.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::PluginConfig;
use crate::engine::SupervisorEvent;
use crate::errors::Result;
use crate::exec::compiler::{spawn_detached, substitute_path};
use crate::sink::SharedSink;
use crate::types::ChangeEvent;
use crate::watch::patterns::PatternMatcher;

pub type Predicate = Box<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;
pub type Handler = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// One predicate + handler pair.
pub struct Listener {
    name: String,
    predicate: Predicate,
    handler: Handler,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Listener {
    pub fn new<P, H>(name: impl Into<String>, predicate: P, handler: H) -> Self
    where
        P: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
        H: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler if the predicate accepts the event.
    pub fn offer(&self, event: &ChangeEvent) -> bool {
        if (self.predicate)(event) {
            (self.handler)(event);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct ListenerSet {
    listeners: Vec<Listener>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Offer `event` to every listener; returns how many handled it.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let mut handled = 0;
        for listener in &self.listeners {
            if listener.offer(event) {
                debug!(listener = %listener.name, path = %event.rel, "listener accepted event");
                handled += 1;
            }
        }
        handled
    }
}

/// The supervisor's own listener.
///
/// It forwards every event: relevance is decided by the engine, whose
/// matcher may be rebuilt at runtime when configuration files change.
pub fn core_listener(events: mpsc::UnboundedSender<SupervisorEvent>) -> Listener {
    Listener::new(
        "core",
        |_event| true,
        move |event| {
            if events.send(SupervisorEvent::FileChanged(event.clone())).is_err() {
                warn!(path = %event.rel, "supervisor event channel closed; dropping file event");
            }
        },
    )
}

/// Listener for one `[plugin.<name>]` section.
///
/// Runs the plugin command, if any, for every matching event. The plugin's
/// `core_ignore` patterns are not used here; the core filter consults them.
pub fn plugin_listener(
    name: &str,
    cfg: &PluginConfig,
    cwd: &Path,
    sink: SharedSink,
) -> Result<Listener> {
    let matcher = PatternMatcher::build(&cfg.allow, &cfg.ignore)?;
    let cmd = cfg.cmd.clone();
    let cwd: PathBuf = cwd.to_path_buf();
    let label = format!("plugin:{name}");

    Ok(Listener::new(
        label.clone(),
        move |event| matcher.test(&event.rel),
        move |event| match &cmd {
            Some(argv) => {
                let argv = substitute_path(argv, &event.path);
                spawn_detached(label.clone(), argv, cwd.clone(), sink.clone());
            }
            None => debug!(plugin = %label, path = %event.rel, "plugin matched; no command configured"),
        },
    ))
}
