// src/sink.rs

//! Outputs towards the embedding application.
//!
//! The sink carries the runner's own output and the readiness signal.
//! Supervisor diagnostics go through `tracing` instead, so the two streams
//! are never conflated.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Event delivered to the sink.
///
/// Serializes as `{"event":"logging","data":"..."}` and
/// `{"event":"serverReady"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SinkEvent {
    Logging { data: String },
    ServerReady,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SinkEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Terminal sink used by the `devsup` binary: runner output goes to stdout
/// verbatim, readiness becomes a log line.
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: SinkEvent) {
        match event {
            SinkEvent::Logging { data } => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{data}") {
                    warn!(error = %e, "failed to write runner output to stdout");
                }
            }
            SinkEvent::ServerReady => info!("runner reported ready"),
        }
    }
}

/// Forwards events into a channel, for embedding devsup in another program.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SinkEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
