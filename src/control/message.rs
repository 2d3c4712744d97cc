// src/control/message.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{DevsupError, Result};

/// Runner → supervisor message.
///
/// Wire form, one per line:
///
/// ```text
/// {"type":"required","path":"/app/src/db.js"}
/// {"type":"error","message":"EADDRINUSE","will_terminate":true}
/// {"type":"ready"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The runner loaded this file; the supervisor may start watching it.
    #[serde(rename = "required")]
    RequiredPath { path: PathBuf },

    /// The runner hit a fatal condition. `will_terminate` means it is
    /// already on its way out and needs no signal.
    Error {
        message: String,
        #[serde(default, alias = "willTerminate")]
        will_terminate: bool,
    },

    /// The runner reached a steady state (e.g. its server is listening).
    Ready,
}

impl ControlMessage {
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| DevsupError::ControlError(format!("malformed control message: {e}")))
    }

    /// Encode as a single line, without the trailing newline.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DevsupError::ControlError(format!("encoding control message: {e}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::RequiredPath { .. } => "required",
            ControlMessage::Error { .. } => "error",
            ControlMessage::Ready => "ready",
        }
    }
}
