// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling allow / ignore glob patterns (`patterns`).
//! - Wiring up a cross-platform filesystem watcher (`notify`) with pause /
//!   resume and silent path addition (`watcher`).
//! - Fanning events out to independent listeners (`listeners`).
//!
//! It does **not** know about runner processes; the engine decides what a
//! change means.

pub mod listeners;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

use std::path::Path;

use crate::errors::Result;

pub use listeners::{Listener, ListenerSet, core_listener, plugin_listener};
pub use path_utils::DepsPolicy;
pub use patterns::{CoreFilter, PatternMatcher, build_core_filter};
pub use watcher::{ErrorHook, WatchSession};

/// The part of a watch session the engine drives.
pub trait WatchControl: Send {
    /// Stop delivering events. Idempotent.
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
    /// Extend the watched set without emitting an event for `path`.
    fn add_silently(&mut self, path: &Path) -> Result<()>;
}
