// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] spawns one runner process and watches it until exit.
//! - [`tree_kill`] terminates a runner together with everything it spawned.
//! - [`backend`] provides the `RunnerBackend` trait and the production
//!   `RealRunnerBackend`, which tests replace with a fake.
//! - [`compiler`] runs the fire-and-forget compile step and plugin commands.

pub mod backend;
pub mod compiler;
pub mod runner;
pub mod tree_kill;

pub use backend::{RealRunnerBackend, RunnerBackend};
pub use compiler::{CommandCompiler, Compiler, NoopCompiler, build_compiler};
pub use runner::{EvalSource, ProjectLayout, RunnerProcess, RunnerSpec};
