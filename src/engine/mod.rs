// src/engine/mod.rs

//! The scheduling engine.
//!
//! - [`runtime`] drives ready edges into runners and polls running jobs to
//!   completion.
//! - [`shutdown`] owns the process-wide registry of in-flight batch jobs and
//!   the signal handler that cancels them.

pub mod runtime;
pub mod shutdown;

pub use runtime::{RunOutcome, Runtime, RuntimeOptions};
