// src/report/mod.rs

//! Status aggregation and notifications.

pub mod notify;
pub mod status;

pub use notify::Notifier;
pub use status::{summarize, render_lines, AnalysisGroup, GroupStatus};
