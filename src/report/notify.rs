// src/report/notify.rs

//! Status and failure notifications.
//!
//! Bodies are rendered here; the transport is a logging sink. Wiring an
//! actual mail relay is left to the deployment.

use tracing::info;

use crate::graph::{EdgeId, Graph, Status};
use crate::report::status::{render_lines, summarize};

/// Notification recipients, from `--status-email-to` / `--status-email-from`.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    to: Vec<String>,
    from: Option<String>,
}

impl Notifier {
    pub fn new(to: Vec<String>, from: Option<String>) -> Self {
        Self { to, from }
    }

    /// A notifier that sends nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn configured(&self) -> bool {
        !self.to.is_empty()
    }

    /// Emit a notification. A no-op when no recipients are configured.
    pub fn send(&self, subject: &str, body: &str) {
        if !self.configured() {
            return;
        }
        info!(
            to = ?self.to,
            from = ?self.from,
            subject = %subject,
            "notification:\n{}",
            body
        );
    }
}

/// Body of the end-of-run status notification: one line per analysis group,
/// followed by the log-file locations of every failed function.
pub fn status_body(graph: &Graph) -> String {
    let mut body = render_lines(&summarize(graph)).join("\n");

    let failed: Vec<EdgeId> = graph
        .function_edge_ids()
        .into_iter()
        .filter(|&id| {
            graph
                .function_edge(id)
                .is_some_and(|fe| fe.status == Status::Failed)
        })
        .collect();

    if !failed.is_empty() {
        body.push_str("\n\n");
        body.push_str(&failure_body(graph, &failed));
    }
    body
}

/// Body of a failure notification: each failed function with the paths to
/// its job output and error files.
pub fn failure_body(graph: &Graph, failed: &[EdgeId]) -> String {
    let mut body = String::from("failed functions:\n");
    for &id in failed {
        let Some(fe) = graph.function_edge(id) else { continue };
        body.push_str(&format!("  {}\n", fe.function.display()));
        if let Some(path) = fe.function.job_output_file() {
            body.push_str(&format!("    output: {}\n", path.display()));
        }
        if let Some(path) = fe.function.job_error_file() {
            body.push_str(&format!("    errors: {}\n", path.display()));
        }
    }
    body
}
