// src/report/status.rs

//! Per-analysis status aggregation.
//!
//! Function edges are grouped by their analysis label; within a group the
//! scatter shards and gathers are tracked separately from the main
//! functions. PENDING and RUNNING are indistinguishable here: the counters
//! only track what has finished, failed or been skipped.

use std::collections::HashMap;
use std::fmt;

use crate::function::ScatterTag;
use crate::graph::{Graph, Status};

/// Counters for one category of edges within an analysis group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Counts {
    fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Done => self.done += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
            Status::Pending | Status::Running => {}
        }
    }
}

/// Aggregated status of all edges sharing one analysis label.
#[derive(Debug, Clone, Default)]
pub struct AnalysisGroup {
    pub name: String,
    pub main: Counts,
    pub scatter: Counts,
    pub gather: Counts,
}

impl AnalysisGroup {
    fn combined(&self) -> Counts {
        Counts {
            total: self.main.total + self.scatter.total + self.gather.total,
            done: self.main.done + self.scatter.done + self.gather.done,
            failed: self.main.failed + self.scatter.failed + self.gather.failed,
            skipped: self.main.skipped + self.scatter.skipped + self.gather.skipped,
        }
    }

    /// Overall status of the group.
    pub fn status(&self) -> GroupStatus {
        let c = self.combined();
        if c.failed > 0 {
            GroupStatus::Failed
        } else if c.done == c.total {
            GroupStatus::Done
        } else if c.done + c.skipped == c.total {
            GroupStatus::Skipped
        } else if c.done > 0 {
            GroupStatus::Running
        } else {
            GroupStatus::Pending
        }
    }
}

/// Status of a whole analysis group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupStatus::Pending => "PENDING",
            GroupStatus::Running => "RUNNING",
            GroupStatus::Done => "DONE",
            GroupStatus::Failed => "FAILED",
            GroupStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// Group the graph's function edges by analysis label, in first-seen
/// declaration order.
pub fn summarize(graph: &Graph) -> Vec<AnalysisGroup> {
    let mut groups: Vec<AnalysisGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for id in graph.function_edge_ids() {
        let fe = graph.function_edge(id).expect("live function edge");
        let name = fe.function.analysis_name().to_string();

        let slot = *index.entry(name.clone()).or_insert_with(|| {
            groups.push(AnalysisGroup {
                name,
                ..AnalysisGroup::default()
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        match fe.function.scatter_tag() {
            ScatterTag::Clone => group.scatter.record(fe.status),
            ScatterTag::Gather => group.gather.record(fe.status),
            ScatterTag::None => group.main.record(fe.status),
        }
    }

    groups
}

/// Render one line per group: the name padded to the widest name, a centred
/// 7-char status, and scatter/gather tallies when the fan-out exceeds 1.
pub fn render_lines(groups: &[AnalysisGroup]) -> Vec<String> {
    let width = groups.iter().map(|g| g.name.len()).max().unwrap_or(0);

    groups
        .iter()
        .map(|group| {
            let mut line = format!(
                "{:<name_width$} [{:^7}]",
                group.name,
                group.status().to_string(),
                name_width = width
            );
            if group.scatter.total > 1 {
                line.push_str(&format!(
                    " s:{}t/{}d/{}f",
                    group.scatter.total, group.scatter.done, group.scatter.failed
                ));
            }
            if group.gather.total > 1 {
                line.push_str(&format!(
                    " g:{}t/{}d/{}f",
                    group.gather.total, group.gather.done, group.gather.failed
                ));
            }
            line
        })
        .collect()
}
