// src/graph/node.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A node of the dependency graph: a *set of files*, possibly empty,
/// possibly singleton, possibly many.
///
/// Node identity is by value of the file set; two nodes with the same set of
/// paths are the same node. The ordered backing set makes hashing and display
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileSet(BTreeSet<PathBuf>);

impl FileSet {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn singleton(path: impl Into<PathBuf>) -> Self {
        Self(BTreeSet::from([path.into()]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }
}

impl From<&BTreeSet<PathBuf>> for FileSet {
    fn from(set: &BTreeSet<PathBuf>) -> Self {
        Self(set.clone())
    }
}

impl fmt::Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for path in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", path.display())?;
            first = false;
        }
        Ok(())
    }
}

/// Stable identifier of an interned [`FileSet`] within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}
