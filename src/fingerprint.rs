// src/fingerprint.rs

//! Output-content fingerprints backing restart analysis.
//!
//! A function is considered already done when all of its outputs exist *and*
//! their aggregate content hash matches the one recorded when the function
//! last completed. Each function owns a single entry file under
//! `<temp_dir>/fingerprints/`, so completions never rewrite each other's
//! records and a crashed run leaves every other entry intact.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

/// Directory (inside the temp dir) holding one fingerprint file per function.
pub const FINGERPRINT_DIR: &str = "fingerprints";

/// Compute a deterministic hash over the contents of the given files.
///
/// Paths are deduplicated and visited in sorted order, so the result does
/// not depend on iteration order. Missing paths contribute nothing; callers
/// that care about existence must check it separately.
pub fn compute_fingerprint<I, P>(paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let ordered: BTreeSet<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();

    let mut hasher = Hasher::new();
    for path in &ordered {
        if !path.is_file() {
            continue;
        }
        debug!("hashing file {:?}", path);
        let mut file = File::open(path)
            .with_context(|| format!("opening file for hashing: {:?}", path))?;
        io::copy(&mut file, &mut hasher)
            .with_context(|| format!("hashing contents of {:?}", path))?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// On-disk store of recorded output fingerprints.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    dir: PathBuf,
}

impl FingerprintStore {
    pub fn new(temp_dir: &Path) -> Self {
        Self {
            dir: temp_dir.join(FINGERPRINT_DIR),
        }
    }

    fn entry(&self, function: &str) -> PathBuf {
        self.dir.join(function)
    }

    /// The fingerprint recorded for a function, if any.
    pub fn lookup(&self, function: &str) -> Result<Option<String>> {
        let path = self.entry(function);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("reading fingerprint at {:?}", path))
            }
        }
    }

    /// Record a function's fingerprint, replacing any previous entry.
    pub fn record(&self, function: &str, hash: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating fingerprint directory at {:?}", self.dir))?;
        let path = self.entry(function);
        fs::write(&path, hash)
            .with_context(|| format!("writing fingerprint at {:?}", path))?;
        info!(function = %function, hash = %hash, "stored output fingerprint");
        Ok(())
    }
}
