// src/engine/shutdown.rs

//! Process-lifetime shutdown handling.
//!
//! Batch runners register their remote job ids here on submission and
//! unregister on completion. When the user interrupts the driver, the signal
//! handler flips the shared shutdown flag (the loop starts nothing new) and
//! cancels every job still registered, grouped per cancel invocation.
//!
//! Everything on this path is best-effort: errors are logged and swallowed,
//! and cancelling an already-finished job is harmless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::exec::batch::BatchFlavor;

/// Maximum job ids passed to one `bkill` / `qdel` invocation.
pub const CANCEL_BATCH: usize = 10;

/// A job submitted to a remote batch scheduler.
#[derive(Debug, Clone)]
pub struct RemoteJob {
    pub flavor: BatchFlavor,
    pub job_id: String,
}

static ACTIVE: OnceLock<Mutex<HashMap<u64, RemoteJob>>> = OnceLock::new();
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

fn registry() -> &'static Mutex<HashMap<u64, RemoteJob>> {
    ACTIVE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_registry() -> std::sync::MutexGuard<'static, HashMap<u64, RemoteJob>> {
    registry().lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register an in-flight remote job; returns a token for [`unregister`].
pub fn register(job: RemoteJob) -> u64 {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::SeqCst);
    lock_registry().insert(token, job);
    token
}

/// Remove a job from the registry once it has left the remote scheduler.
pub fn unregister(token: u64) {
    lock_registry().remove(&token);
}

/// Snapshot of the jobs currently registered.
pub fn active_jobs() -> Vec<RemoteJob> {
    lock_registry().values().cloned().collect()
}

/// Cancel every registered remote job, at most [`CANCEL_BATCH`] ids per
/// cancel invocation. Errors are logged, never propagated.
pub async fn cancel_active_jobs() {
    let jobs: Vec<RemoteJob> = lock_registry().drain().map(|(_, job)| job).collect();
    if jobs.is_empty() {
        return;
    }
    info!(jobs = jobs.len(), "cancelling outstanding batch jobs");

    let mut by_flavor: HashMap<BatchFlavor, Vec<String>> = HashMap::new();
    for job in jobs {
        by_flavor.entry(job.flavor).or_default().push(job.job_id);
    }

    for (flavor, ids) in by_flavor {
        for chunk in ids.chunks(CANCEL_BATCH) {
            let result = Command::new(flavor.cancel_program())
                .args(chunk)
                .output()
                .await;
            match result {
                Ok(output) if !output.status.success() => {
                    warn!(
                        program = flavor.cancel_program(),
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "batch cancel reported an error"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    error!(
                        program = flavor.cancel_program(),
                        error = %err,
                        "failed to invoke batch cancel"
                    );
                }
            }
        }
    }
}

/// Install the Ctrl-C handler.
///
/// On interrupt: flip the shared flag so the scheduling loop stops starting
/// work, then cancel everything still registered. This task must never
/// propagate an error.
pub fn install_signal_handler(shutting_down: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            return;
        }
        warn!("interrupt received; shutting down");
        shutting_down.store(true, Ordering::SeqCst);
        cancel_active_jobs().await;
    });
}
