use pipedag::engine::shutdown::{active_jobs, register, unregister, RemoteJob};
use pipedag::exec::BatchFlavor;

// The registry is process-global, so everything lives in one test.
#[test]
fn registry_tracks_in_flight_batch_jobs() {
    assert!(active_jobs().is_empty());

    let first = register(RemoteJob {
        flavor: BatchFlavor::Lsf,
        job_id: "101".to_string(),
    });
    let second = register(RemoteJob {
        flavor: BatchFlavor::GridEngine,
        job_id: "202".to_string(),
    });

    let mut ids: Vec<String> = active_jobs().into_iter().map(|j| j.job_id).collect();
    ids.sort();
    assert_eq!(ids, ["101", "202"]);

    unregister(first);
    let ids: Vec<String> = active_jobs().into_iter().map(|j| j.job_id).collect();
    assert_eq!(ids, ["202"]);

    unregister(second);
    assert!(active_jobs().is_empty());

    // Unregistering twice is harmless.
    unregister(second);
    assert!(active_jobs().is_empty());
}
