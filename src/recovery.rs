//! Startup and shutdown recovery.
//!
//! Two procedures bracket a process generation. At startup, every working
//! list is drained back into its ready queue so jobs orphaned by a prior
//! crash re-enter circulation before any new claims start. At graceful
//! shutdown, the jobs the process still holds claimed are pushed back in
//! one batch.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::keys::QueueKey;
use crate::store::{ListMove, ListStore};
use crate::unit::UnitOfWork;

/// Drains every working list back to its ready queue, one atomic move at a
/// time, until all are empty. Returns the number of jobs recovered.
///
/// Run once, before any fetcher starts claiming. Safe on empty working
/// lists and on lists left behind by an earlier process generation.
pub async fn requeue_on_startup<S: ListStore + ?Sized>(
    store: &S,
    queues: &[QueueKey],
) -> Result<usize, StoreError> {
    debug!("re-queueing working jobs");

    let mut counter = 0;
    let mut seen = HashSet::new();
    for queue in queues.iter().filter(|q| seen.insert((*q).clone())) {
        while store
            .move_tail_to_head(queue.working_key(), queue.ready_key())
            .await?
            .is_some()
        {
            counter += 1;
        }
    }

    debug!(requeued = counter, "re-queued working jobs");
    Ok(counter)
}

/// Returns every job the shutting-down process still holds claimed to its
/// ready queue, as one all-or-nothing batch.
///
/// A store failure here is logged as a warning naming the affected count
/// and not retried; an ungraceful exit past this point is the accepted
/// bounded job-loss window. No-op on an empty set.
pub async fn bulk_requeue<S: ListStore + ?Sized>(store: &S, in_progress: &[UnitOfWork]) {
    if in_progress.is_empty() {
        return;
    }

    debug!("re-queueing terminated jobs");

    let moves: Vec<ListMove> = in_progress
        .iter()
        .map(|unit| ListMove {
            push_to: unit.queue().ready_key().to_string(),
            remove_from: unit.queue().working_key().to_string(),
            value: unit.message().to_string(),
        })
        .collect();

    match store.push_then_remove_many(&moves).await {
        Ok(()) => info!(count = in_progress.len(), "pushed messages back to the store"),
        Err(e) => warn!(
            count = in_progress.len(),
            error = %e,
            "failed to requeue jobs"
        ),
    }
}
