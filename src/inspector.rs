//! Read-only inspection of working lists.
//!
//! `WorkingQueue` enumerates the jobs currently claimed from one queue,
//! for operational dashboards. The scan pages through the list in fixed
//! windows and shifts each page's indices back by the number of entries
//! that have disappeared since the scan started, so entries acknowledged
//! or swept out mid-scan never cause unread entries to be skipped. Every
//! entry present at scan start is visited at least once; entries inserted
//! mid-scan may be visited or missed.
//!
//! Inspection is observability, not correctness: it never mutates the
//! lists it reads.

use crate::error::StoreError;
use crate::keys::QueueKey;
use crate::message::JobRecord;
use crate::store::ListStore;

/// Entries fetched per page during a scan.
const PAGE_SIZE: usize = 50;

/// Read-only view of one queue's working list.
pub struct WorkingQueue<S> {
    store: S,
    queue: QueueKey,
}

impl<S: ListStore> WorkingQueue<S> {
    /// Creates an inspector for `queue`'s working list.
    pub fn new(store: S, queue: QueueKey) -> Self {
        Self { store, queue }
    }

    /// Lists every non-empty working list in the store, sorted by name.
    pub async fn all(store: &S) -> Result<Vec<WorkingQueue<S>>, StoreError>
    where
        S: Clone,
    {
        let mut keys = store.keys(QueueKey::working_pattern()).await?;
        keys.sort();

        Ok(keys
            .iter()
            .filter_map(|key| QueueKey::from_working_key(key))
            .map(|queue| WorkingQueue::new(store.clone(), queue))
            .collect())
    }

    /// Display name of the inspected queue.
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Current length of the working list.
    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store.len(self.queue.working_key()).await
    }

    /// Collects the working list's jobs via a shrink-tolerant paginated
    /// scan. Returns an empty vector for an empty list.
    pub async fn jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut jobs = Vec::new();
        self.scan(|record| {
            jobs.push(record);
            false
        })
        .await?;
        Ok(jobs)
    }

    /// Finds the first in-flight job with the given identifier, scanning
    /// pages lazily.
    pub async fn find_job(&self, jid: &str) -> Result<Option<JobRecord>, StoreError> {
        let mut found = None;
        self.scan(|record| {
            if record.jid() == Some(jid) {
                found = Some(record);
                true
            } else {
                false
            }
        })
        .await?;
        Ok(found)
    }

    /// Pages through the working list, yielding each entry to `visit`
    /// until it returns `true` or an empty page ends the scan.
    ///
    /// Before each fetch the page's start index is pulled back by
    /// `initial_len - current_len`, floored at zero, compensating for
    /// entries removed behind the cursor.
    async fn scan<F>(&self, mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(JobRecord) -> bool,
    {
        let key = self.queue.working_key();
        let initial_len = self.store.len(key).await?;
        let mut deleted = 0usize;
        let mut page = 0usize;

        loop {
            let start = (page * PAGE_SIZE).saturating_sub(deleted);
            let stop = start + PAGE_SIZE - 1;
            let entries = self.store.range(key, start as isize, stop as isize).await?;
            if entries.is_empty() {
                return Ok(());
            }
            page += 1;

            for raw in entries {
                if visit(JobRecord::new(raw, self.queue.name())) {
                    return Ok(());
                }
            }

            deleted = initial_len.saturating_sub(self.store.len(key).await?);
        }
    }
}
