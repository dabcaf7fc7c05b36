//! Reliable job fetching with orphan sweeping.
//!
//! `ReliableFetcher` claims jobs by atomically moving them from a ready
//! queue into that queue's working list, so a worker crash between claim
//! and completion leaves the job recoverable instead of lost. Periodically
//! it sweeps the working lists for entries claimed longer than the
//! dead-job threshold and moves them back to their ready queues.
//!
//! # Delivery guarantee
//!
//! At-least-once. A sweep can race a slow-but-alive worker, and
//! remove-one-by-value can pick the wrong occurrence when two in-flight
//! payloads are byte-identical; either way a job may run more than once.
//! The design never silently drops a job.
//!
//! # Example
//!
//! ```rust,ignore
//! use reliable_fetch::{FetcherConfig, RedisListStore, ReliableFetcher};
//!
//! let store = RedisListStore::connect("redis://localhost:6379").await?;
//! let config = FetcherConfig::new(["mailer", "default"]);
//! let mut fetcher = ReliableFetcher::new(store, config)?;
//!
//! while let Some(unit) = fetcher.retrieve_work().await? {
//!     // hand the payload to the execution engine, then:
//!     unit.acknowledge(fetcher.store()).await?;
//! }
//! ```

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FetchError, StoreError};
use crate::keys::QueueKey;
use crate::message;
use crate::store::ListStore;
use crate::unit::UnitOfWork;

/// Default threshold after which a claimed job counts as dead (24 hours).
const DEFAULT_CONSIDER_DEAD_AFTER: Duration = Duration::from_secs(60 * 60 * 24);

/// Default sweep trigger: every N successful claims.
const DEFAULT_SWEEP_FETCH_COUNT: u64 = 5000;

/// Default time to wait when every configured queue is empty.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// How candidate queues are ordered on each fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSelection {
    /// Always try queues in the configured order. Earlier queues take
    /// absolute priority; later queues can starve under sustained load.
    Strict,
    /// Reshuffle the configured queue multiset on every call. Listing a
    /// queue N times gives it N-fold weight without ever starving the
    /// others.
    Weighted,
}

/// When the orphan sweep runs, relative to fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTrigger {
    /// Sweep once every N successful claims (primary policy).
    FetchCount(u64),
    /// Sweep once the given wall-clock interval has elapsed.
    Interval(Duration),
    /// Never sweep from the fetch path. Startup recovery still runs;
    /// call [`ReliableFetcher::sweep`] directly if needed.
    Disabled,
}

/// How an idle fetcher waits for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// After a fruitless pass over all candidates, block on the store's
    /// blocking move for up to the idle timeout. Lower idle CPU; default.
    Blocking,
    /// After a fruitless pass, sleep the idle timeout and return `None`.
    Polling,
}

/// Configuration for [`ReliableFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Queue names to fetch from. Duplicates are kept and act as weights
    /// under [`QueueSelection::Weighted`].
    pub queues: Vec<String>,
    /// Queue-selection policy.
    pub selection: QueueSelection,
    /// Orphan-sweep trigger.
    pub sweep: SweepTrigger,
    /// Age past which a claimed job is considered dead and requeued.
    pub consider_dead_after: Duration,
    /// How long to wait when all queues are empty.
    pub idle_timeout: Duration,
    /// Idle-wait behavior.
    pub strategy: FetchStrategy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            queues: Vec::new(),
            selection: QueueSelection::Weighted,
            sweep: SweepTrigger::FetchCount(DEFAULT_SWEEP_FETCH_COUNT),
            consider_dead_after: DEFAULT_CONSIDER_DEAD_AFTER,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            strategy: FetchStrategy::Blocking,
        }
    }
}

impl FetcherConfig {
    /// Creates a configuration fetching from the given queues.
    pub fn new<I, T>(queues: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets the queue-selection policy.
    pub fn with_selection(mut self, selection: QueueSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the orphan-sweep trigger.
    pub fn with_sweep(mut self, sweep: SweepTrigger) -> Self {
        self.sweep = sweep;
        self
    }

    /// Sets the dead-job threshold.
    pub fn with_consider_dead_after(mut self, threshold: Duration) -> Self {
        self.consider_dead_after = threshold;
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the idle-wait strategy.
    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Claims jobs from a set of ready queues into their working lists.
///
/// Holds its store instance explicitly; nothing here reaches for a global
/// connection. Run [`crate::recovery::requeue_on_startup`] once before the
/// first fetcher starts claiming.
pub struct ReliableFetcher<S> {
    store: S,
    queues: Vec<QueueKey>,
    unique_queues: Vec<QueueKey>,
    selection: QueueSelection,
    sweep_trigger: SweepTrigger,
    consider_dead_after: Duration,
    idle_timeout: Duration,
    strategy: FetchStrategy,
    fetched_since_sweep: u64,
    last_sweep: Instant,
}

impl<S: ListStore> ReliableFetcher<S> {
    /// Creates a fetcher over `store` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NoQueues` if the configuration names no queues.
    pub fn new(store: S, config: FetcherConfig) -> Result<Self, FetchError> {
        if config.queues.is_empty() {
            return Err(FetchError::NoQueues);
        }

        let queues: Vec<QueueKey> = config.queues.iter().map(QueueKey::new).collect();
        let mut seen = HashSet::new();
        let unique_queues = queues
            .iter()
            .filter(|q| seen.insert((*q).clone()))
            .cloned()
            .collect();

        Ok(Self {
            store,
            queues,
            unique_queues,
            selection: config.selection,
            sweep_trigger: config.sweep,
            consider_dead_after: config.consider_dead_after,
            idle_timeout: config.idle_timeout,
            strategy: config.strategy,
            fetched_since_sweep: 0,
            last_sweep: Instant::now(),
        })
    }

    /// The store this fetcher claims through.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Claims the next available job, or returns `None` after an idle wait.
    ///
    /// Runs the orphan sweep first when it is due; a failing sweep is
    /// logged and skipped, never aborting the fetch. A store failure
    /// during the claim itself propagates to the caller, who should back
    /// off before retrying.
    pub async fn retrieve_work(&mut self) -> Result<Option<UnitOfWork>, FetchError> {
        if self.sweep_due() {
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "orphan sweep failed, skipping this cycle");
            }
        }

        let order = self.candidate_order();
        for queue in &order {
            if let Some(unit) = self.try_claim(queue).await? {
                return Ok(Some(unit));
            }
        }

        // Nothing ready anywhere; wait out the idle timeout
        match self.strategy {
            FetchStrategy::Blocking => {
                let queue = &order[0];
                let claimed = self
                    .store
                    .blocking_move_tail_to_head(
                        queue.ready_key(),
                        queue.working_key(),
                        self.idle_timeout,
                    )
                    .await?;
                if let Some(message) = claimed {
                    self.fetched_since_sweep += 1;
                    return Ok(Some(UnitOfWork::new(queue.clone(), message)));
                }
            }
            FetchStrategy::Polling => {
                tokio::time::sleep(self.idle_timeout).await;
            }
        }

        Ok(None)
    }

    /// Sweeps every working list for jobs claimed longer than the dead-job
    /// threshold and moves them back to their ready queues.
    ///
    /// Called automatically from [`ReliableFetcher::retrieve_work`] per the
    /// configured trigger; exposed for operational use. The trigger resets
    /// at the start of the attempt, so a failing store does not turn every
    /// subsequent fetch into another sweep.
    pub async fn sweep(&mut self) -> Result<(), StoreError> {
        debug!("cleaning working queues");
        self.fetched_since_sweep = 0;
        self.last_sweep = Instant::now();

        for queue in &self.unique_queues {
            sweep_queue(&self.store, queue, self.consider_dead_after).await?;
        }

        Ok(())
    }

    async fn try_claim(&mut self, queue: &QueueKey) -> Result<Option<UnitOfWork>, FetchError> {
        let claimed = self
            .store
            .move_tail_to_head(queue.ready_key(), queue.working_key())
            .await?;

        Ok(claimed.map(|message| {
            self.fetched_since_sweep += 1;
            UnitOfWork::new(queue.clone(), message)
        }))
    }

    fn sweep_due(&self) -> bool {
        match self.sweep_trigger {
            SweepTrigger::FetchCount(count) => self.fetched_since_sweep >= count,
            SweepTrigger::Interval(interval) => self.last_sweep.elapsed() >= interval,
            SweepTrigger::Disabled => false,
        }
    }

    fn candidate_order(&self) -> Vec<QueueKey> {
        match self.selection {
            QueueSelection::Strict => self.queues.clone(),
            QueueSelection::Weighted => weighted_order(&self.queues, &mut rand::rng()),
        }
    }
}

/// Detect "old" jobs in one working list and requeue them, because the
/// worker they were assigned to probably failed.
///
/// NOTE a job that reliably crashes its worker will cycle through here
/// forever; callers that care should track attempts in the payload.
async fn sweep_queue<S: ListStore + ?Sized>(
    store: &S,
    queue: &QueueKey,
    consider_dead_after: Duration,
) -> Result<(), StoreError> {
    let entries = store.range(queue.working_key(), 0, -1).await?;
    let now = Utc::now().timestamp();
    let threshold = consider_dead_after.as_secs() as i64;

    for entry in entries {
        let age = now - message::parse_enqueued_at(&entry);
        if age < threshold {
            continue;
        }

        store
            .push_then_remove(queue.ready_key(), &entry, queue.working_key())
            .await?;
        info!(queue = queue.name(), "requeued a dead job from the working list");
    }

    Ok(())
}

/// A fresh drawing of the configured queue multiset, duplicates preserved.
fn weighted_order<R: Rng + ?Sized>(queues: &[QueueKey], rng: &mut R) -> Vec<QueueKey> {
    let mut order = queues.to_vec();
    order.shuffle(rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryListStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn payload(enqueued_at: i64) -> String {
        format!(r#"{{"jid":"j{}","enqueued_at":{}}}"#, enqueued_at, enqueued_at)
    }

    fn test_config(queues: &[&str]) -> FetcherConfig {
        FetcherConfig::new(queues.iter().copied())
            .with_strategy(FetchStrategy::Polling)
            .with_idle_timeout(Duration::from_millis(10))
    }

    #[test]
    fn test_config_defaults() {
        let config = FetcherConfig::default();

        assert!(config.queues.is_empty());
        assert_eq!(config.selection, QueueSelection::Weighted);
        assert_eq!(config.sweep, SweepTrigger::FetchCount(5000));
        assert_eq!(config.consider_dead_after, Duration::from_secs(86400));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.strategy, FetchStrategy::Blocking);
    }

    #[test]
    fn test_config_builder() {
        let config = FetcherConfig::new(["mailer", "default"])
            .with_selection(QueueSelection::Strict)
            .with_sweep(SweepTrigger::Interval(Duration::from_secs(60)))
            .with_consider_dead_after(Duration::from_secs(300))
            .with_idle_timeout(Duration::from_secs(1))
            .with_strategy(FetchStrategy::Polling);

        assert_eq!(config.queues, vec!["mailer", "default"]);
        assert_eq!(config.selection, QueueSelection::Strict);
        assert_eq!(config.sweep, SweepTrigger::Interval(Duration::from_secs(60)));
        assert_eq!(config.consider_dead_after, Duration::from_secs(300));
        assert_eq!(config.strategy, FetchStrategy::Polling);
    }

    #[test]
    fn test_new_rejects_empty_queue_set() {
        let result = ReliableFetcher::new(MemoryListStore::new(), FetcherConfig::default());
        assert!(matches!(result, Err(FetchError::NoQueues)));
    }

    #[test]
    fn test_weighted_order_preserves_multiset() {
        let queues: Vec<QueueKey> = ["a", "a", "b"].iter().map(QueueKey::new).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let order = weighted_order(&queues, &mut rng);

        assert_eq!(order.len(), 3);
        assert_eq!(order.iter().filter(|q| q.name() == "a").count(), 2);
        assert_eq!(order.iter().filter(|q| q.name() == "b").count(), 1);
    }

    #[test]
    fn test_weighted_order_frequency() {
        let queues: Vec<QueueKey> = ["a", "a", "b"].iter().map(QueueKey::new).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let trials = 3000;
        let mut a_first = 0;
        let mut b_first = 0;
        for _ in 0..trials {
            match weighted_order(&queues, &mut rng)[0].name() {
                "a" => a_first += 1,
                _ => b_first += 1,
            }
        }

        // a holds two of the three slots, so it should lead about 2/3 of
        // the time, and b must never be starved outright
        let a_ratio = a_first as f64 / trials as f64;
        assert!(a_ratio > 0.60 && a_ratio < 0.73, "a_ratio = {}", a_ratio);
        assert!(b_first > 0);
    }

    #[tokio::test]
    async fn test_strict_selection_claims_in_configured_order() {
        let store = MemoryListStore::new();
        store.push("queue:low", "low-job").await.expect("push should work");
        store.push("queue:high", "high-job").await.expect("push should work");

        let config = test_config(&["high", "low"]).with_selection(QueueSelection::Strict);
        let mut fetcher =
            ReliableFetcher::new(store, config).expect("fetcher should construct");

        let unit = fetcher
            .retrieve_work()
            .await
            .expect("fetch should work")
            .expect("a job should be available");
        assert_eq!(unit.queue_name(), "high");
        assert_eq!(unit.message(), "high-job");
    }

    #[tokio::test]
    async fn test_claim_moves_tail_into_working_head() {
        let store = MemoryListStore::new();
        for p in ["p1", "p2", "p3"] {
            store.push("queue:jobs", p).await.expect("push should work");
        }

        let config = test_config(&["jobs"]).with_selection(QueueSelection::Strict);
        let mut fetcher =
            ReliableFetcher::new(store.clone(), config).expect("fetcher should construct");

        let unit = fetcher
            .retrieve_work()
            .await
            .expect("fetch should work")
            .expect("a job should be available");
        assert_eq!(unit.message(), "p3");

        assert_eq!(
            store.range("queue:jobs", 0, -1).await.expect("range should work"),
            vec!["p1", "p2"]
        );
        assert_eq!(
            store
                .range("queue:jobs:working", 0, -1)
                .await
                .expect("range should work"),
            vec!["p3"]
        );
    }

    #[tokio::test]
    async fn test_retrieve_work_returns_none_when_idle() {
        let store = MemoryListStore::new();
        let mut fetcher = ReliableFetcher::new(store, test_config(&["jobs"]))
            .expect("fetcher should construct");

        let unit = fetcher.retrieve_work().await.expect("fetch should work");
        assert!(unit.is_none());
    }

    #[tokio::test]
    async fn test_sweep_requeues_only_jobs_past_threshold() {
        let store = MemoryListStore::new();
        let now = Utc::now().timestamp();
        let dead = payload(now - 120);
        let fresh = payload(now - 30);
        store.push("queue:jobs:working", &dead).await.expect("push should work");
        store.push("queue:jobs:working", &fresh).await.expect("push should work");

        let config =
            test_config(&["jobs"]).with_consider_dead_after(Duration::from_secs(60));
        let mut fetcher =
            ReliableFetcher::new(store.clone(), config).expect("fetcher should construct");
        fetcher.sweep().await.expect("sweep should work");

        assert_eq!(
            store.range("queue:jobs", 0, -1).await.expect("range should work"),
            vec![dead.clone()]
        );
        assert_eq!(
            store
                .range("queue:jobs:working", 0, -1)
                .await
                .expect("range should work"),
            vec![fresh]
        );
    }

    #[tokio::test]
    async fn test_sweep_treats_missing_timestamp_as_dead() {
        let store = MemoryListStore::new();
        store
            .push("queue:jobs:working", r#"{"class":"MailWorker"}"#)
            .await
            .expect("push should work");

        let config =
            test_config(&["jobs"]).with_consider_dead_after(Duration::from_secs(3600));
        let mut fetcher =
            ReliableFetcher::new(store.clone(), config).expect("fetcher should construct");
        fetcher.sweep().await.expect("sweep should work");

        assert_eq!(store.len("queue:jobs").await.expect("len should work"), 1);
        assert_eq!(
            store.len("queue:jobs:working").await.expect("len should work"),
            0
        );
    }

    #[tokio::test]
    async fn test_fetch_count_trigger_sweeps_after_n_claims() {
        let store = MemoryListStore::new();
        let now = Utc::now().timestamp();
        for i in 0..2 {
            store
                .push("queue:jobs", &payload(now + i))
                .await
                .expect("push should work");
        }
        let dead = payload(now - 7200);
        store.push("queue:jobs:working", &dead).await.expect("push should work");

        let config = test_config(&["jobs"])
            .with_selection(QueueSelection::Strict)
            .with_sweep(SweepTrigger::FetchCount(2))
            .with_consider_dead_after(Duration::from_secs(3600));
        let mut fetcher =
            ReliableFetcher::new(store.clone(), config).expect("fetcher should construct");

        // two claims arm the trigger without firing it
        for _ in 0..2 {
            fetcher
                .retrieve_work()
                .await
                .expect("fetch should work")
                .expect("a job should be available");
        }
        assert_eq!(
            store.len("queue:jobs:working").await.expect("len should work"),
            3
        );

        // the third call sweeps first, recovering the dead job for itself
        let unit = fetcher
            .retrieve_work()
            .await
            .expect("fetch should work")
            .expect("the recovered job should be claimable");
        assert_eq!(unit.message(), dead);
    }

    #[tokio::test]
    async fn test_disabled_trigger_never_sweeps() {
        let store = MemoryListStore::new();
        let dead = payload(0);
        store.push("queue:jobs:working", &dead).await.expect("push should work");

        let config = test_config(&["jobs"]).with_sweep(SweepTrigger::Disabled);
        let mut fetcher =
            ReliableFetcher::new(store.clone(), config).expect("fetcher should construct");

        assert!(fetcher
            .retrieve_work()
            .await
            .expect("fetch should work")
            .is_none());
        assert_eq!(
            store.len("queue:jobs:working").await.expect("len should work"),
            1
        );
    }
}
