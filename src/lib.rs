//! reliable-fetch: at-least-once job fetching on top of Redis lists.
//!
//! Plain pop-based fetching loses jobs when a worker crashes between
//! popping and finishing. This crate instead claims each job by atomically
//! moving it from its ready queue (`queue:<name>`) into a per-queue
//! working list (`queue:<name>:working`), so crashed workers' jobs are
//! recoverable rather than lost:
//!
//! - **ReliableFetcher**: claims jobs via the store's atomic move, applies
//!   strict or weighted queue selection, and periodically sweeps working
//!   lists for jobs claimed longer than the dead-job threshold
//! - **UnitOfWork**: the handle for one claimed job; acknowledge on
//!   success, requeue to undo the claim
//! - **recovery**: startup drain of orphaned working lists and batched
//!   shutdown requeue
//! - **WorkingQueue**: read-only paginated inspection of in-flight jobs,
//!   tolerant of concurrent removals
//!
//! The store is a seam: [`ListStore`] captures the handful of atomic list
//! operations the design needs, with a Redis backend for production and an
//! in-memory backend for tests.
//!
//! ```text
//!   producer ──RPUSH──▶ queue:mailer ──RPOPLPUSH──▶ queue:mailer:working
//!                            ▲                             │
//!                            │    sweep / requeue /        │ acknowledge
//!                            └──── startup recovery ◀──────┘  (LREM)
//! ```
//!
//! Delivery is at-least-once: recovery can race live workers, so payloads
//! may be processed more than once, but no job is ever silently dropped.

pub mod error;
pub mod fetcher;
pub mod inspector;
pub mod keys;
pub mod message;
pub mod recovery;
pub mod store;
pub mod unit;

pub use error::{FetchError, StoreError};
pub use fetcher::{
    FetchStrategy, FetcherConfig, QueueSelection, ReliableFetcher, SweepTrigger,
};
pub use inspector::WorkingQueue;
pub use keys::QueueKey;
pub use message::JobRecord;
pub use store::{ListMove, ListStore, MemoryListStore, RedisListStore};
pub use unit::UnitOfWork;
