//! Structured queue key derivation.
//!
//! Every queue owns two store keys: a ready list (`queue:<name>`) holding
//! pending jobs and a working list (`queue:<name>:working`) holding jobs
//! currently claimed by some worker. `QueueKey` derives both from the bare
//! queue name so no caller ever concatenates key strings by hand.

/// Namespace prefix for ready-queue keys.
const QUEUE_PREFIX: &str = "queue:";

/// Suffix appended to a ready-queue key to form its working-list key.
const WORKING_SUFFIX: &str = ":working";

/// Key-pattern matching every working list in the store.
const WORKING_PATTERN: &str = "queue:*:working";

/// The pair of store keys belonging to one named queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    name: String,
    ready: String,
    working: String,
}

impl QueueKey {
    /// Creates a key pair from a bare queue name.
    ///
    /// A leading `queue:` prefix is stripped if present, so both `"mailer"`
    /// and `"queue:mailer"` name the same queue.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name
            .as_ref()
            .strip_prefix(QUEUE_PREFIX)
            .unwrap_or(name.as_ref())
            .to_string();
        let ready = format!("{}{}", QUEUE_PREFIX, name);
        let working = format!("{}{}", ready, WORKING_SUFFIX);

        Self {
            name,
            ready,
            working,
        }
    }

    /// Parses a working-list key (`queue:<name>:working`) back into a key
    /// pair. Returns `None` for keys outside the namespace.
    pub fn from_working_key(key: &str) -> Option<Self> {
        let name = key
            .strip_prefix(QUEUE_PREFIX)?
            .strip_suffix(WORKING_SUFFIX)?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name))
    }

    /// The bare queue name, namespace stripped. For display and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key of the ready queue.
    pub fn ready_key(&self) -> &str {
        &self.ready
    }

    /// Store key of the working list.
    pub fn working_key(&self) -> &str {
        &self.working
    }

    /// Glob pattern matching every working-list key in the store.
    pub fn working_pattern() -> &'static str {
        WORKING_PATTERN
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
