//! In-process store implementation.
//!
//! Backs the same [`ListStore`] contract with a mutex-guarded map of
//! lists. Every operation takes the single lock, so the push+remove
//! batches are trivially all-or-nothing. Intended for tests and local
//! development; nothing here persists.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;

use super::{ListMove, ListStore};

/// Poll granularity for emulated blocking moves.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// In-memory queue store.
///
/// Lists are kept head-to-tail; a list whose last element is removed is
/// dropped entirely, matching Redis key semantics so `keys` only ever
/// reports non-empty lists.
#[derive(Debug, Clone, Default)]
pub struct MemoryListStore {
    lists: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
}

impl MemoryListStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn pop_tail_push_head(
        lists: &mut HashMap<String, VecDeque<String>>,
        src: &str,
        dst: &str,
    ) -> Option<String> {
        let value = {
            let list = lists.get_mut(src)?;
            let value = list.pop_back()?;
            if list.is_empty() {
                lists.remove(src);
            }
            value
        };
        lists.entry(dst.to_string()).or_default().push_front(value.clone());
        Some(value)
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn move_tail_to_head(
        &self,
        src: &str,
        dst: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut lists = self.lists.lock().await;
        Ok(Self::pop_tail_push_head(&mut lists, src, dst))
    }

    async fn blocking_move_tail_to_head(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.move_tail_to_head(src, dst).await? {
                return Ok(Some(value));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(BLOCKING_POLL_INTERVAL).await;
        }
    }

    async fn range(
        &self,
        list: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().await;
        let Some(entries) = lists.get(list) else {
            return Ok(Vec::new());
        };

        let len = entries.len() as isize;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        Ok(entries
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn len(&self, list: &str) -> Result<usize, StoreError> {
        let lists = self.lists.lock().await;
        Ok(lists.get(list).map_or(0, VecDeque::len))
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists
            .entry(list.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn remove_one(&self, list: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = self.lists.lock().await;
        Ok(remove_first(&mut lists, list, value))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().await;
        Ok(lists
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn push_then_remove(
        &self,
        push_to: &str,
        value: &str,
        remove_from: &str,
    ) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists
            .entry(push_to.to_string())
            .or_default()
            .push_back(value.to_string());
        remove_first(&mut lists, remove_from, value);
        Ok(())
    }

    async fn push_then_remove_many(&self, moves: &[ListMove]) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        for mv in moves {
            lists
                .entry(mv.push_to.clone())
                .or_default()
                .push_back(mv.value.clone());
            remove_first(&mut lists, &mv.remove_from, &mv.value);
        }
        Ok(())
    }
}

fn remove_first(
    lists: &mut HashMap<String, VecDeque<String>>,
    list: &str,
    value: &str,
) -> usize {
    let Some(entries) = lists.get_mut(list) else {
        return 0;
    };
    let Some(index) = entries.iter().position(|e| e == value) else {
        return 0;
    };
    entries.remove(index);
    if entries.is_empty() {
        lists.remove(list);
    }
    1
}

/// Minimal Redis-style glob matching: `*` matches any run of characters,
/// `?` matches exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&pattern[1..], text)
                    || (!text.is_empty() && matches(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => matches(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => matches(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pattern, &text)
}
