//! Optimistic transactions with transparent retry.
//!
//! [`run`] watches a set of keys, hands the caller a [`Transaction`] to read
//! through and stage writes into, then tries to commit the staged writes. If
//! another client modified a watched key in between, the commit is refused and
//! the whole body runs again against fresh state.
//!
//! Reads inside the body see the body's own staged writes, so a body can be
//! written as if its commands executed one after another.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::{Store, StoreError, WatchToken, WriteOp};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1);

/// How often a conflicting transaction is retried, and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Upper bound of the random pause before the next attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    fn pause(&self) {
        if self.backoff.is_zero() {
            return;
        }
        let ceiling = u64::try_from(self.backoff.as_micros()).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=ceiling);
        thread::sleep(Duration::from_micros(jitter));
    }
}

pub struct Transaction<'s, S: ?Sized> {
    store: &'s S,
    staged: Vec<WriteOp>,
}

impl<'s, S: Store + ?Sized> Transaction<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            staged: Vec::new(),
        }
    }

    /// Stages adding `member` to a set. Returns 0 if it is already a member,
    /// either in the store or through an earlier staged add.
    pub fn sadd(&mut self, key: &str, member: &str) -> Result<u64, StoreError> {
        if self.staged_member(key, member) || self.store.sismember(key, member)? {
            return Ok(0);
        }
        self.staged.push(WriteOp::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        });
        Ok(1)
    }

    pub fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let staged = self
            .staged
            .iter()
            .filter(|op| matches!(op, WriteOp::SAdd { key: k, .. } if k == key))
            .count() as u64;
        Ok(self.store.scard(key)? + staged)
    }

    pub fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let staged = self.staged.iter().rev().find_map(|op| match op {
            WriteOp::ZAdd {
                key: k,
                member: m,
                score,
            } if k == key && m == member => Some(*score),
            _ => None,
        });
        match staged {
            Some(score) => Ok(Some(score)),
            None => self.store.zscore(key, member),
        }
    }

    pub fn zadd(&mut self, key: &str, member: &str, score: f64) {
        self.staged.push(WriteOp::ZAdd {
            key: key.to_string(),
            member: member.to_string(),
            score,
        });
    }

    fn staged_member(&self, key: &str, member: &str) -> bool {
        self.staged.iter().any(|op| {
            matches!(op, WriteOp::SAdd { key: k, member: m } if k == key && m == member)
        })
    }

    fn commit(self, token: &WatchToken) -> Result<bool, StoreError> {
        self.store.exec(token, &self.staged)
    }
}

/// Runs `body` as an optimistic transaction over `watched`.
///
/// An error from `body` aborts without writing anything and is returned as
/// is. A refused commit reruns `body` until `policy.max_attempts` attempts
/// have been made, after which [`StoreError::Conflict`] is returned.
pub fn run<S, T, E, F>(
    store: &S,
    watched: &[String],
    policy: &RetryPolicy,
    mut body: F,
) -> Result<T, E>
where
    S: Store + ?Sized,
    E: From<StoreError>,
    F: FnMut(&mut Transaction<'_, S>) -> Result<T, E>,
{
    for attempt in 1..=policy.max_attempts {
        let token = store.watch(watched)?;
        let mut tx = Transaction::new(store);
        let value = body(&mut tx)?;

        if tx.commit(&token)? {
            return Ok(value);
        }

        debug!(attempt, keys = ?watched, "watched key changed, retrying transaction");
        if attempt < policy.max_attempts {
            policy.pause();
        }
    }

    Err(StoreError::Conflict {
        attempts: policy.max_attempts,
    }
    .into())
}
