//! The data-structure store the ratings live in.
//!
//! [`Store`] is the capability contract every backend provides: hash fields,
//! sets, sorted sets and optimistic transactions. Two backends exist:
//!
//! - [`memory::MemoryStore`] keeps everything in process. It backs the TCP
//!   server and doubles as the store in tests.
//! - [`remote::RemoteStore`] forwards every call to a running server.
//!
//! Optimistic transactions are split into [`Store::watch`], which snapshots
//! the version of each watched key, and [`Store::exec`], which applies a batch
//! of writes only if none of those versions moved. [`transaction::run`] wraps
//! the pair in a retry loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod remote;
pub mod transaction;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType { key: String },

    #[error("store replied with an error: {0}")]
    Server(String),

    #[error("malformed store message: {0}")]
    Protocol(String),

    #[error("transaction still conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },
}

impl StoreError {
    /// True when the store could not be reached at all, as opposed to the
    /// store answering with an error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// One entry of a sorted-set range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Versions of the watched keys at the time [`Store::watch`] was called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchToken {
    pub keys: Vec<WatchedKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedKey {
    pub key: String,
    pub version: u64,
}

/// A write queued inside an optimistic transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WriteOp {
    SAdd {
        key: String,
        member: String,
    },
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
}

/// Operations the article tool needs from its backing store.
///
/// Read methods return `Ok(None)` where the store has no value; errors are
/// reserved for transport failures and type mismatches.
pub trait Store {
    fn hset(&self, namespace: &str, field: &str, value: &[u8]) -> Result<(), StoreError>;

    fn hget(&self, namespace: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Adds `member` to the set, returning how many elements were new (0 or 1).
    fn sadd(&self, key: &str, member: &str) -> Result<u64, StoreError>;

    fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    fn scard(&self, key: &str) -> Result<u64, StoreError>;

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Members from highest to lowest score between the inclusive ranks
    /// `start` and `stop`. Negative ranks count from the lowest score.
    fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    fn watch(&self, keys: &[String]) -> Result<WatchToken, StoreError>;

    /// Applies `ops` atomically unless a key in `token` changed since it was
    /// watched. Returns `false` on such a conflict, in which case nothing was
    /// applied.
    fn exec(&self, token: &WatchToken, ops: &[WriteOp]) -> Result<bool, StoreError>;
}
