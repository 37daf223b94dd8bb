//! In-process store.
//!
//! All keys live in one map behind a single lock, so every call (including a
//! whole [`Store::exec`] batch) is atomic with respect to every other call.
//! Each key carries a version that is bumped whenever its value changes;
//! watching a key means remembering that version.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{ScoredMember, Store, StoreError, WatchToken, WatchedKey, WriteOp};

#[derive(Default)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
}

#[derive(Default)]
struct Keyspace {
    values: HashMap<String, Value>,
    versions: HashMap<String, u64>,
}

enum Value {
    Hash(HashMap<String, Vec<u8>>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Hash,
    Set,
    SortedSet,
}

impl Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Hash(_) => Kind::Hash,
            Value::Set(_) => Kind::Set,
            Value::SortedSet(_) => Kind::SortedSet,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.keyspace.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Keyspace {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn hash(&self, key: &str) -> Result<Option<&HashMap<String, Vec<u8>>>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str) -> Result<Option<&HashSet<String>>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn sorted_set(&self, key: &str) -> Result<Option<&HashMap<String, f64>>, StoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(zset)) => Ok(Some(zset)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    /// Fails if any op in the batch would hit a key holding another kind of
    /// value. Keys created by earlier ops of the same batch count too.
    fn check_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let mut created: HashMap<&str, Kind> = HashMap::new();
        for op in ops {
            let (key, wanted) = target(op);
            let current = created
                .get(key)
                .copied()
                .or_else(|| self.values.get(key).map(Value::kind));
            match current {
                Some(kind) if kind != wanted => return Err(wrong_type(key)),
                Some(_) => {}
                None => {
                    created.insert(key, wanted);
                }
            }
        }
        Ok(())
    }

    fn hset(&mut self, namespace: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let entry = self
            .values
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        let Value::Hash(hash) = entry else {
            return Err(wrong_type(namespace));
        };
        hash.insert(field.to_string(), value.to_vec());
        self.touch(namespace);
        Ok(())
    }

    fn sadd(&mut self, key: &str, member: &str) -> Result<u64, StoreError> {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()));
        let Value::Set(set) = entry else {
            return Err(wrong_type(key));
        };
        if !set.insert(member.to_string()) {
            return Ok(0);
        }
        self.touch(key);
        Ok(1)
    }

    fn zadd(&mut self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(HashMap::new()));
        let Value::SortedSet(zset) = entry else {
            return Err(wrong_type(key));
        };
        if zset.insert(member.to_string(), score) != Some(score) {
            self.touch(key);
        }
        Ok(())
    }

    fn apply(&mut self, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::SAdd { key, member } => self.sadd(key, member).map(drop),
            WriteOp::ZAdd { key, member, score } => self.zadd(key, member, *score),
        }
    }
}

/// The key a queued write touches and the kind of value it needs there.
fn target(op: &WriteOp) -> (&str, Kind) {
    match op {
        WriteOp::SAdd { key, .. } => (key.as_str(), Kind::Set),
        WriteOp::ZAdd { key, .. } => (key.as_str(), Kind::SortedSet),
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

/// Resolves Redis-style inclusive ranks against a collection of `len` items.
fn rank_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn by_score_descending(a: &ScoredMember, b: &ScoredMember) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.member.cmp(&a.member))
}

impl Store for MemoryStore {
    fn hset(&self, namespace: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        self.keyspace.lock().hset(namespace, field, value)
    }

    fn hget(&self, namespace: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let keyspace = self.keyspace.lock();
        Ok(keyspace
            .hash(namespace)?
            .and_then(|hash| hash.get(field).cloned()))
    }

    fn sadd(&self, key: &str, member: &str) -> Result<u64, StoreError> {
        self.keyspace.lock().sadd(key, member)
    }

    fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let keyspace = self.keyspace.lock();
        Ok(keyspace.set(key)?.is_some_and(|set| set.contains(member)))
    }

    fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let keyspace = self.keyspace.lock();
        Ok(keyspace.set(key)?.map_or(0, |set| set.len() as u64))
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        self.keyspace.lock().zadd(key, member, score)
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let keyspace = self.keyspace.lock();
        Ok(keyspace
            .sorted_set(key)?
            .and_then(|zset| zset.get(member).copied()))
    }

    fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let keyspace = self.keyspace.lock();
        let Some(zset) = keyspace.sorted_set(key)? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<ScoredMember> = zset
            .iter()
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect();
        entries.sort_by(by_score_descending);

        Ok(match rank_bounds(entries.len(), start, stop) {
            Some((first, last)) => entries.drain(first..=last).collect(),
            None => Vec::new(),
        })
    }

    fn watch(&self, keys: &[String]) -> Result<WatchToken, StoreError> {
        let keyspace = self.keyspace.lock();
        let keys = keys
            .iter()
            .map(|key| WatchedKey {
                key: key.clone(),
                version: keyspace.version(key),
            })
            .collect();
        Ok(WatchToken { keys })
    }

    fn exec(&self, token: &WatchToken, ops: &[WriteOp]) -> Result<bool, StoreError> {
        let mut keyspace = self.keyspace.lock();

        let stale = token
            .keys
            .iter()
            .any(|watched| keyspace.version(&watched.key) != watched.version);
        if stale {
            return Ok(false);
        }

        keyspace.check_batch(ops)?;
        for op in ops {
            keyspace.apply(op)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(entries: &[ScoredMember]) -> Vec<&str> {
        entries.iter().map(|entry| entry.member.as_str()).collect()
    }

    fn board() -> MemoryStore {
        let store = MemoryStore::new();
        store.zadd("scores", "a", 1.0).unwrap();
        store.zadd("scores", "b", 4.0).unwrap();
        store.zadd("scores", "c", 2.5).unwrap();
        store.zadd("scores", "d", 5.0).unwrap();
        store
    }

    #[test]
    fn hash_fields_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.hget("articles", "R694").unwrap(), None);

        store.hset("articles", "R694", b"payload").unwrap();
        assert_eq!(
            store.hget("articles", "R694").unwrap().as_deref(),
            Some(&b"payload"[..])
        );
    }

    #[test]
    fn sadd_counts_only_new_members() {
        let store = MemoryStore::new();
        assert_eq!(store.sadd("ratings:x", "alice").unwrap(), 1);
        assert_eq!(store.sadd("ratings:x", "alice").unwrap(), 0);
        assert_eq!(store.sadd("ratings:x", "bob").unwrap(), 1);
        assert_eq!(store.scard("ratings:x").unwrap(), 2);
        assert_eq!(store.scard("ratings:missing").unwrap(), 0);
        assert!(store.sismember("ratings:x", "bob").unwrap());
        assert!(!store.sismember("ratings:x", "carol").unwrap());
    }

    #[test]
    fn zscore_reports_missing_member_as_none() {
        let store = board();
        assert_eq!(store.zscore("scores", "b").unwrap(), Some(4.0));
        assert_eq!(store.zscore("scores", "zz").unwrap(), None);
        assert_eq!(store.zscore("nothing", "b").unwrap(), None);
    }

    #[test]
    fn reverse_range_is_inclusive_and_descending() {
        let store = board();
        let top = store.zrevrange_with_scores("scores", 0, 1).unwrap();
        assert_eq!(members(&top), vec!["d", "b"]);
        assert_eq!(top[0].score, 5.0);
    }

    #[test]
    fn reverse_range_handles_negative_and_oversized_ranks() {
        let store = board();
        let all = store.zrevrange_with_scores("scores", 0, -1).unwrap();
        assert_eq!(members(&all), vec!["d", "b", "c", "a"]);

        let clamped = store.zrevrange_with_scores("scores", 0, 100).unwrap();
        assert_eq!(clamped.len(), 4);

        let tail = store.zrevrange_with_scores("scores", -2, -1).unwrap();
        assert_eq!(members(&tail), vec!["c", "a"]);

        assert!(store.zrevrange_with_scores("scores", 3, 1).unwrap().is_empty());
        assert!(store.zrevrange_with_scores("scores", 7, 9).unwrap().is_empty());
        assert!(store.zrevrange_with_scores("nothing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn equal_scores_order_by_member_descending() {
        let store = MemoryStore::new();
        store.zadd("scores", "alpha", 3.0).unwrap();
        store.zadd("scores", "beta", 3.0).unwrap();
        let entries = store.zrevrange_with_scores("scores", 0, -1).unwrap();
        assert_eq!(members(&entries), vec!["beta", "alpha"]);
    }

    #[test]
    fn using_a_key_as_another_kind_fails() {
        let store = MemoryStore::new();
        store.sadd("scores", "oops").unwrap();

        assert!(matches!(
            store.zscore("scores", "a"),
            Err(StoreError::WrongType { key }) if key == "scores"
        ));
        assert!(matches!(
            store.zadd("scores", "a", 1.0),
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.hget("scores", "a"),
            Err(StoreError::WrongType { .. })
        ));
    }

    #[test]
    fn exec_applies_batch_when_nothing_changed() {
        let store = MemoryStore::new();
        let token = store.watch(&["ratings:x".to_string()]).unwrap();
        let ops = vec![
            WriteOp::SAdd {
                key: "ratings:x".into(),
                member: "alice".into(),
            },
            WriteOp::ZAdd {
                key: "scores".into(),
                member: "x".into(),
                score: 4.0,
            },
        ];

        assert!(store.exec(&token, &ops).unwrap());
        assert!(store.sismember("ratings:x", "alice").unwrap());
        assert_eq!(store.zscore("scores", "x").unwrap(), Some(4.0));
    }

    #[test]
    fn exec_refuses_when_a_watched_key_moved() {
        let store = MemoryStore::new();
        let token = store.watch(&["scores".to_string()]).unwrap();
        store.zadd("scores", "other", 1.0).unwrap();

        let ops = vec![WriteOp::ZAdd {
            key: "scores".into(),
            member: "x".into(),
            score: 4.0,
        }];
        assert!(!store.exec(&token, &ops).unwrap());
        assert_eq!(store.zscore("scores", "x").unwrap(), None);
    }

    #[test]
    fn writes_that_change_nothing_keep_the_version() {
        let store = MemoryStore::new();
        store.sadd("ratings:x", "alice").unwrap();
        store.zadd("scores", "x", 2.0).unwrap();
        let token = store
            .watch(&["ratings:x".to_string(), "scores".to_string()])
            .unwrap();

        store.sadd("ratings:x", "alice").unwrap();
        store.zadd("scores", "x", 2.0).unwrap();

        assert!(store.exec(&token, &[]).unwrap());
    }

    #[test]
    fn exec_is_all_or_nothing_on_type_errors() {
        let store = MemoryStore::new();
        store.hset("scores", "x", b"not a sorted set").unwrap();
        let token = store.watch(&[]).unwrap();
        let ops = vec![
            WriteOp::SAdd {
                key: "ratings:x".into(),
                member: "alice".into(),
            },
            WriteOp::ZAdd {
                key: "scores".into(),
                member: "x".into(),
                score: 4.0,
            },
        ];

        assert!(matches!(
            store.exec(&token, &ops),
            Err(StoreError::WrongType { .. })
        ));
        assert_eq!(store.scard("ratings:x").unwrap(), 0);
    }

    #[test]
    fn exec_rejects_a_batch_that_conflicts_with_itself() {
        let store = MemoryStore::new();
        let token = store.watch(&["k".to_string()]).unwrap();
        let ops = vec![
            WriteOp::SAdd {
                key: "k".into(),
                member: "x".into(),
            },
            WriteOp::ZAdd {
                key: "k".into(),
                member: "m".into(),
                score: 1.0,
            },
        ];

        assert!(matches!(
            store.exec(&token, &ops),
            Err(StoreError::WrongType { key }) if key == "k"
        ));
        assert!(!store.sismember("k", "x").unwrap());
        assert!(store.is_empty());
        // The failed batch did not bump the version either.
        assert!(store.exec(&token, &[]).unwrap());
    }

    #[test]
    fn exec_allows_repeated_writes_of_one_kind() {
        let store = MemoryStore::new();
        let token = store.watch(&[]).unwrap();
        let ops = vec![
            WriteOp::SAdd {
                key: "k".into(),
                member: "x".into(),
            },
            WriteOp::SAdd {
                key: "k".into(),
                member: "y".into(),
            },
        ];

        assert!(store.exec(&token, &ops).unwrap());
        assert_eq!(store.scard("k").unwrap(), 2);
    }
}
