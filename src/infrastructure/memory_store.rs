use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::ports::{KeyValueStore, Mutation, SetScan, Transaction};

/// Set members keyed by insertion sequence. Sequences only grow, so a
/// removal never shifts the members after it and a scan cursor stays valid.
#[derive(Debug, Default)]
struct MemberSet {
    by_seq: BTreeMap<u64, String>,
    seq_of: HashMap<String, u64>,
    last_seq: u64,
}

impl MemberSet {
    fn insert(&mut self, member: &str) {
        if self.seq_of.contains_key(member) {
            return;
        }
        self.last_seq += 1;
        self.by_seq.insert(self.last_seq, member.to_string());
        self.seq_of.insert(member.to_string(), self.last_seq);
    }

    fn remove(&mut self, member: &str) {
        if let Some(seq) = self.seq_of.remove(member) {
            self.by_seq.remove(&seq);
        }
    }
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, String>,
    // Emptied sets are kept so their sequence never restarts mid-scan.
    sets: HashMap<String, MemberSet>,
}

/// Process-local [`KeyValueStore`].
///
/// Clones share the same data. A set scan cursor is the next sequence number
/// to visit, so every member present for a whole traversal is returned, and
/// members added during it are returned too. `count` bounds the members
/// examined and the pattern filters them afterwards. Patterns are either an
/// exact member or a literal prefix ending in `*`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn pattern_matches(pattern: &str, member: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => member.starts_with(prefix),
        None => member == pattern,
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.values.get(key).cloned())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let state = self.state.lock().await;
        Ok(keys.iter().map(|k| state.values.get(k).cloned()).collect())
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<SetScan, StoreError> {
        let state = self.state.lock().await;
        let Some(members) = state.sets.get(set) else {
            return Ok(SetScan::default());
        };

        let count = usize::try_from(count.max(1)).unwrap_or(usize::MAX);
        let mut remaining = members.by_seq.range(cursor.max(1)..);

        let mut page = Vec::new();
        let mut last_seq = None;
        for (seq, member) in remaining.by_ref().take(count) {
            last_seq = Some(*seq);
            if pattern_matches(pattern, member) {
                page.push(member.clone());
            }
        }
        let cursor = match (last_seq, remaining.next()) {
            (Some(seq), Some(_)) => seq.saturating_add(1),
            _ => 0,
        };

        Ok(SetScan {
            members: page,
            cursor,
        })
    }

    async fn commit(&self, txn: Transaction) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        for m in txn.mutations() {
            match m {
                Mutation::SetIfAbsent { key, .. } if state.values.contains_key(key) => {
                    return Err(StoreError::KeyExists(key.clone()));
                }
                Mutation::SetIfPresent { key, .. } | Mutation::Delete { key }
                    if !state.values.contains_key(key) =>
                {
                    return Err(StoreError::KeyNotFound(key.clone()));
                }
                Mutation::AddToSet { set, .. } | Mutation::RemoveFromSet { set, .. }
                    if state.values.contains_key(set) =>
                {
                    return Err(StoreError::Transaction(format!("{set} does not hold a set")));
                }
                _ => {}
            }
        }

        for m in txn.mutations() {
            match m {
                Mutation::SetIfAbsent { key, value } | Mutation::SetIfPresent { key, value } => {
                    state.values.insert(key.clone(), value.clone());
                }
                Mutation::Delete { key } => {
                    state.values.remove(key);
                }
                Mutation::AddToSet { set, member } => {
                    state.sets.entry(set.clone()).or_default().insert(member);
                }
                Mutation::RemoveFromSet { set, member } => {
                    if let Some(members) = state.sets.get_mut(set) {
                        members.remove(member);
                    }
                }
            }
        }

        Ok(())
    }
}
