use std::sync::Arc;

use async_trait::async_trait;

use super::errors::{DomainError, StoreError};
use super::order::{FindAllPage, FindResult, Order};

/// A single write inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Fails the transaction if `key` already exists.
    SetIfAbsent { key: String, value: String },
    /// Fails the transaction if `key` does not exist.
    SetIfPresent { key: String, value: String },
    /// Fails the transaction if `key` does not exist.
    Delete { key: String },
    AddToSet { set: String, member: String },
    RemoveFromSet { set: String, member: String },
}

impl Mutation {
    /// The store key this mutation touches (the set name for set operations).
    pub fn key(&self) -> &str {
        match self {
            Mutation::SetIfAbsent { key, .. }
            | Mutation::SetIfPresent { key, .. }
            | Mutation::Delete { key } => key,
            Mutation::AddToSet { set, .. } | Mutation::RemoveFromSet { set, .. } => set,
        }
    }
}

/// An all-or-nothing batch of mutations.
///
/// Every guard is checked before anything is written; if one fails the
/// whole batch is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_if_absent(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mutations.push(Mutation::SetIfAbsent {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn set_if_present(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mutations.push(Mutation::SetIfPresent {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.mutations.push(Mutation::Delete { key: key.into() });
        self
    }

    pub fn add_to_set(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.mutations.push(Mutation::AddToSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn remove_from_set(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.mutations.push(Mutation::RemoveFromSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// One step of a set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetScan {
    pub members: Vec<String>,
    /// 0 once the traversal is complete.
    pub cursor: u64,
}

/// The capabilities the order repository needs from its backing store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Values aligned with `keys`; missing keys yield `None`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Cursor scan over `set`. The page may hold more or fewer than `count`
    /// members; only repeated calls until the cursor returns to 0 guarantee
    /// full coverage.
    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<SetScan, StoreError>;

    async fn commit(&self, txn: Transaction) -> Result<(), StoreError>;

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(Transaction::new().set_if_absent(key, value)).await
    }

    async fn set_if_present(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(Transaction::new().set_if_present(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.commit(Transaction::new().delete(key)).await
    }

    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.commit(Transaction::new().add_to_set(set, member)).await
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.commit(Transaction::new().remove_from_set(set, member)).await
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Stores a new order; `AlreadyExists` if the identifier is taken.
    async fn insert(&self, order: &Order) -> Result<(), DomainError>;
    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError>;
    /// Overwrites an existing order (last writer wins).
    async fn update(&self, order: &Order) -> Result<(), DomainError>;
    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError>;
    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError>;
}

#[async_trait]
impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        (**self).insert(order).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError> {
        (**self).find_by_id(id).await
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        (**self).update(order).await
    }

    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError> {
        (**self).delete_by_id(id).await
    }

    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError> {
        (**self).find_all(page).await
    }
}
