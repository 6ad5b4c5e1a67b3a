use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::order::{FindAllPage, FindResult, Order};
use crate::domain::ports::{KeyValueStore, OrderRepository, Transaction};

use super::models::OrderRecord;

/// Set holding the primary key of every stored order.
pub const ORDER_INDEX: &str = "orders";

pub fn order_key(id: u64) -> String {
    format!("order:{id}")
}

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}

fn encode(order: &Order) -> Result<String, DomainError> {
    Ok(serde_json::to_string(&OrderRecord::from(order))?)
}

fn decode(value: &str) -> Result<Order, DomainError> {
    let record: OrderRecord = serde_json::from_str(value)?;
    Order::try_from(record)
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Orders stored as JSON documents under `order:{id}`, indexed by the
/// [`ORDER_INDEX`] set.
pub struct KvOrderRepository<S> {
    store: S,
}

impl<S: KeyValueStore> KvOrderRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: KeyValueStore> OrderRepository for KvOrderRepository<S> {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        let data = encode(order)?;
        let key = order_key(order.order_id);

        // The record and its index entry are written together or not at all.
        self.store
            .commit(
                Transaction::new()
                    .set_if_absent(&key, data)
                    .add_to_set(ORDER_INDEX, &key),
            )
            .await?;

        log::debug!("inserted {}", key);
        Ok(())
    }

    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError> {
        let value = self
            .store
            .get(&order_key(id))
            .await?
            .ok_or(DomainError::NotFound)?;
        decode(&value)
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        let data = encode(order)?;
        self.store
            .set_if_present(&order_key(order.order_id), &data)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError> {
        let key = order_key(id);
        self.store
            .commit(
                Transaction::new()
                    .delete(&key)
                    .remove_from_set(ORDER_INDEX, &key),
            )
            .await?;

        log::debug!("deleted {}", key);
        Ok(())
    }

    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError> {
        let scan = self
            .store
            .scan_set(ORDER_INDEX, page.cursor, "*", page.size)
            .await?;

        if scan.members.is_empty() {
            return Ok(FindResult {
                orders: Vec::new(),
                cursor: scan.cursor,
            });
        }

        let values = self.store.multi_get(&scan.members).await?;

        let mut orders = Vec::with_capacity(values.len());
        for (key, value) in scan.members.iter().zip(values) {
            // Deleted between the scan and the read.
            let Some(value) = value else {
                log::debug!("{} vanished during scan", key);
                continue;
            };
            orders.push(decode(&value).map_err(|e| {
                log::warn!("failed to decode {}: {}", key, e);
                e
            })?);
        }

        Ok(FindResult {
            orders,
            cursor: scan.cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use futures::future::join_all;
    use uuid::Uuid;

    use super::*;
    use crate::domain::order::{LineItem, StatusChange};
    use crate::infrastructure::memory_store::InMemoryStore;

    fn setup() -> (InMemoryStore, KvOrderRepository<InMemoryStore>) {
        let store = InMemoryStore::new();
        (store.clone(), KvOrderRepository::new(store))
    }

    fn make_order(id: u64) -> Order {
        Order::new(
            id,
            Uuid::new_v4(),
            vec![LineItem {
                item_id: Uuid::new_v4(),
                quantity: 2,
                price: 500,
            }],
            Utc::now(),
        )
    }

    async fn index_members(store: &InMemoryStore) -> Vec<String> {
        let scan = store.scan_set(ORDER_INDEX, 0, "*", 1000).await.unwrap();
        scan.members
    }

    async fn collect_all(repo: &KvOrderRepository<InMemoryStore>, size: u64) -> Vec<Order> {
        let mut orders = Vec::new();
        let mut cursor = 0;
        loop {
            let page = repo
                .find_all(FindAllPage { cursor, size })
                .await
                .expect("find_all failed");
            orders.extend(page.orders);
            cursor = page.cursor;
            if cursor == 0 {
                return orders;
            }
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_id_roundtrip() {
        let (_store, repo) = setup();
        let order = make_order(1001);

        repo.insert(&order).await.expect("insert failed");
        let found = repo.find_by_id(1001).await.expect("find failed");

        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn insert_writes_index_entry() {
        let (store, repo) = setup();
        repo.insert(&make_order(5)).await.unwrap();

        assert_eq!(index_members(&store).await, vec!["order:5".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_original() {
        let (store, repo) = setup();
        let original = make_order(42);
        repo.insert(&original).await.unwrap();

        let err = repo.insert(&make_order(42)).await.unwrap_err();

        assert!(matches!(err, DomainError::AlreadyExists));
        assert_eq!(repo.find_by_id(42).await.unwrap(), original);
        assert_eq!(index_members(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_id_admit_one() {
        let (store, repo) = setup();
        let orders: Vec<Order> = (0..8).map(|_| make_order(77)).collect();

        let results = join_all(orders.iter().map(|o| repo.insert(o))).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, DomainError::AlreadyExists)));
        assert_eq!(index_members(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn find_by_id_returns_not_found_for_unknown_id() {
        let (_store, repo) = setup();
        let err = repo.find_by_id(404).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn find_by_id_reports_corrupt_record() {
        let (store, repo) = setup();
        store.set_if_absent(&order_key(9), "{not json").await.unwrap();

        let err = repo.find_by_id(9).await.unwrap_err();
        assert!(matches!(err, DomainError::Serialization(_)));
    }

    #[tokio::test]
    async fn update_overwrites_existing_order() {
        let (_store, repo) = setup();
        let mut order = make_order(1);
        repo.insert(&order).await.unwrap();

        order
            .apply(StatusChange::Ship, order.created_at + Duration::seconds(1))
            .unwrap();
        repo.update(&order).await.expect("update failed");

        let found = repo.find_by_id(1).await.unwrap();
        assert_eq!(found.shipped_at, order.shipped_at);
        assert_eq!(found.completed_at, None);
    }

    #[tokio::test]
    async fn update_of_missing_order_is_not_found() {
        let (store, repo) = setup();
        let err = repo.update(&make_order(3)).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound));
        assert_eq!(store.get(&order_key(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_record_and_index_entry() {
        let (store, repo) = setup();
        repo.insert(&make_order(1)).await.unwrap();
        repo.insert(&make_order(2)).await.unwrap();

        repo.delete_by_id(1).await.expect("delete failed");

        assert!(matches!(
            repo.find_by_id(1).await.unwrap_err(),
            DomainError::NotFound
        ));
        assert_eq!(index_members(&store).await, vec!["order:2".to_string()]);
        let ids: Vec<u64> = collect_all(&repo, 10)
            .await
            .iter()
            .map(|o| o.order_id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn delete_of_missing_order_mutates_nothing() {
        let (store, repo) = setup();
        repo.insert(&make_order(1)).await.unwrap();
        // A stray index entry with no record must survive a failed delete.
        store.add_to_set(ORDER_INDEX, &order_key(2)).await.unwrap();

        let err = repo.delete_by_id(2).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound));
        let mut members = index_members(&store).await;
        members.sort();
        assert_eq!(members, vec!["order:1".to_string(), "order:2".to_string()]);
        assert!(repo.find_by_id(1).await.is_ok());
    }

    #[tokio::test]
    async fn find_all_on_empty_store() {
        let (_store, repo) = setup();
        let page = repo
            .find_all(FindAllPage { cursor: 0, size: 50 })
            .await
            .unwrap();

        assert!(page.orders.is_empty());
        assert_eq!(page.cursor, 0);
    }

    #[tokio::test]
    async fn find_all_visits_every_order_once() {
        let (_store, repo) = setup();
        for id in 1..=25 {
            repo.insert(&make_order(id)).await.unwrap();
        }

        let first = repo
            .find_all(FindAllPage { cursor: 0, size: 10 })
            .await
            .unwrap();
        assert_eq!(first.orders.len(), 10);
        assert_ne!(first.cursor, 0);

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for order in collect_all(&repo, 10).await {
            *counts.entry(order.order_id).or_default() += 1;
        }
        assert_eq!(counts.len(), 25);
        assert!(counts.values().all(|&n| n == 1));
    }

    async fn follow_cursor(
        repo: &KvOrderRepository<InMemoryStore>,
        mut cursor: u64,
        size: u64,
    ) -> Vec<u64> {
        let mut ids = Vec::new();
        while cursor != 0 {
            let page = repo
                .find_all(FindAllPage { cursor, size })
                .await
                .expect("find_all failed");
            ids.extend(page.orders.iter().map(|o| o.order_id));
            cursor = page.cursor;
        }
        ids
    }

    #[tokio::test]
    async fn find_all_still_returns_every_order_after_delete_between_pages() {
        let (_store, repo) = setup();
        for id in 1..=10 {
            repo.insert(&make_order(id)).await.unwrap();
        }

        let first = repo
            .find_all(FindAllPage { cursor: 0, size: 5 })
            .await
            .unwrap();
        assert_eq!(first.orders.len(), 5);
        let deleted = first.orders[0].order_id;
        repo.delete_by_id(deleted).await.unwrap();

        let rest = follow_cursor(&repo, first.cursor, 5).await;
        assert!(!rest.contains(&deleted));

        let mut seen: Vec<u64> = first.orders.iter().map(|o| o.order_id).collect();
        seen.extend(rest);
        seen.sort_unstable();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn find_all_has_no_gaps_when_orders_arrive_between_pages() {
        let (_store, repo) = setup();
        for id in 1..=10 {
            repo.insert(&make_order(id)).await.unwrap();
        }

        let first = repo
            .find_all(FindAllPage { cursor: 0, size: 4 })
            .await
            .unwrap();
        for id in 11..=13 {
            repo.insert(&make_order(id)).await.unwrap();
        }

        let mut seen: Vec<u64> = first.orders.iter().map(|o| o.order_id).collect();
        seen.extend(follow_cursor(&repo, first.cursor, 4).await);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (1..=13).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn find_all_aborts_on_corrupt_entry() {
        let (store, repo) = setup();
        repo.insert(&make_order(1)).await.unwrap();
        store
            .commit(
                Transaction::new()
                    .set_if_absent(order_key(2), "garbage")
                    .add_to_set(ORDER_INDEX, order_key(2)),
            )
            .await
            .unwrap();

        let err = repo
            .find_all(FindAllPage { cursor: 0, size: 50 })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Serialization(_)));
    }

    #[tokio::test]
    async fn find_all_skips_index_entry_without_record() {
        let (store, repo) = setup();
        repo.insert(&make_order(1)).await.unwrap();
        store.add_to_set(ORDER_INDEX, &order_key(2)).await.unwrap();

        let page = repo
            .find_all(FindAllPage { cursor: 0, size: 50 })
            .await
            .unwrap();
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].order_id, 1);
    }
}
