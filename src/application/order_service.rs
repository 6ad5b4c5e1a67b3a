use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{FindAllPage, FindResult, LineItem, Order, StatusChange};
use crate::domain::ports::OrderRepository;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Identifier draws before a create gives up on collisions.
const MAX_ID_ATTEMPTS: usize = 3;

/// The service type shared with the HTTP layer.
pub type SharedOrderService = OrderService<Arc<dyn OrderRepository>>;

#[derive(Clone)]
pub struct OrderService<R> {
    repo: R,
}

fn random_order_id() -> u64 {
    Uuid::new_v4().as_u64_pair().0
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an order under a fresh random identifier.
    ///
    /// The insert itself detects a taken identifier, so a collision just
    /// means drawing again.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        line_items: Vec<LineItem>,
    ) -> Result<Order, DomainError> {
        self.create_order_with(customer_id, line_items, random_order_id)
            .await
    }

    async fn create_order_with(
        &self,
        customer_id: Uuid,
        line_items: Vec<LineItem>,
        mut next_id: impl FnMut() -> u64 + Send,
    ) -> Result<Order, DomainError> {
        let mut order = Order::new(next_id(), customer_id, line_items, Utc::now());

        for attempt in 1..=MAX_ID_ATTEMPTS {
            match self.repo.insert(&order).await {
                Err(DomainError::AlreadyExists) if attempt < MAX_ID_ATTEMPTS => {
                    log::warn!("order id {} already taken, retrying", order.order_id);
                    order.order_id = next_id();
                }
                result => return result.map(|()| order),
            }
        }

        Err(DomainError::AlreadyExists)
    }

    pub async fn get_order(&self, id: u64) -> Result<Order, DomainError> {
        self.repo.find_by_id(id).await
    }

    pub async fn list_orders(
        &self,
        cursor: u64,
        size: Option<u64>,
    ) -> Result<FindResult, DomainError> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.repo.find_all(FindAllPage { cursor, size }).await
    }

    /// Loads the order, applies the requested transition and writes it back.
    ///
    /// Rejected transitions never reach the store. The write is a blind
    /// overwrite: concurrent updates of one order race and the last wins.
    pub async fn update_status(&self, id: u64, status: &str) -> Result<Order, DomainError> {
        let change: StatusChange = status.parse()?;
        let mut order = self.repo.find_by_id(id).await?;
        order.apply(change, Utc::now())?;
        self.repo.update(&order).await?;

        log::info!("order {} marked {}", id, change);
        Ok(order)
    }

    pub async fn delete_order(&self, id: u64) -> Result<(), DomainError> {
        self.repo.delete_by_id(id).await
    }
}
