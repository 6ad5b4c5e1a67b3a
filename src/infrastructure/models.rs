use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{LineItem, Order};

/// Stored form of an order: one JSON document per primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: u64,
    pub customer_id: Uuid,
    pub line_items: Vec<LineItemRecord>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub item_id: Uuid,
    pub quantity: u32,
    pub price: u64,
}

impl From<&Order> for OrderRecord {
    fn from(o: &Order) -> Self {
        Self {
            order_id: o.order_id,
            customer_id: o.customer_id,
            line_items: o
                .line_items
                .iter()
                .map(|l| LineItemRecord {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    price: l.price,
                })
                .collect(),
            created_at: o.created_at,
            shipped_at: o.shipped_at,
            completed_at: o.completed_at,
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = DomainError;

    /// Rejects records whose timestamps break the lifecycle ordering.
    fn try_from(r: OrderRecord) -> Result<Self, Self::Error> {
        let ordered = match (r.shipped_at, r.completed_at) {
            (None, Some(_)) => false,
            (Some(shipped), completed) => {
                r.created_at <= shipped && completed.map_or(true, |c| shipped <= c)
            }
            (None, None) => true,
        };
        if !ordered {
            return Err(DomainError::Serialization(format!(
                "order {} has inconsistent timestamps",
                r.order_id
            )));
        }

        Ok(Order {
            order_id: r.order_id,
            customer_id: r.customer_id,
            line_items: r
                .line_items
                .into_iter()
                .map(|l| LineItem {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    price: l.price,
                })
                .collect(),
            created_at: r.created_at,
            shipped_at: r.shipped_at,
            completed_at: r.completed_at,
        })
    }
}
