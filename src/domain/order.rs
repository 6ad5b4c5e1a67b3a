use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub item_id: Uuid,
    pub quantity: u32,
    /// Unit price in the smallest currency unit.
    pub price: u64,
}

/// An order record.
///
/// The lifecycle state is not stored explicitly; it is derived from which of
/// `shipped_at` / `completed_at` are set (see [`Order::status`]). Timestamps
/// are only ever set through [`Order::apply`], which keeps
/// `created_at <= shipped_at <= completed_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: u64,
    pub customer_id: Uuid,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Shipped,
    Completed,
}

/// A requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Ship,
    Complete,
}

impl FromStr for StatusChange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipped" => Ok(StatusChange::Ship),
            "completed" => Ok(StatusChange::Complete),
            other => Err(DomainError::InvalidTransition(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusChange::Ship => f.write_str("shipped"),
            StatusChange::Complete => f.write_str("completed"),
        }
    }
}

impl Order {
    pub fn new(
        order_id: u64,
        customer_id: Uuid,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id,
            line_items,
            created_at,
            shipped_at: None,
            completed_at: None,
        }
    }

    pub fn status(&self) -> OrderStatus {
        match (self.shipped_at, self.completed_at) {
            (_, Some(_)) => OrderStatus::Completed,
            (Some(_), None) => OrderStatus::Shipped,
            (None, None) => OrderStatus::Created,
        }
    }

    /// Applies `change` at time `now`, or rejects it without touching `self`.
    ///
    /// A clock that reads earlier than the previous timestamp is clamped so
    /// the timestamps stay ordered.
    pub fn apply(&mut self, change: StatusChange, now: DateTime<Utc>) -> Result<(), DomainError> {
        match (change, self.status()) {
            (StatusChange::Ship, OrderStatus::Created) => {
                self.shipped_at = Some(now.max(self.created_at));
                Ok(())
            }
            (StatusChange::Ship, _) => Err(DomainError::InvalidTransition(
                "order already shipped".to_string(),
            )),
            (StatusChange::Complete, OrderStatus::Shipped) => {
                let shipped_at = self.shipped_at.unwrap_or(self.created_at);
                self.completed_at = Some(now.max(shipped_at));
                Ok(())
            }
            (StatusChange::Complete, OrderStatus::Created) => Err(DomainError::InvalidTransition(
                "order not yet shipped".to_string(),
            )),
            (StatusChange::Complete, OrderStatus::Completed) => Err(
                DomainError::InvalidTransition("order already completed".to_string()),
            ),
        }
    }
}

/// Cursor-based page request over the order index.
///
/// A `cursor` of 0 starts a new traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindAllPage {
    pub cursor: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FindResult {
    pub orders: Vec<Order>,
    /// Continuation token; 0 once the whole index has been traversed.
    pub cursor: u64,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn fresh_order() -> Order {
        Order::new(
            1001,
            Uuid::new_v4(),
            vec![LineItem {
                item_id: Uuid::new_v4(),
                quantity: 2,
                price: 500,
            }],
            Utc::now(),
        )
    }

    #[test]
    fn fresh_order_is_created() {
        assert_eq!(fresh_order().status(), OrderStatus::Created);
    }

    #[test]
    fn ship_sets_shipped_at_once() {
        let mut order = fresh_order();
        let now = order.created_at + Duration::seconds(5);

        order.apply(StatusChange::Ship, now).expect("first ship");
        assert_eq!(order.shipped_at, Some(now));
        assert_eq!(order.completed_at, None);
        assert_eq!(order.status(), OrderStatus::Shipped);

        let err = order
            .apply(StatusChange::Ship, now + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(order.shipped_at, Some(now));
    }

    #[test]
    fn complete_requires_shipped() {
        let mut order = fresh_order();
        let err = order.apply(StatusChange::Complete, Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition: order not yet shipped"
        );
        assert_eq!(order.completed_at, None);
    }

    #[test]
    fn complete_after_ship_then_reject_second_complete() {
        let mut order = fresh_order();
        let shipped = order.created_at + Duration::seconds(1);
        let completed = shipped + Duration::seconds(1);

        order.apply(StatusChange::Ship, shipped).expect("ship");
        order.apply(StatusChange::Complete, completed).expect("complete");
        assert_eq!(order.completed_at, Some(completed));
        assert_eq!(order.status(), OrderStatus::Completed);

        let err = order
            .apply(StatusChange::Complete, completed + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let err = order.apply(StatusChange::Ship, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut order = fresh_order();
        let earlier = order.created_at - Duration::minutes(1);

        order.apply(StatusChange::Ship, earlier).expect("ship");
        order.apply(StatusChange::Complete, earlier).expect("complete");

        let shipped = order.shipped_at.expect("shipped_at");
        let completed = order.completed_at.expect("completed_at");
        assert!(order.created_at <= shipped);
        assert!(shipped <= completed);
    }

    #[test]
    fn parses_known_status_changes() {
        assert_eq!("shipped".parse::<StatusChange>().unwrap(), StatusChange::Ship);
        assert_eq!(
            "completed".parse::<StatusChange>().unwrap(),
            StatusChange::Complete
        );
        assert_eq!(StatusChange::Complete.to_string(), "completed");
    }

    #[test]
    fn unknown_status_is_an_invalid_transition() {
        for s in ["created", "SHIPPED", "", "cancelled"] {
            let err = s.parse::<StatusChange>().unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition(_)), "{s}");
        }
    }
}
