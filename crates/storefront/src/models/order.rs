//! Order domain types.
//!
//! Orders are immutable snapshots: item titles and prices are copied at
//! checkout so later catalog edits never change order history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{Email, OrderId, OrderItemId, ProductId, UserId};

/// A placed order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Purchaser email at the time of checkout.
    pub email: Email,
    /// Payment processor checkout session; unique per order.
    pub payment_session_id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Whether `user_id` placed this order.
    #[must_use]
    pub fn belongs_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

/// A snapshot of one cart line.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: Decimal,
    pub description: String,
    pub image_path: String,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: Decimal, quantity: u32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            product_id: Some(ProductId::new(1)),
            title: "Notebook".to_string(),
            price,
            description: "Dotted pages".to_string(),
            image_path: "images/notebook.png".to_string(),
            quantity,
        }
    }

    #[test]
    fn test_total_sums_line_totals() {
        let order = Order {
            id: OrderId::new(1),
            user_id: UserId::new(2),
            email: Email::parse("buyer@bazaar.test").unwrap(),
            payment_session_id: "cs_test_1".to_string(),
            created_at: Utc::now(),
            items: vec![item(Decimal::new(1250, 2), 2), item(Decimal::new(99, 2), 3)],
        };

        assert_eq!(order.total(), Decimal::new(2797, 2));
        assert!(order.belongs_to(UserId::new(2)));
        assert!(!order.belongs_to(UserId::new(3)));
    }
}
