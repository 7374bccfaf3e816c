//! Cart lines joined with their products.

use rust_decimal::Decimal;

use super::Product;

/// One cart line with its product loaded.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// A user's cart with product data, in cart order.
#[derive(Debug, Clone, Default)]
pub struct PopulatedCart {
    pub lines: Vec<CartLine>,
}

impl PopulatedCart {
    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bazaar_core::{ProductId, UserId};
    use chrono::Utc;

    use super::*;

    fn line(price: Decimal, quantity: u32) -> CartLine {
        CartLine {
            product: Product {
                id: ProductId::new(1),
                title: "Pen".to_string(),
                price,
                description: "Blue ink".to_string(),
                image_path: "images/pen.png".to_string(),
                user_id: UserId::new(1),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            quantity,
        }
    }

    #[test]
    fn test_total() {
        let cart = PopulatedCart {
            lines: vec![line(Decimal::new(150, 2), 4), line(Decimal::new(1000, 2), 1)],
        };
        assert_eq!(cart.total(), Decimal::new(1600, 2));
        assert!(!cart.is_empty());
        assert_eq!(PopulatedCart::default().total(), Decimal::ZERO);
    }
}
