//! Shopping cart mutation logic.
//!
//! A [`Cart`] is an ordered list of product references with quantities. The
//! storefront loads it from the database, mutates it with the methods here,
//! and persists it back wholesale inside one transaction.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A single cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's in-progress cart.
///
/// Every product appears at most once; adding an existing product bumps its
/// quantity instead.
///
/// ```
/// use bazaar_core::{Cart, ProductId};
///
/// let mut cart = Cart::default();
/// cart.add_product(ProductId::new(1));
/// cart.add_product(ProductId::new(1));
/// assert_eq!(cart.items().len(), 1);
/// assert_eq!(cart.quantity_of(ProductId::new(1)), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Build a cart from persisted lines, merging duplicate products and
    /// dropping zero quantities.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::default();
        for item in items.into_iter().filter(|item| item.quantity > 0) {
            match cart.line_mut(item.product_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => cart.items.push(item),
            }
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Add one unit of `product_id`.
    pub fn add_product(&mut self, product_id: ProductId) {
        match self.line_mut(product_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem {
                product_id,
                quantity: 1,
            }),
        }
    }

    /// Remove every line for `product_id`. Returns whether anything changed.
    pub fn remove_product(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Quantity held for `product_id` (zero when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Product ids in line order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: i32) -> ProductId {
        ProductId::new(id)
    }

    #[test]
    fn test_add_new_product_appends_line() {
        let mut cart = Cart::default();
        cart.add_product(pid(1));
        cart.add_product(pid(2));

        assert_eq!(
            cart.items(),
            &[
                CartItem {
                    product_id: pid(1),
                    quantity: 1
                },
                CartItem {
                    product_id: pid(2),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_add_existing_product_increments_quantity() {
        let mut cart = Cart::default();
        cart.add_product(pid(3));
        cart.add_product(pid(4));
        cart.add_product(pid(3));

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.quantity_of(pid(3)), 2);
        assert_eq!(cart.quantity_of(pid(4)), 1);
        assert_eq!(cart.total_quantity(), 3);
        // Incrementing keeps the original position.
        assert_eq!(cart.product_ids(), vec![pid(3), pid(4)]);
    }

    #[test]
    fn test_remove_product() {
        let mut cart = Cart::default();
        cart.add_product(pid(1));
        cart.add_product(pid(1));
        cart.add_product(pid(2));

        assert!(cart.remove_product(pid(1)));
        assert_eq!(cart.quantity_of(pid(1)), 0);
        assert_eq!(cart.product_ids(), vec![pid(2)]);

        assert!(!cart.remove_product(pid(99)));
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::default();
        cart.add_product(pid(1));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_from_items_merges_and_drops_empty_lines() {
        let cart = Cart::from_items([
            CartItem {
                product_id: pid(1),
                quantity: 2,
            },
            CartItem {
                product_id: pid(2),
                quantity: 0,
            },
            CartItem {
                product_id: pid(1),
                quantity: 1,
            },
        ]);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(pid(1)), 3);
    }
}
