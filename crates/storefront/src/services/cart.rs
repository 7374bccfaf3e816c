//! Cart operations on top of the persisted cart.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::instrument;

use bazaar_core::{Cart, ProductId, UserId};

use crate::db::{ProductRepository, RepositoryError, UserRepository};
use crate::models::{CartLine, PopulatedCart, Product};

/// Cart service for one request.
pub struct CartService<'a> {
    users: UserRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// Load a user's cart with product data, in cart order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn load(&self, user_id: UserId) -> Result<PopulatedCart, RepositoryError> {
        let cart = self.users.get_cart(user_id).await?;
        let products = self.products.get_many(&cart.product_ids()).await?;
        Ok(populate(&cart, products))
    }

    /// Add one unit of `product_id` to the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn add_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, RepositoryError> {
        let cart = self.users.add_to_cart(user_id, product_id).await?;

        tracing::info!(
            quantity = cart.quantity_of(product_id),
            items = cart.total_quantity(),
            "Product added to cart"
        );
        Ok(cart)
    }

    /// Remove every unit of `product_id` from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn remove_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, RepositoryError> {
        self.users
            .update_cart(user_id, |cart| {
                cart.remove_product(product_id);
            })
            .await
    }
}

/// Join cart items with loaded products. Items whose product no longer
/// exists are skipped.
fn populate(cart: &Cart, products: Vec<Product>) -> PopulatedCart {
    let mut by_id: HashMap<ProductId, Product> =
        products.into_iter().map(|p| (p.id, p)).collect();

    let lines = cart
        .items()
        .iter()
        .filter_map(|item| {
            by_id.remove(&item.product_id).map(|product| CartLine {
                product,
                quantity: item.quantity,
            })
        })
        .collect();

    PopulatedCart { lines }
}

#[cfg(test)]
mod tests {
    use bazaar_core::CartItem;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            price: Decimal::new(cents, 2),
            description: "A product".to_string(),
            image_path: format!("images/{id}.png"),
            user_id: UserId::new(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_populate_keeps_cart_order_and_skips_missing() {
        let cart = Cart::from_items(vec![
            CartItem {
                product_id: ProductId::new(3),
                quantity: 1,
            },
            CartItem {
                product_id: ProductId::new(9),
                quantity: 5,
            },
            CartItem {
                product_id: ProductId::new(1),
                quantity: 2,
            },
        ]);

        let populated = populate(&cart, vec![product(1, 250), product(3, 1000)]);

        let ids: Vec<i32> = populated.lines.iter().map(|l| l.product.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(populated.lines[1].quantity, 2);
        assert_eq!(populated.total(), Decimal::new(1500, 2));
    }

    #[test]
    fn test_populate_empty_cart() {
        let populated = populate(&Cart::default(), vec![product(1, 100)]);
        assert!(populated.is_empty());
    }
}
