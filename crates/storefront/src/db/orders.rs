//! Order repository for database operations.
//!
//! An order is written once, at checkout, together with its item snapshots
//! and the clearing of the purchaser's cart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{Email, OrderId, OrderItemId, ProductId, UserId};

use super::{RepositoryError, quantity_from_db, to_db_int};
use crate::models::{CartLine, Order, OrderItem, User};

const ORDER_COLUMNS: &str = "id, user_id, email, payment_session_id, created_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, title, price, description, image_path, quantity";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    email: String,
    payment_session_id: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    title: String,
    price: Decimal,
    description: String,
    image_path: String,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            description: row.description,
            image_path: row.image_path,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

fn order_from_row(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let email = Email::parse(&row.email)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid order email: {e}")))?;

    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        email,
        payment_session_id: row.payment_session_id,
        created_at: row.created_at,
        items,
    })
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Snapshot `lines` into a new order for `user` and clear their cart.
    ///
    /// `payment_session_id` is the idempotency key: if an order already exists
    /// for it, that order is returned and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back in that case.
    pub async fn create_from_cart(
        &self,
        user: &User,
        payment_session_id: &str,
        lines: &[CartLine],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.order (user_id, email, payment_session_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (payment_session_id) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(payment_session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            tx.rollback().await?;
            tracing::info!(payment_session_id, "Order already recorded for payment session");
            return self
                .get_by_payment_session(payment_session_id)
                .await?
                .ok_or(RepositoryError::NotFound);
        };

        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.iter().enumerate() {
            let item = sqlx::query_as::<_, OrderItemRow>(&format!(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, title, price, description, image_path, quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {ORDER_ITEM_COLUMNS}
                "
            ))
            .bind(row.id)
            .bind(line.product.id)
            .bind(&line.product.title)
            .bind(line.product.price)
            .bind(&line.product.description)
            .bind(&line.product.image_path)
            .bind(to_db_int(line.quantity, "quantity")?)
            .bind(to_db_int(position, "position")?)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::try_from(item)?);
        }

        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order_from_row(row, items)
    }

    /// All orders placed by `user_id`, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM storefront.order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|row| row.id).collect();
        let mut items_by_order = self.items_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                order_from_row(row, items)
            })
            .collect()
    }

    /// Get one order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(row).await
    }

    /// Get the order recorded for a payment session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_payment_session(
        &self,
        payment_session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE payment_session_id = $1"
        ))
        .bind(payment_session_id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(row).await
    }

    async fn with_items(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let items = self
            .items_for(&[row.id])
            .await?
            .remove(&row.id)
            .unwrap_or_default();

        order_from_row(row, items).map(Some)
    }

    async fn items_for(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            r"
            SELECT {ORDER_ITEM_COLUMNS} FROM storefront.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "
        ))
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            grouped
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        Ok(grouped)
    }
}
