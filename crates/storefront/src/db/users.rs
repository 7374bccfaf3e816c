//! User repository for database operations.
//!
//! Covers accounts, password reset tokens and the per-user cart.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Cart, CartItem, Email, ProductId, UserId};

use super::{RepositoryError, quantity_from_db, to_db_int};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i32,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their (normalized) email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM storefront.user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Create a new user with email and password hash. The cart starts empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO storefront.user (email, password_hash)
            VALUES ($1, $2)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        User::try_from(row)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Store a reset token for a user, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` on a (practically impossible) token collision.
    pub async fn set_reset_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET reset_token = $2, reset_token_expires_at = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("reset token already in use".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Find the user holding `token`, if it has not expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_valid_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            SELECT {USER_COLUMNS} FROM storefront.user
            WHERE reset_token = $1 AND reset_token_expires_at > now()
            "
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Find user `id` if it holds the unexpired `token`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_valid_reset_token_and_id(
        &self,
        token: &str,
        id: UserId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            SELECT {USER_COLUMNS} FROM storefront.user
            WHERE id = $1 AND reset_token = $2 AND reset_token_expires_at > now()
            "
        ))
        .bind(id)
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Replace the password hash and clear the reset token in one statement.
    ///
    /// Only succeeds while the token is still valid; returns `false` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET password_hash = $3,
                reset_token = NULL,
                reset_token_expires_at = NULL,
                updated_at = now()
            WHERE id = $1 AND reset_token = $2 AND reset_token_expires_at > now()
            ",
        )
        .bind(id)
        .bind(token)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Load a user's cart in line order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT product_id, quantity
            FROM storefront.cart_item
            WHERE user_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        cart_from_rows(rows)
    }

    /// Load, mutate and persist a cart inside one transaction.
    ///
    /// The user row is locked for the duration, so concurrent requests for the
    /// same user serialize on the database instead of losing updates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist, or if a
    /// product in the cart was deleted before the cart was written back.
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn update_cart<F>(&self, user_id: UserId, mutate: F) -> Result<Cart, RepositoryError>
    where
        F: FnOnce(&mut Cart) + Send,
    {
        let mut tx = self.pool.begin().await?;

        let mut cart = lock_cart(&mut tx, user_id).await?;
        mutate(&mut cart);

        replace_cart(&mut tx, user_id, &cart).await?;
        tx.commit().await?;

        Ok(cart)
    }

    /// Add one unit of `product_id` to the cart.
    ///
    /// The product row is share-locked in the same transaction as the cart
    /// write, so it cannot be deleted between the existence check and the
    /// insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user or product doesn't exist.
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut cart = lock_cart(&mut tx, user_id).await?;

        let product = sqlx::query("SELECT id FROM storefront.product WHERE id = $1 FOR SHARE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if product.is_none() {
            return Err(RepositoryError::NotFound);
        }

        cart.add_product(product_id);

        replace_cart(&mut tx, user_id, &cart).await?;
        tx.commit().await?;

        Ok(cart)
    }
}

/// Lock the user row and read its cart.
async fn lock_cart(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<Cart, RepositoryError> {
    let locked = sqlx::query("SELECT id FROM storefront.user WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    if locked.is_none() {
        return Err(RepositoryError::NotFound);
    }

    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT product_id, quantity
        FROM storefront.cart_item
        WHERE user_id = $1
        ORDER BY position ASC
        ",
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;

    cart_from_rows(rows)
}

fn cart_from_rows(rows: Vec<CartItemRow>) -> Result<Cart, RepositoryError> {
    let items = rows
        .into_iter()
        .map(|row| {
            Ok(CartItem {
                product_id: row.product_id,
                quantity: quantity_from_db(row.quantity)?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    Ok(Cart::from_items(items))
}

async fn replace_cart(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
    cart: &Cart,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for (position, item) in cart.items().iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO storefront.cart_item (user_id, product_id, quantity, position)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user_id)
        .bind(item.product_id)
        .bind(to_db_int(item.quantity, "quantity")?)
        .bind(to_db_int(position, "position")?)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;
    }

    Ok(())
}
