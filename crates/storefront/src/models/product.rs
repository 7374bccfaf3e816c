//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{CurrencyCode, Price, ProductId, UserId};

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// Unit price in the store currency.
    pub price: Decimal,
    pub description: String,
    /// Relative path of the stored image, e.g. `images/2026-03-01T10:00:00Z-mug.png`.
    pub image_path: String,
    /// The user who created (and may edit) this product.
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// URL the image is served from.
    #[must_use]
    pub fn image_url(&self) -> String {
        format!("/{}", self.image_path.trim_start_matches('/'))
    }

    /// Unit price with currency.
    #[must_use]
    pub const fn price_in(&self, currency: CurrencyCode) -> Price {
        Price::new(self.price, currency)
    }
}

/// Validated input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub price: Decimal,
    pub description: String,
    pub image_path: String,
    pub user_id: UserId,
}

/// Validated input for updating a product. `image_path` is `None` when the
/// existing image is kept.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub title: String,
    pub price: Decimal,
    pub description: String,
    pub image_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(image_path: &str) -> Product {
        Product {
            id: ProductId::new(1),
            title: "Mug".to_string(),
            price: Decimal::new(450, 2),
            description: "A sturdy mug".to_string(),
            image_path: image_path.to_string(),
            user_id: UserId::new(7),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_image_url() {
        assert_eq!(product("images/mug.png").image_url(), "/images/mug.png");
        assert_eq!(product("/images/mug.png").image_url(), "/images/mug.png");
    }

    #[test]
    fn test_price_in() {
        let p = product("images/mug.png");
        assert_eq!(p.price_in(CurrencyCode::INR).to_string(), "₹4.50");
    }
}
