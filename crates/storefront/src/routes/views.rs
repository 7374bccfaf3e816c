//! Display models handed to templates.
//!
//! Prices are formatted once here, in the storefront currency, so templates
//! only print strings.

use bazaar_core::{CurrencyCode, OrderId, Price, ProductId};

use crate::models::{CartLine, Order, PopulatedCart, Product};

/// A product card or detail view.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: ProductId,
    pub title: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
}

impl ProductView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price_in(currency).to_string(),
            description: product.description.clone(),
            image_url: product.image_url(),
        }
    }

    #[must_use]
    pub fn list(products: &[Product], currency: CurrencyCode) -> Vec<Self> {
        products.iter().map(|p| Self::new(p, currency)).collect()
    }
}

/// One cart or checkout line.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub line_total: String,
}

impl CartLineView {
    fn new(line: &CartLine, currency: CurrencyCode) -> Self {
        Self {
            product_id: line.product.id,
            title: line.product.title.clone(),
            quantity: line.quantity,
            line_total: Price::new(line.line_total(), currency).to_string(),
        }
    }
}

/// Lines plus formatted total for a populated cart.
#[must_use]
pub fn cart_view(cart: &PopulatedCart, currency: CurrencyCode) -> (Vec<CartLineView>, String) {
    let lines = cart
        .lines
        .iter()
        .map(|line| CartLineView::new(line, currency))
        .collect();
    (lines, Price::new(cart.total(), currency).to_string())
}

/// One order in the order history.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub items: Vec<OrderItemView>,
    pub total: String,
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub title: String,
    pub quantity: u32,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id,
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    title: item.title.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            total: Price::new(order.total(), currency).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bazaar_core::UserId;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_cart_view_formats_totals() {
        let product = Product {
            id: ProductId::new(4),
            title: "Lamp".to_string(),
            price: Decimal::new(1999, 2),
            description: "Desk lamp".to_string(),
            image_path: "images/lamp.png".to_string(),
            user_id: UserId::new(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let cart = PopulatedCart {
            lines: vec![CartLine {
                product,
                quantity: 3,
            }],
        };

        let (lines, total) = cart_view(&cart, CurrencyCode::INR);
        assert_eq!(lines[0].line_total, "₹59.97");
        assert_eq!(lines[0].product_id, ProductId::new(4));
        assert_eq!(total, "₹59.97");
    }
}
