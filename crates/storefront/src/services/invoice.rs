//! Printable order invoices.
//!
//! An invoice is an HTML page rendered from the order snapshot. A copy is
//! written to the invoice directory each time it is served.

use std::path::Path;

use askama::Template;

use bazaar_core::{CurrencyCode, OrderId, Price};

use crate::filters;
use crate::models::Order;

/// One rendered invoice line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub title: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl InvoiceLine {
    /// `"{title} - {qty} x {price}"`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} - {} x {}", self.title, self.quantity, self.unit_price)
    }
}

/// Invoice page template.
#[derive(Template)]
#[template(path = "invoice.html")]
pub struct InvoiceTemplate {
    pub order_id: OrderId,
    pub email: String,
    pub placed_on: String,
    pub lines: Vec<InvoiceLine>,
    pub total: String,
}

impl InvoiceTemplate {
    #[must_use]
    pub fn for_order(order: &Order, currency: CurrencyCode) -> Self {
        let lines = order
            .items
            .iter()
            .map(|item| InvoiceLine {
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: Price::new(item.price, currency).to_string(),
                line_total: Price::new(item.line_total(), currency).to_string(),
            })
            .collect();

        Self {
            order_id: order.id,
            email: order.email.to_string(),
            placed_on: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            lines,
            total: Price::new(order.total(), currency).to_string(),
        }
    }

    /// `"Total Price: {total}"`.
    #[must_use]
    pub fn total_line(&self) -> String {
        format!("Total Price: {}", self.total)
    }
}

/// File name used both on disk and in `Content-Disposition`.
#[must_use]
pub fn invoice_file_name(order_id: OrderId) -> String {
    format!("invoice-{order_id}.html")
}

/// Write a copy of the rendered invoice. Failures are logged, never returned.
pub async fn store_copy(dir: &Path, order_id: OrderId, html: &str) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to create invoice directory");
        return;
    }

    let path = dir.join(invoice_file_name(order_id));
    if let Err(e) = tokio::fs::write(&path, html).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to store invoice copy");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Email, OrderItemId, ProductId, UserId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::OrderItem;

    fn order() -> Order {
        Order {
            id: OrderId::new(7),
            user_id: UserId::new(1),
            email: Email::parse("buyer@bazaar.test").unwrap(),
            payment_session_id: "cs_test_123".to_string(),
            created_at: Utc::now(),
            items: vec![
                OrderItem {
                    id: OrderItemId::new(1),
                    product_id: Some(ProductId::new(2)),
                    title: "Notebook".to_string(),
                    price: Decimal::new(1250, 2),
                    description: "Lined".to_string(),
                    image_path: "images/notebook.png".to_string(),
                    quantity: 2,
                },
                OrderItem {
                    id: OrderItemId::new(2),
                    product_id: None,
                    title: "Pencil <HB>".to_string(),
                    price: Decimal::new(99, 2),
                    description: "Graphite".to_string(),
                    image_path: "images/pencil.png".to_string(),
                    quantity: 1,
                },
            ],
        }
    }

    #[test]
    fn test_invoice_lines_and_total() {
        let invoice = InvoiceTemplate::for_order(&order(), CurrencyCode::USD);

        assert_eq!(invoice.lines[0].summary(), "Notebook - 2 x $12.50");
        assert_eq!(invoice.lines[0].line_total, "$25.00");
        assert_eq!(invoice.total_line(), "Total Price: $25.99");
    }

    #[test]
    fn test_invoice_renders_escaped_titles() {
        let html = InvoiceTemplate::for_order(&order(), CurrencyCode::INR)
            .render()
            .unwrap();

        assert!(html.contains("Invoice #7"));
        assert!(html.contains("Total Price: ₹25.99"));
        assert!(html.contains("Pencil &#60;HB&#62;") || html.contains("Pencil &lt;HB&gt;"));
        assert!(!html.contains("<HB>"));
    }

    #[test]
    fn test_invoice_file_name() {
        assert_eq!(invoice_file_name(OrderId::new(42)), "invoice-42.html");
    }

    #[tokio::test]
    async fn test_store_copy_writes_file() {
        let dir = std::env::temp_dir().join(format!("bazaar-invoice-{}", uuid::Uuid::new_v4()));
        store_copy(&dir, OrderId::new(3), "<p>hi</p>").await;

        let written = tokio::fs::read_to_string(dir.join("invoice-3.html")).await.unwrap();
        assert_eq!(written, "<p>hi</p>");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
