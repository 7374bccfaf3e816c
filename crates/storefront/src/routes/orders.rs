//! Order history and invoices.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use tracing::instrument;

use bazaar_core::OrderId;

use super::views::OrderView;
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::invoice::{self, InvoiceTemplate};
use crate::state::AppState;

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/orders.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderView>,
}

/// `GET /orders`
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<OrdersTemplate> {
    let currency = state.config().stripe.currency;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?
        .iter()
        .map(|order| OrderView::new(order, currency))
        .collect();

    Ok(OrdersTemplate { ctx, orders })
}

/// `GET /orders/{id}`
///
/// Serves the invoice inline and keeps a copy in the invoice directory.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let not_found = || AppError::NotFound("No order found.".to_string());
    let id: OrderId = id.parse().map_err(|_| not_found())?;

    let order = OrderRepository::new(state.pool())
        .get_with_items(id)
        .await?
        .ok_or_else(not_found)?;

    if !order.belongs_to(user.id) {
        tracing::warn!(order_id = %id, "Invoice requested for another user's order");
        return Err(AppError::Forbidden(format!("order {id}")));
    }

    let html = InvoiceTemplate::for_order(&order, state.config().stripe.currency).render()?;
    invoice::store_copy(&state.config().invoice_dir, order.id, &html).await;

    let disposition = format!(
        "inline; filename=\"{}\"",
        invoice::invoice_file_name(order.id)
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Html(html)).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::views::OrderItemView;

    #[test]
    fn test_orders_page_lists_invoices() {
        let html = OrdersTemplate {
            ctx: PageContext::anonymous(),
            orders: vec![OrderView {
                id: OrderId::new(11),
                items: vec![OrderItemView {
                    title: "Candle".to_string(),
                    quantity: 4,
                }],
                total: "₹80.00".to_string(),
            }],
        }
        .render()
        .unwrap();

        assert!(html.contains("Order - # 11"));
        assert!(html.contains(r#"href="/orders/11""#));
        assert!(html.contains("Candle (4)"));
    }

    #[test]
    fn test_no_orders_message() {
        let html = OrdersTemplate {
            ctx: PageContext::anonymous(),
            orders: Vec::new(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Nothing there!"));
    }
}
