//! Checkout through a hosted Stripe Checkout page.
//!
//! `GET /checkout` creates a payment session for the current cart.
//! Stripe sends the customer back to `/checkout/success`, where the session
//! is retrieved and verified before the cart is snapshotted into an order.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::CurrencyCode;

use super::forms;
use super::views::{CartLineView, cart_view};
use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, flash};
use crate::models::{CurrentUser, PopulatedCart};
use crate::payments::{CheckoutLineItem, CheckoutRequest};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/checkout.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub payment_url: String,
    pub cancelled: bool,
}

/// Query Stripe appends to the success URL.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// `GET /checkout`
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<Response> {
    checkout_page(&state, &user, ctx, false).await
}

/// `GET /checkout/cancel`
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<Response> {
    checkout_page(&state, &user, ctx, true).await
}

async fn checkout_page(
    state: &AppState,
    user: &CurrentUser,
    ctx: PageContext,
    cancelled: bool,
) -> Result<Response> {
    let cart = CartService::new(state.pool()).load(user.id).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let request = CheckoutRequest {
        line_items: line_items(&cart, state.stripe().currency())?,
        success_url: state
            .config()
            .absolute_url("/checkout/success?session_id={CHECKOUT_SESSION_ID}"),
        cancel_url: state.config().absolute_url("/checkout/cancel"),
        client_reference_id: user.id.to_string(),
        customer_email: Some(user.email.to_string()),
    };

    let session = state.stripe().create_checkout_session(&request).await?;
    let payment_url = session.url.ok_or_else(|| {
        AppError::Internal(format!("checkout session {} has no URL", session.id))
    })?;

    let (lines, total) = cart_view(&cart, state.config().stripe.currency);
    Ok(CheckoutTemplate {
        ctx,
        lines,
        total,
        payment_url,
        cancelled,
    }
    .into_response())
}

/// Map cart lines to Checkout line items, charging `ceil(price * 100)` minor units.
fn line_items(cart: &PopulatedCart, currency: CurrencyCode) -> Result<Vec<CheckoutLineItem>> {
    cart.lines
        .iter()
        .map(|line| {
            let unit_amount = line
                .product
                .price_in(currency)
                .minor_units()
                .map_err(|e| AppError::Internal(format!("product {}: {e}", line.product.id)))?;

            Ok(CheckoutLineItem {
                name: line.product.title.clone(),
                description: line.product.description.clone(),
                unit_amount,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// How a paid session compares with the cart it is about to be turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidCart {
    Matches,
    Empty,
    AmountMismatch { paid: Option<i64>, cart: i64 },
}

/// Compare the cart's minor-unit total with what the session charged.
///
/// A session without `amount_total` never matches.
fn check_paid_cart(
    cart: &PopulatedCart,
    currency: CurrencyCode,
    amount_total: Option<i64>,
) -> Result<PaidCart> {
    if cart.is_empty() {
        return Ok(PaidCart::Empty);
    }

    let total = line_items(cart, currency)?
        .iter()
        .try_fold(0_i64, |sum, item| {
            item.unit_amount
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| sum.checked_add(line))
        })
        .ok_or_else(|| AppError::Internal("cart total overflows minor units".to_string()))?;

    if amount_total == Some(total) {
        Ok(PaidCart::Matches)
    } else {
        Ok(PaidCart::AmountMismatch {
            paid: amount_total,
            cart: total,
        })
    }
}

/// `GET /checkout/success`
///
/// The order is only written when Stripe reports the session as paid, the
/// session was created for this user, and the amount paid equals the cart
/// total. Revisiting the URL finds the existing order instead of creating
/// another.
#[instrument(skip(state, user, session, query), fields(user_id = %user.id))]
pub async fn success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing checkout session".to_string()))?;

    let orders = OrderRepository::new(state.pool());
    if let Some(existing) = orders.get_by_payment_session(&session_id).await? {
        if !existing.belongs_to(user.id) {
            return Err(AppError::Forbidden("checkout session of another user".to_string()));
        }
        return Ok(Redirect::to("/orders").into_response());
    }

    let checkout = state.stripe().retrieve_checkout_session(&session_id).await?;
    if !checkout.belongs_to(&user.id.to_string()) {
        tracing::warn!(%session_id, "Checkout session belongs to another user");
        return Err(AppError::Forbidden("checkout session of another user".to_string()));
    }
    if !checkout.is_paid() {
        tracing::warn!(%session_id, payment_status = %checkout.payment_status, "Checkout session not paid");
        return Ok(Redirect::to("/checkout").into_response());
    }

    let account = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;
    let cart = CartService::new(state.pool()).load(user.id).await?;

    match check_paid_cart(&cart, state.stripe().currency(), checkout.amount_total)? {
        PaidCart::Matches => {
            tracing::info!(%session_id, amount_total = ?checkout.amount_total, "Payment confirmed");
        }
        PaidCart::Empty => {
            tracing::warn!(%session_id, "Paid checkout session but the cart is empty");
            flash::set_error(&session, forms::CHECKOUT_CART_CHANGED).await?;
            return Ok(Redirect::to("/cart").into_response());
        }
        PaidCart::AmountMismatch { paid, cart } => {
            tracing::warn!(%session_id, ?paid, cart, "Paid amount differs from cart total");
            flash::set_error(&session, forms::CHECKOUT_CART_CHANGED).await?;
            return Ok(Redirect::to("/cart").into_response());
        }
    }

    let order = orders
        .create_from_cart(&account, &checkout.id, &cart.lines)
        .await?;
    tracing::info!(order_id = %order.id, items = order.items.len(), "Order placed");

    Ok(Redirect::to("/orders").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{ProductId, UserId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{CartLine, Product};

    fn line(id: i32, price: Decimal, quantity: u32) -> CartLine {
        CartLine {
            product: Product {
                id: ProductId::new(id),
                title: "Soap".to_string(),
                price,
                description: "Lavender".to_string(),
                image_path: "images/soap.png".to_string(),
                user_id: UserId::new(2),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            quantity,
        }
    }

    #[test]
    fn test_line_items_round_up_to_minor_units() {
        let cart = PopulatedCart {
            lines: vec![line(1, Decimal::new(10005, 3), 3)],
        };

        let items = line_items(&cart, CurrencyCode::INR).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_amount, 1001);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].name, "Soap");
    }

    #[test]
    fn test_paid_cart_matches_rounded_total() {
        // 3 x 1001 + 2 x 250
        let cart = PopulatedCart {
            lines: vec![
                line(1, Decimal::new(10005, 3), 3),
                line(2, Decimal::new(250, 2), 2),
            ],
        };

        let check = check_paid_cart(&cart, CurrencyCode::INR, Some(3503)).unwrap();
        assert_eq!(check, PaidCart::Matches);
    }

    #[test]
    fn test_paid_cart_grown_after_payment_is_refused() {
        let cart = PopulatedCart {
            lines: vec![
                line(1, Decimal::new(1000, 2), 1),
                line(2, Decimal::new(500, 2), 1),
            ],
        };

        let check = check_paid_cart(&cart, CurrencyCode::INR, Some(1000)).unwrap();
        assert_eq!(
            check,
            PaidCart::AmountMismatch {
                paid: Some(1000),
                cart: 1500
            }
        );
    }

    #[test]
    fn test_paid_cart_empty_is_refused() {
        let cart = PopulatedCart { lines: Vec::new() };

        let check = check_paid_cart(&cart, CurrencyCode::INR, Some(1000)).unwrap();
        assert_eq!(check, PaidCart::Empty);
    }

    #[test]
    fn test_paid_cart_without_session_amount_is_refused() {
        let cart = PopulatedCart {
            lines: vec![line(1, Decimal::new(1000, 2), 1)],
        };

        let check = check_paid_cart(&cart, CurrencyCode::INR, None).unwrap();
        assert_eq!(
            check,
            PaidCart::AmountMismatch {
                paid: None,
                cart: 1000
            }
        );
    }

    #[test]
    fn test_checkout_page_links_to_payment() {
        let html = CheckoutTemplate {
            ctx: PageContext::anonymous(),
            lines: Vec::new(),
            total: "₹10.00".to_string(),
            payment_url: "https://checkout.stripe.com/c/pay/cs_test_1".to_string(),
            cancelled: true,
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"href="https://checkout.stripe.com/c/pay/cs_test_1""#));
        assert!(html.contains("Payment was cancelled"));
    }
}
