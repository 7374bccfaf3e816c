//! Cart route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::ProductId;

use super::forms::ProductIdForm;
use super::views::{CartLineView, cart_view};
use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, flash};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/cart.html")]
pub struct CartTemplate {
    pub ctx: PageContext,
    pub error_message: Option<String>,
    pub lines: Vec<CartLineView>,
    pub total: String,
}

/// `GET /cart`
#[instrument(skip(state, session, ctx, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    ctx: PageContext,
) -> Result<CartTemplate> {
    let cart = CartService::new(state.pool()).load(user.id).await?;
    let (lines, total) = cart_view(&cart, state.config().stripe.currency);

    Ok(CartTemplate {
        ctx,
        error_message: flash::take_error(&session).await,
        lines,
        total,
    })
}

/// `POST /cart`
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProductIdForm>,
) -> Result<Response> {
    let product_id = parse_product_id(&form.product_id)?;

    match CartService::new(state.pool())
        .add_product(user.id, product_id)
        .await
    {
        Ok(_) => Ok(Redirect::to("/cart").into_response()),
        Err(RepositoryError::NotFound) => {
            Err(AppError::NotFound(format!("product {product_id}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /cart-delete-item`
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProductIdForm>,
) -> Result<Response> {
    let product_id = parse_product_id(&form.product_id)?;

    CartService::new(state.pool())
        .remove_product(user.id, product_id)
        .await?;

    Ok(Redirect::to("/cart").into_response())
}

fn parse_product_id(raw: &str) -> Result<ProductId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("invalid product id".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cart_message() {
        let html = CartTemplate {
            ctx: PageContext::anonymous(),
            error_message: None,
            lines: Vec::new(),
            total: "₹0.00".to_string(),
        }
        .render()
        .unwrap();
        assert!(html.contains("No Products in Cart!"));
    }

    #[test]
    fn test_cart_lines_have_delete_forms() {
        let html = CartTemplate {
            ctx: PageContext {
                current_user: None,
                csrf_token: "tok".to_string(),
            },
            error_message: Some("Cart changed".to_string()),
            lines: vec![CartLineView {
                product_id: ProductId::new(8),
                title: "Kettle".to_string(),
                quantity: 2,
                line_total: "₹100.00".to_string(),
            }],
            total: "₹100.00".to_string(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Quantity: 2"));
        assert!(html.contains(r#"name="productId" value="8""#));
        assert!(html.contains(r#"name="_csrf" value="tok""#));
        assert!(html.contains("Total: ₹100.00"));
        assert!(html.contains("Cart changed"));
    }

    #[test]
    fn test_parse_product_id() {
        assert_eq!(parse_product_id("12").unwrap(), ProductId::new(12));
        assert!(matches!(
            parse_product_id("abc"),
            Err(AppError::BadRequest(_))
        ));
    }
}
