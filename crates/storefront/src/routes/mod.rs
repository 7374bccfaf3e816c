//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (database)
//!
//! # Shop
//! GET  /                           - Shop index (paginated)
//! GET  /products                   - Product listing (paginated)
//! GET  /products/{id}              - Product detail
//!
//! # Cart (requires auth)
//! GET  /cart                       - Cart page
//! POST /cart                       - Add product to cart
//! POST /cart-delete-item           - Remove product from cart
//!
//! # Checkout (requires auth)
//! GET  /checkout                   - Create payment session and show summary
//! GET  /checkout/success           - Verify payment and place order
//! GET  /checkout/cancel            - Summary again after a cancelled payment
//!
//! # Orders (requires auth)
//! GET  /orders                     - Order history
//! GET  /orders/{id}                - Printable invoice
//!
//! # Admin (requires auth, scoped to own products)
//! GET  /admin/add-product          - New product form
//! POST /admin/add-product          - Create product (multipart)
//! GET  /admin/products             - Own products
//! GET  /admin/edit-product/{id}    - Edit form (`?edit=true`)
//! POST /admin/edit-product         - Update product (multipart)
//! DELETE /admin/product/{id}       - Delete product (JSON)
//!
//! # Auth
//! GET  /login, POST /login         - Login
//! GET  /signup, POST /signup       - Signup
//! POST /logout                     - Logout
//! GET  /reset, POST /reset         - Request a reset link
//! GET  /reset/{token}              - New password form
//! POST /new-password               - Set new password
//!
//! # Static
//! GET  /images/*                   - Uploaded product images
//! GET  /static/*                   - CSS and JS
//! GET  /500                        - Error page
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod errors;
pub mod forms;
pub mod orders;
pub mod shop;
pub mod views;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{
    csrf::FORM_OVERHEAD_BYTES, csrf_middleware, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the shop and cart routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shop::index))
        .route("/products", get(shop::products))
        .route("/products/{id}", get(shop::product_detail))
        .route("/cart", get(cart::show).post(cart::add))
        .route("/cart-delete-item", post(cart::remove))
        .route("/checkout", get(checkout::checkout))
        .route("/checkout/success", get(checkout::success))
        .route("/checkout/cancel", get(checkout::cancel))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::invoice))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/add-product",
            get(admin::add_product_page).post(admin::add_product),
        )
        .route("/products", get(admin::products))
        .route("/edit-product/{id}", get(admin::edit_product_page))
        .route("/edit-product", post(admin::edit_product))
        .route("/product/{id}", delete(admin::delete_product))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/logout", post(auth::logout))
        .route("/reset", get(auth::reset_page).post(auth::reset))
        .route("/reset/{token}", get(auth::new_password_page))
        .route("/new-password", post(auth::new_password))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(shop_routes())
        .merge(auth_routes())
        .nest("/admin", admin_routes())
        .route("/500", get(errors::server_error))
}

/// Build the full application with its middleware stack.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let body_limit = state.config().max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service("/images", ServeDir::new(&state.config().upload_dir))
        .nest_service("/static", ServeDir::new(&state.config().static_dir))
        .fallback(errors::not_found)
        .layer(from_fn_with_state(state.clone(), csrf_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
