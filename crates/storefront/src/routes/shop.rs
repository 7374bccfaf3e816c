//! Catalog pages: shop index, product list and product detail.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{Pagination, ProductId};

use super::views::ProductView;
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Paginated product grid, used for both `/` and `/products`.
#[derive(Template, WebTemplate)]
#[template(path = "shop/product-list.html")]
pub struct ProductListTemplate {
    pub ctx: PageContext,
    pub page_title: &'static str,
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

/// Product detail page.
#[derive(Template, WebTemplate)]
#[template(path = "shop/product-detail.html")]
pub struct ProductDetailTemplate {
    pub ctx: PageContext,
    pub product: ProductView,
}

/// `?page=` query.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /`
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<ProductListTemplate> {
    product_page(&state, ctx, query.page.as_deref(), "Shop").await
}

/// `GET /products`
#[instrument(skip(state, ctx))]
pub async fn products(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<ProductListTemplate> {
    product_page(&state, ctx, query.page.as_deref(), "Products").await
}

async fn product_page(
    state: &AppState,
    ctx: PageContext,
    requested_page: Option<&str>,
    page_title: &'static str,
) -> Result<ProductListTemplate> {
    let repo = ProductRepository::new(state.pool());
    let total = repo.count().await?;
    let pagination = Pagination::new(requested_page, total, state.config().items_per_page);
    let products = repo
        .list_page(pagination.offset(), pagination.limit())
        .await?;

    Ok(ProductListTemplate {
        ctx,
        page_title,
        products: ProductView::list(&products, state.config().stripe.currency),
        pagination,
    })
}

/// `GET /products/{id}`
#[instrument(skip(state, ctx))]
pub async fn product_detail(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<String>,
) -> Result<Response> {
    let Ok(id) = id.parse::<ProductId>() else {
        return Err(AppError::NotFound(format!("product {id}")));
    };

    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductDetailTemplate {
        ctx,
        product: ProductView::new(&product, state.config().stripe.currency),
    }
    .into_response())
}
