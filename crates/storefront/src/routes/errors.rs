//! Error pages.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::filters;
use crate::middleware::PageContext;

/// 404 page template.
#[derive(Template)]
#[template(path = "errors/404.html")]
pub struct NotFoundTemplate {
    pub ctx: PageContext,
}

/// 500 page template.
#[derive(Template)]
#[template(path = "errors/500.html")]
pub struct ServerErrorTemplate {
    pub ctx: PageContext,
}

/// Render the 404 page, with navigation for `ctx` when known.
#[must_use]
pub fn not_found_page(ctx: Option<PageContext>) -> Response {
    let ctx = ctx.unwrap_or_else(PageContext::anonymous);
    render_with_status(StatusCode::NOT_FOUND, &NotFoundTemplate { ctx })
}

/// Render the generic 500 page.
#[must_use]
pub fn server_error_page() -> Response {
    render_with_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ServerErrorTemplate {
            ctx: PageContext::anonymous(),
        },
    )
}

fn render_with_status(status: StatusCode, template: &impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found(ctx: PageContext) -> Response {
    not_found_page(Some(ctx))
}

/// `GET /500`
pub async fn server_error(ctx: PageContext) -> Response {
    render_with_status(StatusCode::INTERNAL_SERVER_ERROR, &ServerErrorTemplate { ctx })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_pages_render() {
        let response = not_found_page(None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let html = NotFoundTemplate {
            ctx: PageContext::anonymous(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Page Not Found!"));
        assert!(html.contains("href=\"/login\""));

        let response = server_error_page();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
