//! CSRF protection with a per-session synchronizer token.
//!
//! The token is created on first use and stored in the session. Every form
//! embeds it as a hidden `_csrf` field; scripts send it in the
//! `x-csrf-token` header. Any state-changing request without a matching
//! token is rejected with 403 before it reaches a handler.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use tower_sessions::Session;

use crate::models::session_keys;
use crate::state::AppState;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "_csrf";

/// Header carrying the token for script requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Extra bytes allowed beyond the upload limit for the other form fields.
pub const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Return the session's CSRF token, creating one if needed.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }

    let token = generate_token();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare two tokens without short-circuiting on the first differing byte.
#[must_use]
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

const fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Reject state-changing requests whose token doesn't match the session's.
pub async fn csrf_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        tracing::error!("Session layer missing; cannot verify CSRF token");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let expected = match session.get::<String>(session_keys::CSRF_TOKEN).await {
        Ok(Some(token)) => token,
        Ok(None) => return reject("no CSRF token in session"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read CSRF token from session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(provided) = header_token(request.headers()) {
        return if tokens_match(&expected, &provided) {
            next.run(request).await
        } else {
            reject("CSRF header mismatch")
        };
    }

    let limit = state.config().max_upload_bytes + FORM_OVERHEAD_BYTES;
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Request body rejected while checking CSRF token");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let provided = form_token(&parts, bytes.clone()).await;
    let request = Request::from_parts(parts, Body::from(bytes));

    match provided {
        Some(provided) if tokens_match(&expected, &provided) => next.run(request).await,
        Some(_) => reject("CSRF token mismatch"),
        None => reject("CSRF token missing"),
    }
}

fn reject(reason: &'static str) -> Response {
    tracing::warn!(reason, "Rejected request without valid CSRF token");
    (StatusCode::FORBIDDEN, "Invalid CSRF token").into_response()
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn content_type(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase)
}

/// Find `_csrf` in a buffered urlencoded or multipart body.
async fn form_token(parts: &Parts, bytes: Bytes) -> Option<String> {
    let content_type = content_type(parts)?;

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return urlencoded_token(&bytes);
    }

    if content_type.starts_with("multipart/form-data") {
        return multipart_token(parts, bytes).await;
    }

    None
}

fn urlencoded_token(bytes: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(bytes)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

async fn multipart_token(parts: &Parts, bytes: Bytes) -> Option<String> {
    let mut form_request = Request::new(Body::from(bytes));
    *form_request.headers_mut() = parts.headers.clone();
    *form_request.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(form_request, &()).await.ok()?;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(CSRF_FIELD) {
            return field.text().await.ok();
        }
    }

    None
}
