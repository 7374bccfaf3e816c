//! Integration test helpers for the Bazaar storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the storefront against a test database
//! cargo run -p bazaar-cli -- migrate
//! cargo run -p bazaar-storefront
//!
//! # Run the ignored end-to-end tests
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! The server address comes from `STOREFRONT_BASE_URL`
//! (default `http://localhost:3000`). Tests that adjust rows directly read
//! `STOREFRONT_DATABASE_URL` (falling back to `DATABASE_URL`).
//!
//! Checkout tests answer the storefront's payment API calls themselves, so
//! start the storefront with `STRIPE_API_BASE=http://127.0.0.1:12111` (or
//! whatever `STRIPE_STUB_ADDR` is set to).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode as AxumStatus,
    routing::get,
};
use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for accounts created by the tests.
pub const TEST_PASSWORD: &str = "abc12345";

/// Base URL of the running storefront.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A unique address so test runs never collide.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@bazaar.test", Uuid::new_v4().simple())
}

/// Connect to the storefront database the server under test uses.
///
/// # Errors
///
/// Returns `sqlx::Error` if no URL is set or the connection fails.
pub async fn connect_db() -> Result<PgPool, sqlx::Error> {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| sqlx::Error::Configuration("STOREFRONT_DATABASE_URL is not set".into()))?;
    PgPool::connect(&url).await
}

/// ID of the account registered under `email`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the account doesn't exist.
pub async fn user_id_for(pool: &PgPool, email: &str) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM storefront.user WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
}

/// A session ID in the processor's format that no other run will reuse.
#[must_use]
pub fn unique_session_id() -> String {
    format!("cs_test_{}", Uuid::new_v4().simple())
}

/// Canned Checkout sessions keyed by ID.
#[derive(Clone, Default)]
pub struct StubPayments {
    sessions: Arc<Mutex<HashMap<String, Value>>>,
}

impl StubPayments {
    /// Register a session the storefront will find when it retrieves `id`.
    pub fn insert_session(
        &self,
        id: &str,
        payment_status: &str,
        client_reference_id: i32,
        amount_total: i64,
    ) {
        let session = json!({
            "id": id,
            "object": "checkout.session",
            "url": null,
            "payment_status": payment_status,
            "client_reference_id": client_reference_id.to_string(),
            "amount_total": amount_total,
        });
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id.to_string(), session);
        }
    }

    /// Serve `GET /v1/checkout/sessions/{id}` on `STRIPE_STUB_ADDR`
    /// (default `127.0.0.1:12111`) until the runtime shuts down.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the address cannot be bound.
    pub async fn spawn(&self) -> Result<(), std::io::Error> {
        let addr = std::env::var("STRIPE_STUB_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:12111".to_string());
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let app = Router::new()
            .route("/v1/checkout/sessions/{id}", get(retrieve_session))
            .with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(())
    }
}

async fn retrieve_session(
    State(stub): State<StubPayments>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (AxumStatus, Json<Value>)> {
    let session = stub
        .sessions
        .lock()
        .ok()
        .and_then(|sessions| sessions.get(&id).cloned());

    session.map(Json).ok_or_else(|| {
        (
            AxumStatus::NOT_FOUND,
            Json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": format!("No such checkout.session: '{id}'"),
                }
            })),
        )
    })
}

/// Pull the `_csrf` hidden field out of a rendered form.
#[must_use]
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker)? + marker.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_string)
}

/// A browser-like client with a cookie jar that does not follow redirects.
pub struct TestClient {
    pub client: Client,
    pub base_url: String,
}

impl TestClient {
    /// Build a fresh client with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: storefront_base_url(),
        })
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and return the body.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the request fails.
    pub async fn get_text(&self, path: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    /// Fetch the CSRF token bound to this client's session.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the login page cannot be loaded.
    pub async fn csrf_token(&self) -> Result<Option<String>, reqwest::Error> {
        let (_, html) = self.get_text("/login").await?;
        Ok(extract_csrf_token(&html))
    }

    /// POST a form with the session's CSRF token attached.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the request fails.
    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let token = self.csrf_token().await?.unwrap_or_default();
        let mut form: Vec<(&str, &str)> = vec![("_csrf", token.as_str())];
        form.extend_from_slice(fields);

        self.client.post(self.url(path)).form(&form).send().await
    }

    /// Sign up and log in as a new user, returning the email used.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if either request fails.
    pub async fn sign_up_and_log_in(&self) -> Result<String, reqwest::Error> {
        let email = unique_email();
        self.post_form(
            "/signup",
            &[
                ("email", &email),
                ("password", TEST_PASSWORD),
                ("confirmPassword", TEST_PASSWORD),
            ],
        )
        .await?;
        self.post_form("/login", &[("email", &email), ("password", TEST_PASSWORD)])
            .await?;
        Ok(email)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csrf_token() {
        let html = r#"<form><input type="hidden" name="_csrf" value="abc-123_x"></form>"#;
        assert_eq!(extract_csrf_token(html).unwrap(), "abc-123_x");
        assert!(extract_csrf_token("<form></form>").is_none());
    }

    #[test]
    fn test_unique_session_id_is_processor_shaped() {
        let id = unique_session_id();
        assert!(id.starts_with("cs_test_"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[tokio::test]
    async fn test_stub_returns_registered_session() {
        let stub = StubPayments::default();
        stub.insert_session("cs_test_1", "paid", 4, 1250);

        let Json(found) = retrieve_session(State(stub.clone()), Path("cs_test_1".to_string()))
            .await
            .unwrap();
        assert_eq!(found["payment_status"], "paid");
        assert_eq!(found["client_reference_id"], "4");
        assert_eq!(found["amount_total"], 1250);

        let (status, _) = retrieve_session(State(stub), Path("cs_test_2".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, AxumStatus::NOT_FOUND);
    }

    #[test]
    fn test_unique_email_differs() {
        assert_ne!(unique_email(), unique_email());
        assert!(unique_email().ends_with("@bazaar.test"));
    }
}
