//! Stripe API client for Checkout sessions.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use super::types::{ApiErrorResponse, CheckoutRequest, CheckoutSession};
use crate::config::StripeConfig;

use bazaar_core::CurrencyCode;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to decode a response, or a value we sent was unusable.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    currency: CurrencyCode,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("currency", &self.currency)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            currency: config.currency,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Currency every session is created in.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Create a hosted Checkout session in payment mode.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Api` if Stripe rejects the request.
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let params = checkout_form(request, self.currency);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let session = decode(response).await?;
        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    /// Fetch a Checkout session by ID.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Decode` for a malformed session ID and
    /// `PaymentError::Api` if Stripe does not know the session.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        if !is_valid_session_id(session_id) {
            return Err(PaymentError::Decode(format!(
                "malformed session id: {session_id:?}"
            )));
        }

        let url = format!("{}/v1/checkout/sessions/{session_id}", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> Result<CheckoutSession, PaymentError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(|e| {
                let kind = e.error.kind.unwrap_or_default();
                e.error.message.map(|m| format!("{kind}: {m}"))
            })
            .unwrap_or(body);

        tracing::warn!(status = status.as_u16(), %message, "Stripe API error");
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| PaymentError::Decode(e.to_string()))
}

/// Session IDs look like `cs_test_a1B2...`.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Encode a checkout request as Stripe's bracketed form parameters.
fn checkout_form(request: &CheckoutRequest, currency: CurrencyCode) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
    ];

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.push((
            format!("{prefix}[price_data][currency]"),
            currency.code().to_string(),
        ));
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if !item.description.is_empty() {
            params.push((
                format!("{prefix}[price_data][product_data][description]"),
                item.description.clone(),
            ));
        }
        params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    params
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payments::CheckoutLineItem;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            line_items: vec![
                CheckoutLineItem {
                    name: "Notebook".to_string(),
                    description: "Lined, A5".to_string(),
                    unit_amount: 1250,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Pen".to_string(),
                    description: String::new(),
                    unit_amount: 99,
                    quantity: 1,
                },
            ],
            success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
            client_reference_id: "12".to_string(),
            customer_email: Some("buyer@bazaar.test".to_string()),
        }
    }

    fn value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_encodes_line_items() {
        let params = checkout_form(&request(), CurrencyCode::INR);

        assert_eq!(value(&params, "mode"), Some("payment"));
        assert_eq!(value(&params, "client_reference_id"), Some("12"));
        assert_eq!(value(&params, "customer_email"), Some("buyer@bazaar.test"));
        assert_eq!(value(&params, "line_items[0][price_data][currency]"), Some("inr"));
        assert_eq!(value(&params, "line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(
            value(&params, "line_items[0][price_data][product_data][name]"),
            Some("Notebook")
        );
        assert_eq!(value(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&params, "line_items[1][quantity]"), Some("1"));
        assert_eq!(
            value(&params, "line_items[1][price_data][product_data][description]"),
            None
        );
    }

    #[test]
    fn test_success_url_keeps_session_placeholder() {
        let params = checkout_form(&request(), CurrencyCode::USD);
        assert!(
            value(&params, "success_url")
                .unwrap()
                .ends_with("session_id={CHECKOUT_SESSION_ID}")
        );
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("cs_test_a1B2c3"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../v1/customers"));
        assert!(!is_valid_session_id("cs test"));
    }

    #[test]
    fn test_session_payment_checks() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_1","payment_status":"paid","client_reference_id":"12","url":null}"#,
        )
        .unwrap();
        assert!(session.is_paid());
        assert!(session.belongs_to("12"));
        assert!(!session.belongs_to("13"));

        let unpaid: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_2","payment_status":"unpaid"}"#).unwrap();
        assert!(!unpaid.is_paid());
        assert!(!unpaid.belongs_to("12"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_malformed_id_without_request() {
        let config = crate::config::tests::test_config();
        let client = StripeClient::new(&config.stripe).unwrap();

        let result = client.retrieve_checkout_session("cs/../../x").await;
        assert!(matches!(result, Err(PaymentError::Decode(_))));
    }
}
