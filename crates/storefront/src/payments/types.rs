//! Stripe Checkout request and response types.

use serde::Deserialize;

/// One product line sent to Checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: String,
    /// Price of one unit in minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Parameters for creating a Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Our user ID, echoed back on the session for verification.
    pub client_reference_id: String,
    pub customer_email: Option<String>,
}

/// The subset of a Checkout session the storefront reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page; absent once the session has completed.
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}

impl CheckoutSession {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Whether the session was created for `reference`.
    #[must_use]
    pub fn belongs_to(&self, reference: &str) -> bool {
        self.client_reference_id.as_deref() == Some(reference)
    }
}

/// Error envelope returned by the Stripe API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}
