//! Stripe Checkout integration.
//!
//! The storefront creates a hosted Checkout session for the cart, sends the
//! customer to it, and on return retrieves the session to confirm payment
//! before recording the order.

mod client;
mod types;

pub use client::{PaymentError, StripeClient};
pub use types::{CheckoutLineItem, CheckoutRequest, CheckoutSession};
