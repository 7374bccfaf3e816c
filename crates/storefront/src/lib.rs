//! Bazaar storefront library.
//!
//! A server-rendered shop: catalog browsing, a per-user cart, hosted card
//! checkout, order history with invoices, and product management for the
//! users who list items. The binary in `main.rs` wires this into a server;
//! the library form keeps handlers testable.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
