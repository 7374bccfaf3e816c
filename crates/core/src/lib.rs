//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - Server-rendered shop, cart, checkout and product admin
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart mutation and pagination math live here so
//! they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices and emails
//! - [`cart`] - The per-user cart and its mutation rules
//! - [`pagination`] - Page arithmetic for product listings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod pagination;
pub mod types;

pub use cart::{Cart, CartItem};
pub use pagination::{ITEMS_PER_PAGE, Pagination};
pub use types::*;
