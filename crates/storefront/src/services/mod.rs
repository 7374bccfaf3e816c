//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password signup, login and reset tokens
//! - `cart` - Persisted cart joined with product data
//! - `email` - Transactional email (password reset, signup)
//! - `invoice` - Printable order invoices
//! - `uploads` - Product image storage

pub mod auth;
pub mod cart;
pub mod email;
pub mod invoice;
pub mod uploads;
