//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the sqlx row types in
//! [`crate::db`].

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{CartLine, PopulatedCart};
pub use order::{Order, OrderItem};
pub use product::{NewProduct, Product, ProductUpdate};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
