//! Session-related types.
//!
//! Types stored in the session for authentication, CSRF and flash state.

use serde::{Deserialize, Serialize};

use bazaar_core::{Email, UserId};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the synchronizer CSRF token.
    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Key for the one-shot error message shown on the next page.
    pub const FLASH_ERROR: &str = "flash_error";
}
