//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! bazaar user create -e seller@example.com -p 'hunter22'
//! ```

use bazaar_core::Email;
use bazaar_storefront::services::auth::AuthService;

use super::{CommandError, connect};

/// Create a user with a password, applying the signup password rules.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `CommandError::InvalidEmail` for a malformed address and
/// `CommandError::User` if the password is too weak or the email is taken.
pub async fn create(email: &str, password: &str) -> Result<i32, CommandError> {
    let email = Email::parse(email).map_err(|_| CommandError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    tracing::info!("Creating user: {}", email);
    let user = AuthService::new(&pool).register(&email, password).await?;

    tracing::info!("Created user {} with ID {}", user.email, user.id);
    Ok(user.id.as_i32())
}
