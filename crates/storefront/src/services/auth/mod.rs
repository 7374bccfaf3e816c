//! Authentication service.
//!
//! Password signup and login plus the reset-token flow.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

use bazaar_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// Number of random bytes in a reset token (hex encoded to twice as many chars).
const RESET_TOKEN_BYTES: usize = 32;

/// How long a reset token stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// A freshly issued password reset token.
#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub user: User,
    pub token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Whether an account already uses `email`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn email_taken(&self, email: &Email) -> Result<bool, AuthError> {
        Ok(self.users.get_by_email(email).await?.is_some())
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, email: &Email, password: &str) -> Result<User, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_with_password(email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or a wrong password.
    pub async fn login(&self, email: &Email, password: &str) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .get_credentials_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for the account registered under `email`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses that email.
    pub async fn request_password_reset(&self, email: &Email) -> Result<ResetRequest, AuthError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.users
            .set_reset_token(user.id, &token, expires_at)
            .await?;

        tracing::info!(user_id = %user.id, %expires_at, "Password reset token issued");
        Ok(ResetRequest { user, token })
    }

    /// Resolve the account a reset link belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` for unknown, used or expired tokens.
    pub async fn validate_reset_token(&self, token: &str) -> Result<User, AuthError> {
        if !looks_like_reset_token(token) {
            return Err(AuthError::InvalidResetToken);
        }

        self.users
            .get_by_valid_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    /// Set a new password for `user_id` using an unexpired reset token.
    ///
    /// The token is cleared in the same statement, so it cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is invalid.
    /// Returns `AuthError::InvalidResetToken` if the token does not match or has expired.
    pub async fn reset_password(
        &self,
        user_id: UserId,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        if !looks_like_reset_token(token)
            || self
                .users
                .get_by_valid_reset_token_and_id(token, user_id)
                .await?
                .is_none()
        {
            return Err(AuthError::InvalidResetToken);
        }

        let password_hash = hash_password(new_password)?;
        if !self
            .users
            .reset_password(user_id, token, &password_hash)
            .await?
        {
            return Err(AuthError::InvalidResetToken);
        }

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }
}

/// Validate password meets requirements: at least five ASCII letters or digits.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the violated rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::WeakPassword(
            "password may only contain letters and numbers".to_string(),
        ));
    }

    Ok(())
}

/// Generate a random reset token (64 hex characters).
#[must_use]
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn looks_like_reset_token(token: &str) -> bool {
    token.len() == RESET_TOKEN_BYTES * 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_rules() {
        assert!(validate_password("abc12").is_ok());
        assert!(validate_password("Secret99").is_ok());
        assert!(matches!(
            validate_password("abcd"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_password("abc 123"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("pass-word").is_err());
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(looks_like_reset_token(&token));
        assert_ne!(token, generate_reset_token());

        assert!(!looks_like_reset_token("short"));
        assert!(!looks_like_reset_token(&"z".repeat(64)));
    }
}
