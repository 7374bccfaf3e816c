//! Per-request data every rendered page needs.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::auth::current_user;
use super::csrf::csrf_token;
use crate::error::AppError;
use crate::models::CurrentUser;

/// Navigation and form state shared by all page templates.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    pub csrf_token: String,
}

impl PageContext {
    /// Context for pages rendered without a session, like error pages.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let csrf_token = csrf_token(session)
            .await
            .map_err(|e| AppError::Internal(format!("csrf token: {e}")))?;

        Ok(Self {
            current_user: current_user(session).await,
            csrf_token,
        })
    }
}
