//! One-shot flash messages.
//!
//! A message set before a redirect is shown once on the next rendered page.

use tower_sessions::Session;

use crate::models::session_keys;

/// Store an error message for the next page.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_error(
    session: &Session,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::FLASH_ERROR, message.into())
        .await
}

/// Remove and return the pending error message, if any.
pub async fn take_error(session: &Session) -> Option<String> {
    match session.remove::<String>(session_keys::FLASH_ERROR).await {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash message");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flash_is_shown_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        assert_eq!(take_error(&session).await, None);

        set_error(&session, "No account with that email found.")
            .await
            .unwrap();
        assert_eq!(
            take_error(&session).await.as_deref(),
            Some("No account with that email found.")
        );
        assert_eq!(take_error(&session).await, None);
    }
}
