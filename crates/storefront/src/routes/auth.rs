//! Authentication route handlers.
//!
//! Handles login, signup, logout and the password reset flow.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{Email, UserId};

use super::forms::{
    self, FieldErrors, LoginForm, NewPasswordForm, ResetForm, SignupForm,
};
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, clear_current_user, flash, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error_message: Option<String>,
    pub email: String,
    pub errors: FieldErrors,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub error_message: Option<String>,
    pub email: String,
    pub errors: FieldErrors,
}

/// Reset request page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset.html")]
pub struct ResetTemplate {
    pub ctx: PageContext,
    pub error_message: Option<String>,
}

/// New password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/new-password.html")]
pub struct NewPasswordTemplate {
    pub ctx: PageContext,
    pub error_message: Option<String>,
    pub user_id: UserId,
    pub password_token: String,
}

fn unprocessable(template: impl IntoResponse) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, template).into_response()
}

// =============================================================================
// Login Routes
// =============================================================================

/// `GET /login`
pub async fn login_page(session: Session, ctx: PageContext) -> LoginTemplate {
    LoginTemplate {
        ctx,
        error_message: flash::take_error(&session).await,
        email: String::new(),
        errors: FieldErrors::new(),
    }
}

/// `POST /login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let rerender = |message: &str, errors: FieldErrors| {
        unprocessable(LoginTemplate {
            ctx: ctx.clone(),
            error_message: Some(message.to_string()),
            email: form.email.clone(),
            errors,
        })
    };

    let email = match form.validate() {
        Ok(email) => email,
        Err(errors) => {
            let message = errors.first_message().unwrap_or(forms::LOGIN_EMAIL_INVALID);
            return Ok(rerender(message, errors));
        }
    };

    let user = match AuthService::new(state.pool()).login(&email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login rejected");
            return Ok(rerender(forms::INVALID_CREDENTIALS, FieldErrors::new()));
        }
        Err(e) => return Err(e.into()),
    };

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Redirect::to("/").into_response())
}

/// `POST /logout`
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    Ok(Redirect::to("/"))
}

// =============================================================================
// Signup Routes
// =============================================================================

/// `GET /signup`
pub async fn signup_page(session: Session, ctx: PageContext) -> SignupTemplate {
    SignupTemplate {
        ctx,
        error_message: flash::take_error(&session).await,
        email: String::new(),
        errors: FieldErrors::new(),
    }
}

/// `POST /signup`
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    ctx: PageContext,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let rerender = |errors: FieldErrors| {
        unprocessable(SignupTemplate {
            ctx: ctx.clone(),
            error_message: errors.first_message().map(str::to_string),
            email: form.email.clone(),
            errors,
        })
    };

    let auth = AuthService::new(state.pool());
    let email = Email::parse(&form.email).ok();
    let taken = match &email {
        Some(email) => auth.email_taken(email).await?,
        None => false,
    };

    if let Err(errors) = form.validate(email.as_ref(), taken) {
        return Ok(rerender(errors));
    }
    let Some(email) = email else {
        let mut errors = FieldErrors::new();
        errors.add("email", forms::SIGNUP_EMAIL_INVALID);
        return Ok(rerender(errors));
    };

    match auth.register(&email, form.password.trim()).await {
        Ok(_) => {}
        Err(AuthError::UserAlreadyExists) => {
            let mut errors = FieldErrors::new();
            errors.add("email", forms::SIGNUP_EMAIL_TAKEN);
            return Ok(rerender(errors));
        }
        Err(e) => return Err(e.into()),
    }

    send_signup_email(&state, email);
    Ok(Redirect::to("/login").into_response())
}

fn send_signup_email(state: &AppState, email: Email) {
    let Some(mailer) = state.email().cloned() else {
        tracing::warn!("SMTP not configured; skipping signup email");
        return;
    };
    let shop_url = state.config().absolute_url("/");

    tokio::spawn(async move {
        if let Err(e) = mailer.send_signup_confirmation(&email, &shop_url).await {
            tracing::warn!(error = %e, "Failed to send signup email");
        }
    });
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// `GET /reset`
pub async fn reset_page(session: Session, ctx: PageContext) -> ResetTemplate {
    ResetTemplate {
        ctx,
        error_message: flash::take_error(&session).await,
    }
}

/// `POST /reset`
#[instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetForm>,
) -> Result<Redirect> {
    let Ok(email) = Email::parse(&form.email) else {
        flash::set_error(&session, forms::RESET_UNKNOWN_EMAIL).await?;
        return Ok(Redirect::to("/reset"));
    };

    let request = match AuthService::new(state.pool())
        .request_password_reset(&email)
        .await
    {
        Ok(request) => request,
        Err(AuthError::UserNotFound) => {
            flash::set_error(&session, forms::RESET_UNKNOWN_EMAIL).await?;
            return Ok(Redirect::to("/reset"));
        }
        Err(e) => return Err(e.into()),
    };

    let reset_url = state
        .config()
        .absolute_url(&format!("/reset/{}", request.token));
    match state.email().cloned() {
        Some(mailer) => {
            let to = request.user.email;
            tokio::spawn(async move {
                if let Err(e) = mailer.send_password_reset(&to, &reset_url).await {
                    tracing::warn!(error = %e, "Failed to send password reset email");
                }
            });
        }
        None => tracing::warn!(
            user_id = %request.user.id,
            "SMTP not configured; password reset email not sent"
        ),
    }

    Ok(Redirect::to("/"))
}

/// `GET /reset/{token}`
#[instrument(skip_all)]
pub async fn new_password_page(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Path(token): Path<String>,
) -> Result<Response> {
    match AuthService::new(state.pool()).validate_reset_token(&token).await {
        Ok(user) => Ok(NewPasswordTemplate {
            ctx,
            error_message: flash::take_error(&session).await,
            user_id: user.id,
            password_token: token,
        }
        .into_response()),
        Err(AuthError::InvalidResetToken) => {
            flash::set_error(&session, forms::RESET_LINK_INVALID).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /new-password`
#[instrument(skip_all)]
pub async fn new_password(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response> {
    let Ok(user_id) = form.user_id.parse::<UserId>() else {
        flash::set_error(&session, forms::RESET_LINK_INVALID).await?;
        return Ok(Redirect::to("/reset").into_response());
    };

    match AuthService::new(state.pool())
        .reset_password(user_id, &form.password_token, &form.password)
        .await
    {
        Ok(()) => Ok(Redirect::to("/login").into_response()),
        Err(AuthError::WeakPassword(_)) => Ok(unprocessable(NewPasswordTemplate {
            ctx,
            error_message: Some(forms::SIGNUP_PASSWORD_INVALID.to_string()),
            user_id,
            password_token: form.password_token,
        })),
        Err(AuthError::InvalidResetToken) => {
            flash::set_error(&session, forms::RESET_LINK_INVALID).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_template_marks_invalid_fields() {
        let mut errors = FieldErrors::new();
        errors.add("password", forms::LOGIN_PASSWORD_INVALID);

        let html = LoginTemplate {
            ctx: PageContext::anonymous(),
            error_message: Some(forms::LOGIN_PASSWORD_INVALID.to_string()),
            email: "buyer@bazaar.test".to_string(),
            errors,
        }
        .render()
        .unwrap();

        assert!(html.contains("Password has to be valid."));
        assert!(html.contains(r#"value="buyer@bazaar.test""#));
        assert!(html.contains(r#"class="invalid""#));
    }

    #[test]
    fn test_new_password_template_carries_token() {
        let html = NewPasswordTemplate {
            ctx: PageContext::anonymous(),
            error_message: None,
            user_id: UserId::new(3),
            password_token: "ab12".to_string(),
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"name="userId" value="3""#));
        assert!(html.contains(r#"name="passwordToken" value="ab12""#));
    }
}
