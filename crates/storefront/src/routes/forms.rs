//! Form payloads and their validation rules.
//!
//! Validators are pure: they collect every failing field in submission
//! order so the page can highlight all of them and show the first message.

use rust_decimal::Decimal;
use serde::Deserialize;

use bazaar_core::{Email, Price};

use crate::services::auth::validate_password;

// =============================================================================
// Messages
// =============================================================================

pub const LOGIN_EMAIL_INVALID: &str = "Please enter a valid email address.";
pub const LOGIN_PASSWORD_INVALID: &str = "Password has to be valid.";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const SIGNUP_EMAIL_INVALID: &str = "Please enter a valid email.";
pub const SIGNUP_EMAIL_TAKEN: &str = "E-Mail exists already, please pick a different one.";
pub const SIGNUP_PASSWORD_INVALID: &str =
    "Please enter a password with only numbers and text and at least 5 characters.";
pub const SIGNUP_PASSWORDS_DIFFER: &str = "Passwords have to match!";
pub const RESET_UNKNOWN_EMAIL: &str = "No account with that email found.";
pub const RESET_LINK_INVALID: &str = "Password reset link is invalid or has expired.";
pub const PRODUCT_IMAGE_INVALID: &str = "Attached file is not an image.";
pub const PRODUCT_TITLE_INVALID: &str = "Title must be at least 3 characters long.";
pub const PRODUCT_PRICE_INVALID: &str = "Please enter a valid price.";
pub const PRODUCT_DESCRIPTION_INVALID: &str = "Description must be between 5 and 400 characters.";
pub const CHECKOUT_CART_CHANGED: &str =
    "Your cart changed during payment. No order was placed, please contact us about your payment.";

const MIN_TITLE_CHARS: usize = 3;
const MIN_DESCRIPTION_CHARS: usize = 5;
const MAX_DESCRIPTION_CHARS: usize = 400;

// =============================================================================
// Field Errors
// =============================================================================

/// Failed fields with their messages, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(&'static str, &'static str)>,
}

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.errors.push((field, message));
    }

    /// Whether `field` failed validation; used by templates to mark inputs.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|(f, _)| *f == field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The message shown above the form.
    #[must_use]
    pub fn first_message(&self) -> Option<&'static str> {
        self.errors.first().map(|(_, m)| *m)
    }
}

// =============================================================================
// Auth Forms
// =============================================================================

/// Login form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    /// Check the email format and password shape.
    ///
    /// # Errors
    ///
    /// Returns the failed fields.
    pub fn validate(&self) -> Result<Email, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = Email::parse(&self.email).ok();
        if email.is_none() {
            errors.add("email", LOGIN_EMAIL_INVALID);
        }
        if validate_password(&self.password).is_err() {
            errors.add("password", LOGIN_PASSWORD_INVALID);
        }

        match email {
            Some(email) if errors.is_empty() => Ok(email),
            _ => Err(errors),
        }
    }
}

/// Signup form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "confirmPassword", default)]
    pub confirm_password: String,
}

impl SignupForm {
    /// Check every field. `email_taken` reports whether the parsed email is
    /// already registered and is only consulted for well-formed addresses.
    ///
    /// # Errors
    ///
    /// Returns the failed fields.
    pub fn validate(&self, email: Option<&Email>, email_taken: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        match email {
            None => errors.add("email", SIGNUP_EMAIL_INVALID),
            Some(_) if email_taken => errors.add("email", SIGNUP_EMAIL_TAKEN),
            Some(_) => {}
        }
        if validate_password(self.password.trim()).is_err() {
            errors.add("password", SIGNUP_PASSWORD_INVALID);
        }
        if self.confirm_password.trim() != self.password.trim() {
            errors.add("confirmPassword", SIGNUP_PASSWORDS_DIFFER);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Reset request form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub email: String,
}

/// New-password form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "passwordToken", default)]
    pub password_token: String,
}

// =============================================================================
// Cart Forms
// =============================================================================

/// Add-to-cart and remove-from-cart form data.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductIdForm {
    #[serde(rename = "productId")]
    pub product_id: String,
}

// =============================================================================
// Product Form
// =============================================================================

/// Text fields of the add/edit product form, as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub title: String,
    pub price: String,
    pub description: String,
    pub product_id: Option<String>,
}

/// Validated product fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub title: String,
    pub price: Decimal,
    pub description: String,
}

impl ProductForm {
    /// Check title, price and description.
    ///
    /// # Errors
    ///
    /// Returns the failed fields.
    pub fn validate(&self) -> Result<ValidProduct, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.chars().count() < MIN_TITLE_CHARS {
            errors.add("title", PRODUCT_TITLE_INVALID);
        }

        let price = Price::parse_amount(&self.price).ok();
        if price.is_none() {
            errors.add("price", PRODUCT_PRICE_INVALID);
        }

        let description = self.description.trim();
        let description_len = description.chars().count();
        if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&description_len) {
            errors.add("description", PRODUCT_DESCRIPTION_INVALID);
        }

        match price {
            Some(price) if errors.is_empty() => Ok(ValidProduct {
                title: title.to_string(),
                price,
                description: description.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_validation_messages() {
        let form = LoginForm {
            email: "not-an-email".to_string(),
            password: "abc".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("email"));
        assert!(errors.has("password"));
        assert_eq!(errors.first_message(), Some(LOGIN_EMAIL_INVALID));

        let form = LoginForm {
            email: " Buyer@Bazaar.TEST ".to_string(),
            password: "hunter22".to_string(),
        };
        assert_eq!(form.validate().unwrap().as_str(), "buyer@bazaar.test");
    }

    #[test]
    fn test_signup_validation_order() {
        let form = SignupForm {
            email: "taken@bazaar.test".to_string(),
            password: "abc12".to_string(),
            confirm_password: "abc13".to_string(),
        };
        let email = Email::parse(&form.email).unwrap();

        let errors = form.validate(Some(&email), true).unwrap_err();
        assert_eq!(errors.first_message(), Some(SIGNUP_EMAIL_TAKEN));
        assert!(errors.has("confirmPassword"));
        assert!(!errors.has("password"));

        let errors = form.validate(Some(&email), false).unwrap_err();
        assert_eq!(errors.first_message(), Some(SIGNUP_PASSWORDS_DIFFER));
    }

    #[test]
    fn test_signup_rejects_symbols_in_password() {
        let form = SignupForm {
            email: "new@bazaar.test".to_string(),
            password: "pass word!".to_string(),
            confirm_password: "pass word!".to_string(),
        };
        let email = Email::parse(&form.email).unwrap();
        let errors = form.validate(Some(&email), false).unwrap_err();
        assert_eq!(errors.first_message(), Some(SIGNUP_PASSWORD_INVALID));

        let errors = form.validate(None, false).unwrap_err();
        assert_eq!(errors.first_message(), Some(SIGNUP_EMAIL_INVALID));
    }

    #[test]
    fn test_product_validation() {
        let form = ProductForm {
            title: "  Mug  ".to_string(),
            price: "12.5".to_string(),
            description: " A sturdy mug ".to_string(),
            product_id: None,
        };
        let valid = form.validate().unwrap();
        assert_eq!(valid.title, "Mug");
        assert_eq!(valid.price, Decimal::new(1250, 2));
        assert_eq!(valid.description, "A sturdy mug");
    }

    #[test]
    fn test_product_validation_failures() {
        let form = ProductForm {
            title: "ab".to_string(),
            price: "twelve".to_string(),
            description: "x".repeat(401),
            product_id: None,
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("price"));
        assert!(errors.has("description"));
        assert_eq!(errors.first_message(), Some(PRODUCT_TITLE_INVALID));

        let negative = ProductForm {
            title: "Mug".to_string(),
            price: "-1".to_string(),
            description: "A sturdy mug".to_string(),
            product_id: None,
        };
        assert_eq!(
            negative.validate().unwrap_err().first_message(),
            Some(PRODUCT_PRICE_INVALID)
        );
    }

    #[test]
    fn test_product_price_beyond_storable_range() {
        let form = ProductForm {
            title: "Yacht".to_string(),
            price: "99999999999".to_string(),
            description: "Rather expensive".to_string(),
            product_id: None,
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("price"));
        assert_eq!(errors.first_message(), Some(PRODUCT_PRICE_INVALID));
    }
}
