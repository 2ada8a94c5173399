//! Input validation for lead and agent fields.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Phone number with no digits or unexpected characters.
    InvalidPhone(String),
    /// Language code that is not two or three ASCII letters.
    InvalidLanguage(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::InvalidPhone(msg) => write!(f, "Invalid phone number: {}", msg),
            ValidationError::InvalidLanguage(code) => write!(f, "Invalid language code: {}", code),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum allowed length for names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum allowed length for phone numbers, prefix excluded.
pub const MAX_PHONE_LENGTH: usize = 32;

/// Maximum allowed length for a free-text lead message.
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// Validate an email address (basic RFC 5322 format check).
///
/// This is a basic validation that checks:
/// - Contains exactly one @
/// - Has at least one character before @
/// - Has at least one dot after @, not at either end
/// - Is not too long
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail(
            "must contain an @ symbol".to_string(),
        ));
    };

    if domain.contains('@') {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    }

    if local.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing local part (before @)".to_string(),
        ));
    }

    if !domain.contains('.') {
        return Err(ValidationError::InvalidEmail(
            "domain must contain at least one dot".to_string(),
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(ValidationError::InvalidEmail(
            "malformed domain".to_string(),
        ));
    }

    Ok(())
}

/// Validate a required free-text field such as a first name.
pub fn validate_required(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual: len,
        });
    }

    Ok(())
}

/// Validate a phone number. Digits plus spaces, dashes, dots and parentheses.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    validate_required("phone", phone, MAX_PHONE_LENGTH)?;

    let phone = phone.trim();
    if let Some(c) = phone
        .chars()
        .find(|c| !(c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')' | '+')))
    {
        return Err(ValidationError::InvalidPhone(format!(
            "unexpected character '{}'",
            c
        )));
    }

    if !phone.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone("no digits".to_string()));
    }

    Ok(())
}

/// Validate a language code (`en`, `fr`, `fil`).
pub fn validate_language_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(ValidationError::InvalidLanguage(code.to_string()));
    }
    Ok(())
}
