// File: src/auth/validate.rs
// Purpose: Input checks for the authentication endpoints

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const MISSING_FIELDS: &str = "Missing required fields";

// Email validation regex
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Fail with `Missing required fields` when any value is absent or blank
pub fn require(values: &[Option<&str>]) -> AppResult<()> {
    let missing = values
        .iter()
        .any(|value| value.map(str::trim).map_or(true, str::is_empty));
    if missing {
        return Err(AppError::bad_request(MISSING_FIELDS));
    }
    Ok(())
}

/// Required and well-formed email, normalized to lowercase
pub fn require_email(email: Option<&str>) -> AppResult<String> {
    require(&[email])?;
    let email = email.unwrap_or_default().trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("reader@example.com"));
        assert!(is_valid_email("first.last+books@mail.example.org"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("reader@"));
    }

    #[test]
    fn test_require() {
        assert!(require(&[Some("a"), Some("b")]).is_ok());
        assert_eq!(
            require(&[Some("a"), None]).unwrap_err().to_string(),
            MISSING_FIELDS
        );
        assert!(require(&[Some("  ")]).is_err());
    }

    #[test]
    fn test_require_email_normalizes() {
        assert_eq!(require_email(Some(" Reader@Example.COM ")).unwrap(), "reader@example.com");
        assert_eq!(require_email(None).unwrap_err().to_string(), MISSING_FIELDS);
        assert!(require_email(Some("not-an-email")).is_err());
    }
}
