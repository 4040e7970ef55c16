use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

const USERNAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref SLUG_RE: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap();
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX {
        return Err(ApiError::validation(
            "username",
            "username must be 1-150 characters",
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::validation("username", "invalid username format"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || email.chars().count() > EMAIL_MAX {
        return Err(ApiError::validation(
            "email",
            "email must be 1-254 characters",
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::validation("email", "invalid email format"));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() || slug.chars().count() > 50 || !SLUG_RE.is_match(slug) {
        return Err(ApiError::validation("slug", "invalid slug format"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_word_chars_and_punctuation() {
        for ok in ["neo", "user.name", "a@b", "plus+minus-", "under_score", "42"] {
            assert!(validate_username(ok).is_ok(), "{ok} should be valid");
        }
    }

    #[test]
    fn username_rejects_spaces_and_symbols() {
        for bad in ["", "has space", "semi;colon", "slash/", "émoji✨"] {
            assert!(validate_username(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn username_rejects_over_150_chars() {
        let long = "a".repeat(151);
        assert!(validate_username(&long).is_err());
        let max = "a".repeat(150);
        assert!(validate_username(&max).is_ok());
    }

    #[test]
    fn email_shape_check() {
        assert!(validate_email("neo@matrix.io").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@ats.io").is_err());
        assert!(validate_email("spaces in@mail.io").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn slug_check() {
        assert!(validate_slug("sci-fi").is_ok());
        assert!(validate_slug("films_2024").is_ok());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn email_rejects_over_254_chars() {
        let local = "a".repeat(250);
        assert!(validate_email(&format!("{local}@x.io")).is_err());
    }
}
