use std::sync::LazyLock;

use regex::Regex;

use postbox_types::api::{LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::storage::PhotoUpload;

/// 5 MB upload limit for photos
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_PHOTO_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

/// Trimmed text fields of a contact-form entry.
#[derive(Debug)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub fn validate_registration(req: RegisterRequest) -> Result<Registration, ApiError> {
    let username = required(req.username, "Username is required")?;
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::bad_request("Username must be at least 3 characters"));
    }

    let email = required(req.email, "Email is required")?;
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }

    // Passwords are taken verbatim, whitespace included.
    let password = req
        .password
        .ok_or_else(|| ApiError::bad_request("Password is required"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let full_name = req
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    Ok(Registration {
        username,
        email: email.to_lowercase(),
        password,
        full_name,
    })
}

pub fn validate_login(req: LoginRequest) -> Result<Credentials, ApiError> {
    let identifier = required(req.username_or_email, "Username or email is required")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Password is required"))?;

    Ok(Credentials {
        identifier,
        password,
    })
}

pub fn validate_contact(
    name: Option<String>,
    email: Option<String>,
    message: Option<String>,
) -> Result<ContactFields, ApiError> {
    let name = required(name, "Name is required")?;
    let email = required(email, "Email is required")?;
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    let message = required(message, "Message is required")?;

    Ok(ContactFields {
        name,
        email,
        message,
    })
}

pub fn validate_photo(photo: &PhotoUpload) -> Result<(), ApiError> {
    if photo.data.len() > MAX_PHOTO_BYTES {
        return Err(ApiError::bad_request("Photo must be smaller than 5MB"));
    }

    let content_type = photo.content_type.as_deref().unwrap_or_default();
    if !ALLOWED_PHOTO_TYPES.contains(&content_type) {
        return Err(ApiError::bad_request("Photo must be JPEG, PNG, or WebP format"));
    }

    Ok(())
}

/// Present and non-blank, returned trimmed.
fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn registration(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            full_name: Some("  ".into()),
        }
    }

    fn error_message(result: Result<impl Sized, ApiError>) -> String {
        match result {
            Ok(_) => panic!("expected validation error"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@b.de"));
        assert!(!is_valid_email("a@@b.de"));
    }

    #[test]
    fn registration_normalizes_fields() {
        let reg = validate_registration(registration("  ann ", " Ann@Example.COM ", "hunter22")).unwrap();
        assert_eq!(reg.username, "ann");
        assert_eq!(reg.email, "ann@example.com");
        assert_eq!(reg.full_name, None);
    }

    #[test]
    fn registration_rejects_short_values() {
        assert_eq!(
            error_message(validate_registration(registration("an", "a@b.co", "hunter22"))),
            "Username must be at least 3 characters"
        );
        assert_eq!(
            error_message(validate_registration(registration("ann", "a@b.co", "short"))),
            "Password must be at least 8 characters"
        );
        assert_eq!(
            error_message(validate_registration(registration("ann", "nope", "hunter22"))),
            "Invalid email format"
        );
    }

    #[test]
    fn username_padding_does_not_count_toward_length() {
        assert_eq!(
            error_message(validate_registration(registration("  ab", "a@b.co", "hunter22"))),
            "Username must be at least 3 characters"
        );
    }

    #[test]
    fn contact_requires_every_field() {
        assert_eq!(
            error_message(validate_contact(None, Some("a@b.co".into()), Some("hi".into()))),
            "Name is required"
        );
        assert_eq!(
            error_message(validate_contact(Some("Ann".into()), Some("a@b.co".into()), Some(" ".into()))),
            "Message is required"
        );
        let fields =
            validate_contact(Some(" Ann ".into()), Some("a@b.co".into()), Some(" hi ".into())).unwrap();
        assert_eq!(fields.name, "Ann");
        assert_eq!(fields.message, "hi");
    }

    #[test]
    fn photo_limits() {
        let ok = PhotoUpload {
            file_name: Some("cat.png".into()),
            content_type: Some("image/png".into()),
            data: Bytes::from(vec![0u8; MAX_PHOTO_BYTES]),
        };
        assert!(validate_photo(&ok).is_ok());

        let too_big = PhotoUpload {
            data: Bytes::from(vec![0u8; MAX_PHOTO_BYTES + 1]),
            ..ok.clone()
        };
        assert_eq!(error_message(validate_photo(&too_big)), "Photo must be smaller than 5MB");

        let gif = PhotoUpload {
            content_type: Some("image/gif".into()),
            ..ok
        };
        assert_eq!(
            error_message(validate_photo(&gif)),
            "Photo must be JPEG, PNG, or WebP format"
        );
    }
}
