//! Input checks applied by services before anything is written.

use crate::error::{Result, ServiceError};

/// Trimmed, non-empty text.
///
/// # Errors
///
/// Returns `ServiceError::Validation` if `value` is blank.
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed optional text; blank becomes `None`.
#[must_use]
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A lower-cased email address with a plausible shape.
///
/// # Errors
///
/// Returns `ServiceError::Validation` if the address is malformed.
pub fn email(value: &str) -> Result<String> {
    let email = value.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    }) && !email.contains(char::is_whitespace);

    if valid {
        Ok(email)
    } else {
        Err(ServiceError::Validation(format!(
            "invalid email address: {value}"
        )))
    }
}

/// An absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns `ServiceError::Validation` if the value is blank or not a web URL.
pub fn web_url(field: &str, value: &str) -> Result<String> {
    let url = required(field, value)?;
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ServiceError::Validation(format!(
            "{field} must be an http(s) URL"
        ))),
    }
}

/// Derive a URL slug from free text: lower-case ASCII letters and digits
/// separated by single dashes.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// A caller-supplied slug, normalized.
///
/// # Errors
///
/// Returns `ServiceError::Validation` if nothing usable remains.
pub fn slug(value: &str) -> Result<String> {
    let slug = slugify(value);
    if slug.is_empty() {
        return Err(ServiceError::Validation(format!("invalid slug: {value:?}")));
    }
    Ok(slug)
}

/// A rating within `0.0..=5.0`.
///
/// # Errors
///
/// Returns `ServiceError::Validation` for out-of-range or non-finite values.
pub fn rating(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=5.0).contains(&value) {
        Ok(value)
    } else {
        Err(ServiceError::Validation(format!(
            "rating must be between 0 and 5, got {value}"
        )))
    }
}
