//! Bearer token validation for Haven.
//!
//! Tokens are issued elsewhere; this crate only checks them and turns them
//! into the `(user, role)` pair every service works with.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   JwtValidator   │
//! │   (HTTP)         │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  HmacValidator   │
//!                          │  (HS256)         │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use haven_auth::{AuthConfig, HmacValidator, JwtValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = HmacValidator::new(AuthConfig::new("change-me"));
//!
//! let claims = validator.validate("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...").await?;
//! println!("{} as {}", claims.user_id, claims.role);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::fmt;

pub mod error;
pub mod jwt;

pub use error::{AuthError, Result};
pub use jwt::{HmacValidator, JwtValidator, ValidatedClaims};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;

/// Configuration for token validation.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    pub secret: String,
    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Configuration with the given secret and default settings.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            leeway_seconds: 30,
        }
    }

    /// Require tokens to carry this issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuthConfig::new("s3cret");
        assert_eq!(config.secret, "s3cret");
        assert!(config.issuer.is_none());
        assert_eq!(config.leeway_seconds, 30);
    }

    #[test]
    fn debug_hides_secret() {
        let config = AuthConfig::new("s3cret").with_issuer("haven");
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("haven"));
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::TokenExpired.http_status_code(), 401);
        assert_eq!(AuthError::InvalidSignature.http_status_code(), 401);
        assert_eq!(AuthError::UnknownRole("x".into()).http_status_code(), 401);
        assert_eq!(AuthError::Internal("test".into()).http_status_code(), 500);
    }

    #[test]
    fn auth_error_retriable() {
        assert!(AuthError::TokenExpired.is_retriable());
        assert!(!AuthError::InvalidSignature.is_retriable());
        assert!(!AuthError::InvalidUserId.is_retriable());
    }
}
