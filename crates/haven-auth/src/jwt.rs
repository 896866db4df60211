//! JWT validation and claims extraction.
//!
//! This module provides the core JWT validation logic, including signature
//! verification and claims validation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use haven_core::{Caller, Role, UserId};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Validated claims extracted from a JWT.
#[derive(Debug, Clone)]
pub struct ValidatedClaims {
    /// The user ID extracted from the `sub` claim.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

impl ValidatedClaims {
    /// The caller identity these claims describe.
    #[must_use]
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.role)
    }
}

/// Trait for validating JWTs.
#[async_trait]
pub trait JwtValidator: Send + Sync {
    /// Validate a JWT and extract claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be validated.
    async fn validate(&self, token: &str) -> Result<ValidatedClaims>;
}

/// Raw claims from a JWT before validation.
#[derive(Debug, Deserialize)]
struct RawClaims {
    /// Subject (user ID as UUID string)
    sub: String,
    /// Role name; tokens without one are plain users
    #[serde(default)]
    role: Option<String>,
    /// Expiration timestamp
    exp: u64,
}

/// HS256 JWT validator using a shared secret.
pub struct HmacValidator {
    key: DecodingKey,
    validation: Validation,
}

impl HmacValidator {
    /// Create a new validator.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl JwtValidator for HmacValidator {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        let token_data = decode::<RawClaims>(token, &self.key, &self.validation)?;

        let claims = token_data.claims;

        let user_id = UserId::from_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;

        let role = match claims.role.as_deref() {
            None => Role::User,
            Some(name) => Role::from_str(name).map_err(|_| AuthError::UnknownRole(name.to_string()))?,
        };

        // Convert expiration timestamp
        let exp_secs = i64::try_from(claims.exp).unwrap_or(i64::MAX);
        let expires_at = DateTime::from_timestamp(exp_secs, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid exp timestamp".to_string()))?;

        tracing::trace!(user_id = %user_id, role = %role, "Validated bearer token");

        Ok(ValidatedClaims {
            user_id,
            role,
            expires_at,
        })
    }
}

/// A mock JWT validator for testing.
///
/// This validator accepts any token in the format `test-token:<user_uuid>:<role>`
/// and extracts the caller from it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockJwtValidator;

#[cfg(any(test, feature = "test-utils"))]
impl MockJwtValidator {
    /// Build a token this validator accepts.
    #[must_use]
    pub fn token_for(user_id: UserId, role: Role) -> String {
        format!("test-token:{user_id}:{role}")
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl JwtValidator for MockJwtValidator {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        const FORMAT: &str = "expected test-token:<user>:<role>";

        let rest = token
            .strip_prefix("test-token:")
            .ok_or_else(|| AuthError::InvalidToken(FORMAT.to_string()))?;

        let Some((user, role)) = rest.split_once(':') else {
            return Err(AuthError::InvalidToken(FORMAT.to_string()));
        };

        let user_id = UserId::from_str(user).map_err(|_| AuthError::InvalidUserId)?;
        let role = Role::from_str(role).map_err(|_| AuthError::UnknownRole(role.to_string()))?;

        Ok(ValidatedClaims {
            user_id,
            role,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const USER: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        iss: Option<&'a str>,
        exp: i64,
    }

    fn sign(secret: &str, claims: &TestClaims<'_>) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        (Utc::now() + chrono::Duration::hours(1)).timestamp()
    }

    #[tokio::test]
    async fn hmac_validator_accepts_valid_token() {
        let validator = HmacValidator::new(AuthConfig::new("secret"));
        let token = sign(
            "secret",
            &TestClaims {
                sub: USER,
                role: Some("admin"),
                iss: None,
                exp: in_one_hour(),
            },
        );

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.user_id.to_string(), USER);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.caller().is_admin());
    }

    #[tokio::test]
    async fn missing_role_means_user() {
        let validator = HmacValidator::new(AuthConfig::new("secret"));
        let token = sign(
            "secret",
            &TestClaims {
                sub: USER,
                role: None,
                iss: None,
                exp: in_one_hour(),
            },
        );

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn hmac_validator_rejects_wrong_secret() {
        let validator = HmacValidator::new(AuthConfig::new("secret"));
        let token = sign(
            "other",
            &TestClaims {
                sub: USER,
                role: None,
                iss: None,
                exp: in_one_hour(),
            },
        );

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn hmac_validator_rejects_expired() {
        let validator = HmacValidator::new(AuthConfig::new("secret"));
        let token = sign(
            "secret",
            &TestClaims {
                sub: USER,
                role: None,
                iss: None,
                exp: (Utc::now() - chrono::Duration::hours(1)).timestamp(),
            },
        );

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn hmac_validator_checks_issuer() {
        let validator = HmacValidator::new(AuthConfig::new("secret").with_issuer("haven"));
        let token = sign(
            "secret",
            &TestClaims {
                sub: USER,
                role: None,
                iss: Some("someone-else"),
                exp: in_one_hour(),
            },
        );

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn hmac_validator_rejects_bad_subject_and_role() {
        let validator = HmacValidator::new(AuthConfig::new("secret"));

        let bad_sub = sign(
            "secret",
            &TestClaims {
                sub: "not-a-uuid",
                role: None,
                iss: None,
                exp: in_one_hour(),
            },
        );
        assert!(matches!(
            validator.validate(&bad_sub).await,
            Err(AuthError::InvalidUserId)
        ));

        let bad_role = sign(
            "secret",
            &TestClaims {
                sub: USER,
                role: Some("superuser"),
                iss: None,
                exp: in_one_hour(),
            },
        );
        assert!(matches!(
            validator.validate(&bad_role).await,
            Err(AuthError::UnknownRole(_))
        ));
    }

    #[tokio::test]
    async fn mock_validator_works() {
        let validator = MockJwtValidator;
        let token = format!("test-token:{USER}:counselor");

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.user_id.to_string(), USER);
        assert_eq!(claims.role, Role::Counselor);
    }

    #[tokio::test]
    async fn mock_validator_round_trips_token_for() {
        let user = UserId::generate();
        let token = MockJwtValidator::token_for(user, Role::Admin);
        let claims = MockJwtValidator.validate(&token).await.unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn mock_validator_rejects_invalid() {
        let validator = MockJwtValidator;

        assert!(validator.validate("invalid-token").await.is_err());
        assert!(validator
            .validate("test-token:not-a-uuid:user")
            .await
            .is_err());
        assert!(validator.validate(&format!("test-token:{USER}")).await.is_err());
    }
}
