//! Authentication extractors.
//!
//! [`AuthUser`] requires a valid `Authorization: Bearer <token>` header;
//! [`MaybeAuthUser`] lets anonymous requests through but still rejects a
//! token that is present and invalid.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;

use haven_auth::JwtValidator;
use haven_core::Caller;
use haven_store::Store;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated caller extracted from a JWT.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Caller);

/// A caller that may be anonymous.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Caller>);

impl MaybeAuthUser {
    /// The caller, if one authenticated.
    #[must_use]
    pub fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

/// The bearer token, if the header is present.
///
/// A header that is present but not a bearer token is an error, not anonymity.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| ApiError::Unauthorized)?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or(ApiError::Unauthorized)
}

async fn resolve<S, V>(parts: &Parts, state: &GatewayState<S, V>) -> Result<Option<Caller>, ApiError>
where
    S: Store,
    V: JwtValidator,
{
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };
    let claims = state.jwt_validator.validate(token).await?;
    Ok(Some(claims.caller()))
}

#[async_trait]
impl<S, V> FromRequestParts<Arc<GatewayState<S, V>>> for AuthUser
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<S, V>>,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl<S, V> FromRequestParts<Arc<GatewayState<S, V>>> for MaybeAuthUser
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<S, V>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(resolve(parts, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/bookings");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(bearer_token(&parts(None)).unwrap(), None);
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        assert_eq!(
            bearer_token(&parts(Some("Bearer abc.def"))).unwrap(),
            Some("abc.def")
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(matches!(
            bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))),
            Err(ApiError::Unauthorized)
        ));
    }
}
