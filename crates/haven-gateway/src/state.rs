//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use haven_auth::JwtValidator;
use haven_service::Services;
use haven_store::Store;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the HTTP handlers.
pub struct GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    /// Every business service, wired over one store.
    pub services: Services<S>,
    /// The JWT validator for authentication.
    pub jwt_validator: Arc<V>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<S, V> GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(services: Services<S>, jwt_validator: Arc<V>, config: GatewayConfig) -> Self {
        Self {
            services,
            jwt_validator,
            config,
        }
    }
}

impl<S, V> Clone for GatewayState<S, V>
where
    S: Store,
    V: JwtValidator,
{
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            jwt_validator: Arc::clone(&self.jwt_validator),
            config: self.config.clone(),
        }
    }
}
