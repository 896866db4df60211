//! HTTP gateway for the Haven counseling platform.
//!
//! This crate provides the public-facing REST API. It handles:
//!
//! - Bearer token authentication
//! - REST endpoints for bookings, leads, content, media and users
//! - Translating service errors into a uniform JSON error envelope
//! - Request tracing, CORS, body limits and timeouts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       haven-gateway                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │    Error            │    │
//! │  │  Extractor  │ │  + Handlers │ │    Envelope         │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Services │   │  Auth    │   │  Store   │
//!        │          │   │ (JWT)    │   │ (RocksDB)│
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use haven_auth::{AuthConfig, HmacValidator};
//! use haven_gateway::{create_router, GatewayConfig, GatewayState};
//! use haven_service::{schemas, NoopNotifier, NoopObjectStorage, ServiceConfig, Services};
//! use haven_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/haven", schemas::ALL)?);
//! let services = Services::new(
//!     store,
//!     Arc::new(NoopNotifier),
//!     Arc::new(NoopObjectStorage),
//!     ServiceConfig::default(),
//! );
//! let jwt_validator = Arc::new(HmacValidator::new(AuthConfig::new("change-me")));
//!
//! let state = GatewayState::new(services, jwt_validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::{AuthUser, MaybeAuthUser};
