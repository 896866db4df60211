//! Haven Gateway - HTTP API for the counseling platform
//!
//! This is the main entry point for the gateway service. It opens the
//! RocksDB store, wires every service with its collaborators and serves
//! the REST API.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock JWT validator that accepts
//! tokens in the format `test-token:<user-uuid>:<role>`.
//!
//! # Collaborators
//!
//! - `EMAIL_RELAY_URL` enables booking emails; without it they are dropped.
//! - `S3_BUCKET` (with `S3_PUBLIC_BASE_URL`) enables uploads; without it
//!   uploads are accepted but not stored.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(feature = "dev-mode"))]
use haven_auth::{AuthConfig, HmacValidator};
#[cfg(feature = "dev-mode")]
use haven_auth::MockJwtValidator;
use haven_gateway::{create_router, GatewayConfig, GatewayState};
use haven_service::{
    schemas, HttpNotifier, NoopNotifier, NoopObjectStorage, Notifier, ObjectStorage,
    S3ObjectStorage, ServiceConfig, Services,
};
use haven_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,haven=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Haven Gateway");

    // Load configuration from environment
    let gateway_config = GatewayConfig::from_env();
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/haven".into());
    let email_relay_url = std::env::var("EMAIL_RELAY_URL").ok();
    let email_from =
        std::env::var("EMAIL_FROM").unwrap_or_else(|_| "Haven <no-reply@haven.local>".into());
    let s3_bucket = std::env::var("S3_BUCKET").ok();

    let mut service_config = ServiceConfig::default();
    if let Some(hours) = std::env::var("REMINDER_WINDOW_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        service_config.reminder_window_hours = hours;
    }

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %data_dir,
        email_relay_url = ?email_relay_url,
        s3_bucket = ?s3_bucket,
        internal_routes = gateway_config.internal_token.is_some(),
        "Gateway configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir, schemas::ALL)?);

    // Collaborators
    let notifier: Arc<dyn Notifier> = if let Some(url) = email_relay_url {
        tracing::info!(endpoint = %url, "Email relay enabled");
        Arc::new(HttpNotifier::new(url, email_from)?)
    } else {
        tracing::warn!("No EMAIL_RELAY_URL set - booking emails will be dropped");
        Arc::new(NoopNotifier)
    };

    let storage: Arc<dyn ObjectStorage> = if let Some(bucket) = s3_bucket {
        let public_base_url = std::env::var("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("https://{bucket}.s3.amazonaws.com"));
        tracing::info!(bucket = %bucket, public_base_url = %public_base_url, "S3 storage enabled");
        Arc::new(S3ObjectStorage::from_env(bucket, public_base_url).await)
    } else {
        tracing::warn!("No S3_BUCKET set - uploads will not be stored");
        Arc::new(NoopObjectStorage)
    };

    let services = Services::new(store, notifier, storage, service_config);

    // Initialize JWT validator
    #[cfg(feature = "dev-mode")]
    let jwt_validator = {
        tracing::warn!("DEV MODE ENABLED - using mock JWT validator");
        tracing::warn!("Use tokens in format: test-token:<user-uuid>:<role>");
        Arc::new(MockJwtValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let jwt_validator = {
        let secret = std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set")?;
        let mut auth_config = AuthConfig::new(secret);
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            auth_config = auth_config.with_issuer(issuer);
        }
        Arc::new(HmacValidator::new(auth_config))
    };
    tracing::info!("JWT validator initialized");

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(services, jwt_validator, gateway_config);
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
