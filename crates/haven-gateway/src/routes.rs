//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use haven_auth::JwtValidator;
use haven_store::Store;

use crate::handlers::{
    blogs, bookings, categories, counselors, health, internal, leads, media, testimonials, uploads,
    users,
};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /v1/bookings` - Book a session (token optional)
/// - `GET /v1/bookings/availability` - Check a slot
/// - `POST /v1/leads` - Contact form
/// - `GET` on blogs, testimonials, counselors, categories and media
///
/// ## Bookings (authenticated)
/// - `GET /v1/bookings` - List all (admin)
/// - `GET /v1/bookings/me` - Caller's bookings
/// - `GET|PATCH|DELETE /v1/bookings/:id`
/// - `POST /v1/bookings/:id/confirm|cancel|complete|no-show`
///
/// ## Leads (admin, activities staff)
/// - `GET /v1/leads`, `GET /v1/leads/stats`
/// - `GET|PATCH|DELETE /v1/leads/:id`
/// - `POST|DELETE /v1/leads/:id/contacted`
/// - `GET|POST /v1/leads/:id/activities`
/// - `PATCH|DELETE /v1/lead-activities/:id`
///
/// ## Content (authenticated writes)
/// - `/v1/blogs`, `/v1/blogs/slug/:slug`, `/v1/blogs/:id`, `/v1/blogs/:id/publish|unpublish`
/// - `/v1/testimonials`, `/v1/testimonials/:id`, `/v1/testimonials/:id/publish|unpublish|feature`
/// - `/v1/counselors`, `/v1/counselors/:id`, `/v1/counselors/:id/activate|deactivate`
/// - `/v1/categories`, `/v1/categories/:id`
/// - `/v1/media/:collection`, `/v1/media/:collection/:id`, `/v1/media/:collection/:id/publish|unpublish`
/// - `PUT /v1/media/:collection/reorder`
///
/// ## Users
/// - `GET|POST|PATCH /v1/users/me`
/// - `GET /v1/users`, `GET|PATCH|DELETE /v1/users/:id` (admin or self)
///
/// ## Uploads (staff)
/// - `POST /v1/uploads/:folder`
///
/// ## Internal (shared token)
/// - `GET /internal/health`
/// - `POST /internal/reminders/run`
pub fn create_router<S, V>(state: GatewayState<S, V>) -> Router
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Internal
        .route("/internal/health", get(internal::internal_health))
        .route(
            "/internal/reminders/run",
            post(internal::run_reminders::<S, V>),
        )
        // Bookings
        .route(
            "/v1/bookings",
            get(bookings::list_bookings::<S, V>).post(bookings::create_booking::<S, V>),
        )
        .route("/v1/bookings/me", get(bookings::my_bookings::<S, V>))
        .route(
            "/v1/bookings/availability",
            get(bookings::check_availability::<S, V>),
        )
        .route(
            "/v1/bookings/:id",
            get(bookings::get_booking::<S, V>)
                .patch(bookings::update_booking::<S, V>)
                .delete(bookings::delete_booking::<S, V>),
        )
        .route(
            "/v1/bookings/:id/confirm",
            post(bookings::confirm_booking::<S, V>),
        )
        .route(
            "/v1/bookings/:id/cancel",
            post(bookings::cancel_booking::<S, V>),
        )
        .route(
            "/v1/bookings/:id/complete",
            post(bookings::complete_booking::<S, V>),
        )
        .route(
            "/v1/bookings/:id/no-show",
            post(bookings::no_show_booking::<S, V>),
        )
        // Leads
        .route(
            "/v1/leads",
            get(leads::list_leads::<S, V>).post(leads::create_lead::<S, V>),
        )
        .route("/v1/leads/stats", get(leads::lead_stats::<S, V>))
        .route(
            "/v1/leads/:id",
            get(leads::get_lead::<S, V>)
                .patch(leads::update_lead::<S, V>)
                .delete(leads::delete_lead::<S, V>),
        )
        .route(
            "/v1/leads/:id/contacted",
            post(leads::mark_contacted::<S, V>).delete(leads::mark_not_contacted::<S, V>),
        )
        .route(
            "/v1/leads/:id/activities",
            get(leads::list_activities::<S, V>).post(leads::add_activity::<S, V>),
        )
        .route(
            "/v1/lead-activities/:id",
            patch(leads::update_activity::<S, V>).delete(leads::delete_activity::<S, V>),
        )
        // Blogs
        .route(
            "/v1/blogs",
            get(blogs::list_blogs::<S, V>).post(blogs::create_blog::<S, V>),
        )
        .route("/v1/blogs/slug/:slug", get(blogs::get_blog_by_slug::<S, V>))
        .route(
            "/v1/blogs/:id",
            get(blogs::get_blog::<S, V>)
                .patch(blogs::update_blog::<S, V>)
                .delete(blogs::delete_blog::<S, V>),
        )
        .route("/v1/blogs/:id/publish", post(blogs::publish_blog::<S, V>))
        .route(
            "/v1/blogs/:id/unpublish",
            post(blogs::unpublish_blog::<S, V>),
        )
        // Testimonials
        .route(
            "/v1/testimonials",
            get(testimonials::list_testimonials::<S, V>)
                .post(testimonials::create_testimonial::<S, V>),
        )
        .route(
            "/v1/testimonials/featured/reconcile",
            post(testimonials::reconcile_featured::<S, V>),
        )
        .route(
            "/v1/testimonials/:id",
            get(testimonials::get_testimonial::<S, V>)
                .patch(testimonials::update_testimonial::<S, V>)
                .delete(testimonials::delete_testimonial::<S, V>),
        )
        .route(
            "/v1/testimonials/:id/publish",
            post(testimonials::publish_testimonial::<S, V>),
        )
        .route(
            "/v1/testimonials/:id/unpublish",
            post(testimonials::unpublish_testimonial::<S, V>),
        )
        .route(
            "/v1/testimonials/:id/feature",
            post(testimonials::feature_testimonial::<S, V>)
                .delete(testimonials::unfeature_testimonial::<S, V>),
        )
        // Counselors
        .route(
            "/v1/counselors",
            get(counselors::list_counselors::<S, V>).post(counselors::create_counselor::<S, V>),
        )
        .route(
            "/v1/counselors/:id",
            get(counselors::get_counselor::<S, V>)
                .patch(counselors::update_counselor::<S, V>)
                .delete(counselors::delete_counselor::<S, V>),
        )
        .route(
            "/v1/counselors/:id/activate",
            post(counselors::activate_counselor::<S, V>),
        )
        .route(
            "/v1/counselors/:id/deactivate",
            post(counselors::deactivate_counselor::<S, V>),
        )
        // Categories
        .route(
            "/v1/categories",
            get(categories::list_categories::<S, V>).post(categories::create_category::<S, V>),
        )
        .route(
            "/v1/categories/:id",
            get(categories::get_category::<S, V>)
                .patch(categories::update_category::<S, V>)
                .delete(categories::delete_category::<S, V>),
        )
        // Users
        .route("/v1/users", get(users::list_users::<S, V>))
        .route(
            "/v1/users/me",
            get(users::get_me::<S, V>)
                .post(users::register_profile::<S, V>)
                .patch(users::update_me::<S, V>),
        )
        .route(
            "/v1/users/:id",
            get(users::get_user::<S, V>)
                .patch(users::update_user::<S, V>)
                .delete(users::deactivate_user::<S, V>),
        )
        // Media collections
        .route(
            "/v1/media/:collection",
            get(media::list_items::<S, V>).post(media::create_item::<S, V>),
        )
        .route(
            "/v1/media/:collection/reorder",
            put(media::reorder_items::<S, V>),
        )
        .route(
            "/v1/media/:collection/published/reconcile",
            post(media::reconcile_published::<S, V>),
        )
        .route(
            "/v1/media/:collection/:id",
            get(media::get_item::<S, V>)
                .patch(media::update_item::<S, V>)
                .delete(media::delete_item::<S, V>),
        )
        .route(
            "/v1/media/:collection/:id/publish",
            post(media::publish_item::<S, V>),
        )
        .route(
            "/v1/media/:collection/:id/unpublish",
            post(media::unpublish_item::<S, V>),
        )
        // Uploads
        .route("/v1/uploads/:folder", post(uploads::upload::<S, V>))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Body size is governed by the tower-http limit alone
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    request_timeout_seconds,
                ))),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum::body::Bytes;
    use axum_test::{TestRequest, TestServer};
    use chrono::{Duration as ChronoDuration, Utc};
    use haven_auth::MockJwtValidator;
    use haven_core::{Role, UserId};
    use haven_service::{
        schemas, RecordingNotifier, RecordingObjectStorage, ServiceConfig, Services,
    };
    use haven_store::RocksStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use crate::config::GatewayConfig;
    use crate::handlers::internal::INTERNAL_TOKEN_HEADER;

    struct Harness {
        server: TestServer,
        notifier: Arc<RecordingNotifier>,
        admin: String,
        _dir: TempDir,
    }

    fn token(role: Role) -> String {
        MockJwtValidator::token_for(UserId::generate(), role)
    }

    fn bearer(request: TestRequest, token: &str) -> TestRequest {
        request.add_header(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path(), schemas::ALL).unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services::new(
            store,
            notifier.clone(),
            Arc::new(RecordingObjectStorage::default()),
            ServiceConfig::default(),
        );
        let config = GatewayConfig {
            internal_token: Some("s3cret".into()),
            ..GatewayConfig::default()
        };
        let state = GatewayState::new(services, Arc::new(MockJwtValidator), config);
        let server = TestServer::new(create_router(state)).unwrap();

        Harness {
            server,
            notifier,
            admin: token(Role::Admin),
            _dir: dir,
        }
    }

    fn days_ahead(days: i64) -> String {
        (Utc::now() + ChronoDuration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    async fn counselor(h: &Harness) -> String {
        let response = bearer(h.server.post("/v1/counselors"), &h.admin)
            .json(&json!({
                "name": "Dr. Rivera",
                "email": "rivera@example.com",
                "specialization": "Career",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn cors_any_origin() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://app.example.com".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let response = h.server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let h = harness();

        let response = h.server.get("/v1/bookings").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");

        let response = bearer(h.server.get("/v1/bookings"), "garbage").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = bearer(h.server.get("/v1/bookings"), &token(Role::User)).await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"]["code"], "forbidden");
    }

    #[tokio::test]
    async fn invalid_token_on_public_route_is_rejected() {
        let h = harness();
        let response = bearer(h.server.get("/v1/blogs"), "not-a-token").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        h.server.get("/v1/blogs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn booking_lifecycle_over_http() {
        let h = harness();
        let counselor_id = counselor(&h).await;
        let date = days_ahead(3);

        let request = json!({
            "counselorId": counselor_id,
            "guestName": "Ana",
            "guestEmail": "Ana@Example.com",
            "bookingDate": date,
            "bookingTime": "14:00",
        });

        let created = h.server.post("/v1/bookings").json(&request).await;
        created.assert_status(StatusCode::CREATED);
        let booking = created.json::<Value>();
        assert_eq!(booking["status"], "pending");
        assert_eq!(booking["guestEmail"], "ana@example.com");
        let id = booking["id"].as_str().unwrap().to_string();

        // Same slot again
        let clash = h.server.post("/v1/bookings").json(&request).await;
        clash.assert_status(StatusCode::CONFLICT);
        assert_eq!(clash.json::<Value>()["error"]["code"], "conflict");

        let availability = h
            .server
            .get("/v1/bookings/availability")
            .add_query_param("counselorId", &counselor_id)
            .add_query_param("bookingDate", &date)
            .add_query_param("bookingTime", "14:00")
            .await;
        availability.assert_status_ok();
        assert_eq!(availability.json::<Value>()["available"], false);

        let confirmed = bearer(h.server.post(&format!("/v1/bookings/{id}/confirm")), &h.admin)
            .json(&json!({"meetingLink": "https://meet.example.com/abc"}))
            .await;
        confirmed.assert_status_ok();
        assert_eq!(confirmed.json::<Value>()["status"], "confirmed");

        let completed = bearer(h.server.post(&format!("/v1/bookings/{id}/complete")), &h.admin).await;
        completed.assert_status_ok();
        assert_eq!(completed.json::<Value>()["status"], "completed");

        let again = bearer(h.server.post(&format!("/v1/bookings/{id}/cancel")), &h.admin).await;
        again.assert_status(StatusCode::CONFLICT);

        let listed = bearer(h.server.get("/v1/bookings"), &h.admin)
            .add_query_param("status", "completed")
            .await;
        listed.assert_status_ok();
        let page = listed.json::<Value>();
        assert_eq!(page["total"], 1);
        assert_eq!(page["page"], 1);
    }

    #[tokio::test]
    async fn booking_validation_errors_are_bad_requests() {
        let h = harness();
        let counselor_id = counselor(&h).await;

        let response = h
            .server
            .post("/v1/bookings")
            .json(&json!({
                "counselorId": counselor_id,
                "guestName": "Ana",
                "guestEmail": "not-an-email",
                "bookingDate": days_ahead(2),
                "bookingTime": "10:00",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let malformed = h
            .server
            .post("/v1/bookings")
            .json(&json!({"guestName": "missing everything else"}))
            .await;
        malformed.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(malformed.json::<Value>()["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn my_bookings_only_show_the_callers() {
        let h = harness();
        let counselor_id = counselor(&h).await;
        let user = token(Role::User);

        for (who, time) in [(Some(&user), "09:00"), (None, "10:00")] {
            let mut request = h.server.post("/v1/bookings").json(&json!({
                "counselorId": counselor_id,
                "guestName": "Guest",
                "guestEmail": "guest@example.com",
                "bookingDate": days_ahead(5),
                "bookingTime": time,
            }));
            if let Some(t) = who {
                request = bearer(request, t);
            }
            request.await.assert_status(StatusCode::CREATED);
        }

        let mine = bearer(h.server.get("/v1/bookings/me"), &user).await;
        mine.assert_status_ok();
        let page = mine.json::<Value>();
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["bookingTime"], "09:00");
    }

    #[tokio::test]
    async fn lead_flow_over_http() {
        let h = harness();

        let created = h
            .server
            .post("/v1/leads")
            .json(&json!({"name": "Sam", "email": "sam@example.com"}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let lead = created.json::<Value>();
        assert_eq!(lead["source"], "website");
        let id = lead["id"].as_str().unwrap().to_string();

        bearer(h.server.get("/v1/leads"), &token(Role::User))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let contacted = bearer(h.server.post(&format!("/v1/leads/{id}/contacted")), &h.admin).await;
        contacted.assert_status_ok();
        assert_eq!(contacted.json::<Value>()["contacted"], true);

        let stats = bearer(h.server.get("/v1/leads/stats"), &h.admin).await;
        stats.assert_status_ok();
        let stats = stats.json::<Value>();
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["contacted"], 1);

        let activity = bearer(h.server.post(&format!("/v1/leads/{id}/activities")), &h.admin)
            .json(&json!({"activityType": "call", "description": "Left a voicemail"}))
            .await;
        activity.assert_status(StatusCode::CREATED);

        let activities = bearer(h.server.get(&format!("/v1/leads/{id}/activities")), &h.admin).await;
        activities.assert_status_ok();
        assert_eq!(activities.json::<Value>()["total"], 1);

        bearer(h.server.delete(&format!("/v1/leads/{id}")), &h.admin)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        bearer(h.server.get(&format!("/v1/leads/{id}")), &h.admin)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blog_by_slug_counts_views() {
        let h = harness();
        let author = token(Role::Counselor);

        let created = bearer(h.server.post("/v1/blogs"), &author)
            .json(&json!({
                "title": "Coping With Exam Stress",
                "content": "Breathe.",
                "isPublished": true,
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        assert_eq!(created.json::<Value>()["slug"], "coping-with-exam-stress");

        for expected in [1, 2] {
            let read = h.server.get("/v1/blogs/slug/coping-with-exam-stress").await;
            read.assert_status_ok();
            assert_eq!(read.json::<Value>()["views"], expected);
        }

        let duplicate = bearer(h.server.post("/v1/blogs"), &author)
            .json(&json!({"title": "Coping with exam stress", "content": "Again."}))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_media_collection_is_rejected() {
        let h = harness();
        h.server
            .get("/v1/media/podcasts")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        h.server.get("/v1/media/videos").await.assert_status_ok();
    }

    #[tokio::test]
    async fn banner_publish_is_exclusive_over_http() {
        let h = harness();
        let mut ids = Vec::new();
        for title in ["Spring", "Summer"] {
            let created = bearer(h.server.post("/v1/media/banners"), &h.admin)
                .json(&json!({"title": title, "imageUrl": "https://cdn.example.com/b.png"}))
                .await;
            created.assert_status(StatusCode::CREATED);
            ids.push(created.json::<Value>()["id"].as_str().unwrap().to_string());
        }

        for id in &ids {
            bearer(h.server.post(&format!("/v1/media/banners/{id}/publish")), &h.admin)
                .await
                .assert_status_ok();
        }

        let public = h.server.get("/v1/media/banners").await;
        public.assert_status_ok();
        let page = public.json::<Value>();
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["id"], ids[1].as_str());
    }

    #[tokio::test]
    async fn uploads_need_staff_and_a_content_type() {
        let h = harness();
        let png = Bytes::from_static(b"\x89PNG fake");

        bearer(h.server.post("/v1/uploads/avatars"), &token(Role::User))
            .content_type("image/png")
            .bytes(png.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let stored = bearer(h.server.post("/v1/uploads/avatars"), &h.admin)
            .content_type("image/png")
            .bytes(png)
            .await;
        stored.assert_status(StatusCode::CREATED);
        assert_eq!(stored.json::<Value>()["folder"], "avatars");
    }

    #[tokio::test]
    async fn reminder_run_requires_internal_token() {
        let h = harness();

        h.server
            .post("/internal/reminders/run")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = h
            .server
            .post("/internal/reminders/run")
            .add_header(
                HeaderName::from_static(INTERNAL_TOKEN_HEADER),
                HeaderValue::from_static("s3cret"),
            )
            .await;
        response.assert_status_ok();
        let report = response.json::<Value>();
        assert_eq!(report["scanned"], 0);
        assert!(h.notifier.sent().is_empty());
    }
}
