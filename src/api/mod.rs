pub mod auth;
pub mod contacts;
pub mod conversations;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod profile;
pub mod state;
pub mod users;
pub mod validation;

pub use state::AppState;
pub use middleware::RateLimiter;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    // Everything here sits behind bearer authentication
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/profile", get(profile::get_profile).put(profile::update_profile))

        // User directory
        .route("/api/users/all", get(users::list_users))
        .route("/api/users/search", get(users::search_users))
        .route("/api/users/:user_id/profile", get(users::get_user_profile))

        // Conversations and messages
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/api/conversations/:id/details", get(conversations::get_conversation_details))
        .route(
            "/api/conversations/:id/messages",
            get(messages::list_messages).post(messages::post_message),
        )
        .route("/api/conversations/:id/read", post(messages::mark_read))

        // Contacts
        .route("/api/contacts", get(contacts::list_contacts).post(contacts::add_contact))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        // Health check
        .route("/api/health", get(health))

        // Authentication endpoints
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signout", post(auth::signout))

        .merge(protected)

        // Add rate limiting middleware
        .layer(axum_middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_middleware(limiter, req, next)
        }))
        // Add request timeout
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
