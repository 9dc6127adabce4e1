use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{analytics, announcements, articles, auth, feedback, otp};

/// Full application router: `/api/...` plus the unauthenticated `/health` probe.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/otp/register/send-otp", post(otp::send_register_otp))
        .route("/otp/register/verify-otp", post(otp::verify_register_otp))
        .route("/otp/forgot/send-otp", post(otp::send_forgot_otp))
        .route("/otp/forgot/verify-otp", post(otp::verify_forgot_otp));

    // Admin-only handlers take an `AdminUser` extractor on top of this layer.
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/articles", get(articles::list_articles).post(articles::create_article))
        .route(
            "/articles/{id}",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route("/feedback", post(feedback::submit_feedback))
        .route("/feedback/article/{id}", get(feedback::get_feedback_counts))
        .route(
            "/announcements",
            get(announcements::list_announcements).post(announcements::create_announcement),
        )
        .route("/announcements/{id}", delete(announcements::delete_announcement))
        .route("/analytics", get(analytics::summary))
        .route("/analytics/articles/most-helpful", get(analytics::most_helpful))
        .route("/analytics/articles/least-helpful", get(analytics::least_helpful))
        .route("/analytics/articles/most-searched", get(analytics::most_searched))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
