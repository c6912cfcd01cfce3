use axum::{routing::{get, post}, Router, middleware};
use tower_http::trace::TraceLayer;
use crate::AppState;
use crate::handlers::{authorization::roles, auth, channels, chat, health, otp, profile, users, verification};
use crate::middleware::{bearer_auth, request_id_middleware, security_headers_middleware, RateLimiter};
use std::time::Duration;

pub fn api_router(state: AppState) -> Router<AppState> {
    // Create rate limiter: 5 requests per minute
    let rate_limiter = RateLimiter::new(5, Duration::from_secs(60));

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/otp/request", post(otp::request_otp))
        .route("/auth/otp/verify", post(otp::verify_otp))
        .route("/auth/verify/email/send", post(verification::send_email_verification))
        .route("/auth/verify/email", get(verification::verify_email_link))
        .route("/auth/verify/phone/send", post(verification::send_phone_verification))
        .route("/auth/verify/phone/confirm", post(verification::confirm_phone_verification));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/users/:id/ban", post(users::ban_user))
        .route("/users/:id/activate", post(users::activate_user))
        .route("/profile/complete", post(profile::complete_profile))
        .route("/roles", post(roles::create_role).get(roles::list_roles))
        .route("/roles/:id", get(roles::get_role).put(roles::update_role).delete(roles::delete_role))
        .route("/roles/assignments", post(roles::assign_role))
        .route("/channels", post(channels::create_channel).get(channels::list_channels))
        .route("/channels/:id", get(channels::get_channel).put(channels::update_channel).delete(channels::delete_channel))
        .route("/provider-types", get(channels::list_provider_types))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    public
        .merge(protected)
        // Add middleware layers (executed bottom-to-top)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(axum::Extension(rate_limiter))
}
