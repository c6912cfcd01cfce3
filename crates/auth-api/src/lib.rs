use axum::Router;
use sqlx::MySqlPool;
use std::sync::Arc;
use auth_core::services::{
    authorization::AuthorizationEngine,
    otp_service::OtpService,
    otp_delivery::OtpDeliveryService,
    rate_limiter::RateLimiter,
    session_service::SessionService,
    token_service::TokenProvider,
};
use auth_db::repositories::otp_repository::OtpRepository;
use provider_core::{ChannelManager, ProviderTypeRegistry, ProxyHandler};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod router;
pub mod handlers;
pub mod error;
pub mod validation;
pub mod middleware;

use auth_cache::Cache;

// Admin UI (feature-gated)
#[cfg(feature = "admin-ui")]
pub mod admin;

/// OpenAPI documentation for the multi-tenant AI gateway's HTTP surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login,
        handlers::auth::register,
        handlers::auth::logout,
        handlers::users::ban_user,
        handlers::users::activate_user,
        handlers::health::health_check,
    ),
    components(
        schemas(
            auth_core::services::identity::AuthRequest,
            auth_core::services::identity::AuthResponse,
            auth_core::models::user::User,
            auth_core::models::user::CreateUserRequest,
            auth_core::models::user::UserStatus,
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "Authentication", description = "User authentication and registration endpoints"),
        (name = "User Management", description = "User administration endpoints"),
        (name = "Health", description = "Service health check endpoints")
    ),
    info(
        title = "AI Gateway Platform API",
        version = "0.1.0",
        description = "Multi-tenant authentication/authorization and provider-channel routing gateway",
        contact(
            name = "API Support",
            email = "support@example.com"
        )
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: MySqlPool,
    pub identity_service: Arc<auth_core::services::identity::IdentityService>,
    pub session_service: Arc<SessionService>,
    pub authorization_engine: Arc<AuthorizationEngine>,
    pub role_repository: Arc<auth_db::repositories::RoleRepository>,
    pub otp_service: Arc<OtpService>,
    pub otp_delivery_service: Arc<OtpDeliveryService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub otp_repository: Arc<OtpRepository>,
    pub audit_logger: Arc<dyn auth_core::audit::AuditLogger>,
    pub cache: Arc<dyn Cache>,
    pub token_engine: Arc<dyn TokenProvider>,
    pub channel_manager: Arc<ChannelManager>,
    pub provider_registry: Arc<ProviderTypeRegistry>,
    pub proxy_handler: Arc<ProxyHandler>,
    pub channel_repository: Arc<auth_db::repositories::channel_repository::ChannelRepository>,
    pub credential_vault: Arc<auth_crypto::CredentialVault>,
}

pub fn app(state: AppState) -> Router {
    // Build base router with swagger  
    let router = router::api_router(state.clone())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    
    // Add admin UI routes if feature is enabled
    #[cfg(feature = "admin-ui")]
    let router = {
        use axum::routing::get;
        use axum::middleware;
        
        router
            // Public auth pages (no middleware)
            .route("/admin/login", get(admin::handlers::login_page))
            .route("/admin/register", get(admin::handlers::register_page))
            
            // Protected dashboard pages (with JWT auth middleware)
            .route("/admin/dashboard", 
                get(admin::handlers::dashboard_page)
                    .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::auth::jwt_auth)))
            .route("/admin/users", 
                get(admin::handlers::users_page)
                    .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::auth::jwt_auth)))
            .route("/admin/roles", 
                get(admin::handlers::roles_page)
                    .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::auth::jwt_auth)))
            .route("/admin/settings", 
                get(admin::handlers::settings_page)
                    .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::auth::jwt_auth)))
            .route("/admin/logout", get(admin::handlers::logout))
    };
    
    router.with_state(state)
}

// Make services extractable from AppState via State<Arc<Service>>
impl axum::extract::FromRef<AppState> for Arc<auth_core::services::identity::IdentityService> {
    fn from_ref(state: &AppState) -> Self {
        state.identity_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<SessionService> {
    fn from_ref(state: &AppState) -> Self {
        state.session_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<OtpService> {
    fn from_ref(state: &AppState) -> Self {
        state.otp_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<OtpDeliveryService> {
    fn from_ref(state: &AppState) -> Self {
        state.otp_delivery_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<AuthorizationEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.authorization_engine.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<auth_db::repositories::RoleRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.role_repository.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn TokenProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.token_engine.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ChannelManager> {
    fn from_ref(state: &AppState) -> Self {
        state.channel_manager.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ProviderTypeRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.provider_registry.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ProxyHandler> {
    fn from_ref(state: &AppState) -> Self {
        state.proxy_handler.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<auth_db::repositories::channel_repository::ChannelRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.channel_repository.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<auth_crypto::CredentialVault> {
    fn from_ref(state: &AppState) -> Self {
        state.credential_vault.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<RateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<OtpRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.otp_repository.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn auth_core::audit::AuditLogger> {
    fn from_ref(state: &AppState) -> Self {
        state.audit_logger.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn Cache> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}