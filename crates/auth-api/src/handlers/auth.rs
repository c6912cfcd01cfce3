use axum::{Json, extract::{State, Extension}};
use crate::AppState;
use auth_core::models::Claims;
use auth_core::services::identity::{AuthRequest, AuthResponse};
use auth_core::models::user::{CreateUserRequest, User};
use crate::error::ApiError;
use crate::validation;
use serde_json::json;
use uuid::Uuid;
use tracing::{info, warn};

/// Authenticate user and issue tokens
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 423, description = "Account locked"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    Json(mut payload): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    // Normalize email
    payload.email = validation::validate_email(&payload.email)
        .map_err(|e| ApiError::new(e).with_request_id(request_id))?;

    info!(
        request_id = %request_id,
        email = %payload.email,
        "Login attempt"
    );

    match state.identity_service.login(payload.clone()).await {
        Ok(response) => {
            info!(
                request_id = %request_id,
                email = %payload.email,
                "Login successful"
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!(
                request_id = %request_id,
                email = %payload.email,
                error = ?e,
                "Login failed"
            );
            Err(ApiError::new(e).with_request_id(request_id))
        }
    }
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Registration successful", body = User),
        (status = 409, description = "Email already exists"),
        (status = 400, description = "Validation error"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    // Validate and normalize email
    payload.email = validation::validate_email(&payload.email)
        .map_err(|e| ApiError::new(e).with_request_id(request_id))?;

    // Validate password strength
    if let Some(ref password) = payload.password {
        validation::validate_password(password)
            .map_err(|e| ApiError::new(e).with_request_id(request_id))?;
    } else {
        return Err(ApiError::new(auth_core::error::AuthError::InputInvalid {
            message: "password is required".to_string(),
        }).with_request_id(request_id));
    }

    info!(
        request_id = %request_id,
        email = %payload.email,
        "Registration attempt"
    );

    let tenant_id = payload.tenant_id;

    match state.identity_service.register(payload.clone(), tenant_id).await {
        Ok(user) => {
            info!(
                request_id = %request_id,
                email = %payload.email,
                user_id = %user.id,
                "Registration successful"
            );
            Ok(Json(user))
        }
        Err(e) => {
            warn!(
                request_id = %request_id,
                email = %payload.email,
                error = ?e,
                "Registration failed"
            );
            Err(ApiError::new(e).with_request_id(request_id))
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct LogoutRequest {
    pub session_id: Uuid,
}

/// Delete a session from the registry. The session is an audit surface, not
/// a capability check, so this does not touch token validity: the bearer
/// token used to call this endpoint stays valid until it expires or is
/// separately revoked.
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session deleted"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(session) = state.session_service.get_session(payload.session_id).await? {
        if session.user_id.to_string() != claims.sub {
            return Err(ApiError::new(auth_core::error::AuthError::AuthRequired {
                reason: "session does not belong to caller".to_string(),
            }));
        }
    }

    state.session_service.delete_session(payload.session_id).await?;
    Ok(Json(json!({"status": "success"})))
}
