//! Role and role-assignment endpoints, backed by the RBAC authorization
//! engine. Every operation is scoped to the caller's own tenant, taken
//! from their access token rather than the request body.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use uuid::Uuid;

use auth_core::error::AuthError;
use auth_core::models::{Claims, CreateRoleRequest, UpdateRoleRequest};
use auth_core::services::authorization::{AuthorizationEngine, RoleStore};
use auth_db::repositories::RoleRepository;
use crate::error::ApiError;

fn tenant_of(claims: &Claims) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&claims.tenant_id).map_err(|_| {
        ApiError::new(AuthError::AuthRequired {
            reason: "invalid tenant claim".to_string(),
        })
    })
}

fn require_permission(claims: &Claims, permission: &str) -> Result<(), ApiError> {
    if AuthorizationEngine::check(&claims.permissions, permission) {
        Ok(())
    } else {
        Err(ApiError::new(AuthError::PermissionDenied {
            permission: permission.to_string(),
            resource: "role".to_string(),
        }))
    }
}

pub async fn create_role(
    State(engine): State<Arc<AuthorizationEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:write")?;
    let tenant_id = tenant_of(&claims)?;
    let role = engine.create_role(tenant_id, payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(roles): State<Arc<RoleRepository>>,
    Extension(claims): Extension<Claims>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:read")?;
    let tenant_id = tenant_of(&claims)?;
    let role = roles
        .find_by_id(role_id)
        .await?
        .filter(|role| role.tenant_id == tenant_id)
        .ok_or_else(|| ApiError::new(AuthError::ResourceMissing {
            resource: "role".to_string(),
        }))?;
    Ok(Json(role))
}

pub async fn list_roles(
    State(roles): State<Arc<RoleRepository>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:read")?;
    let tenant_id = tenant_of(&claims)?;
    let roles = roles.find_by_tenant(tenant_id).await?;
    Ok(Json(roles))
}

pub async fn update_role(
    State(engine): State<Arc<AuthorizationEngine>>,
    Extension(claims): Extension<Claims>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:write")?;
    let tenant_id = tenant_of(&claims)?;
    let role = engine.update_role(tenant_id, role_id, payload).await?;
    Ok(Json(role))
}

pub async fn delete_role(
    State(engine): State<Arc<AuthorizationEngine>>,
    Extension(claims): Extension<Claims>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:write")?;
    let tenant_id = tenant_of(&claims)?;
    engine.delete_role(tenant_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, serde::Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn assign_role(
    State(engine): State<Arc<AuthorizationEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "roles:assign")?;
    let tenant_id = tenant_of(&claims)?;
    let granted_by = Uuid::parse_str(&claims.sub).map_err(|_| {
        ApiError::new(AuthError::AuthRequired {
            reason: "invalid subject claim".to_string(),
        })
    })?;
    let assignment = engine
        .assign_role(
            tenant_id,
            payload.user_id,
            payload.role_id,
            granted_by,
            payload.expires_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
