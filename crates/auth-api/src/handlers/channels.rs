//! Provider channel administration: CRUD over the tenant's configured
//! routes to upstream providers. Credentials are encrypted through the
//! vault before they ever reach the database, and every write is mirrored
//! into the in-memory `ChannelManager` that the proxy path actually reads.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use auth_core::error::AuthError;
use auth_core::models::Claims;
use auth_core::services::authorization::AuthorizationEngine;
use auth_crypto::CredentialVault;
use auth_db::repositories::channel_repository::ChannelRepository;
use provider_core::{Channel, ChannelManager, ChannelStatus, ProviderTypeRegistry};

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
            resource: "channel".to_string(),
        }))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub provider_type: String,
    pub models: Vec<String>,
    pub credentials: serde_json::Value,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub max_requests_per_minute: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub models: Option<Vec<String>>,
    pub credentials: Option<serde_json::Value>,
    pub weight: Option<u32>,
    pub priority: Option<u32>,
    pub max_requests_per_minute: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    #[serde(flatten)]
    pub channel: Channel,
}

fn redact(mut channel: Channel) -> Channel {
    channel.credentials = serde_json::Value::Null;
    channel
}

fn parse_status(status: &str) -> Result<ChannelStatus, ApiError> {
    match status {
        "active" => Ok(ChannelStatus::Active),
        "inactive" => Ok(ChannelStatus::Inactive),
        "maintenance" => Ok(ChannelStatus::Maintenance),
        other => Err(ApiError::new(AuthError::InputInvalid {
            message: format!("unknown channel status '{other}'"),
        })),
    }
}

pub async fn create_channel(
    State(manager): State<Arc<ChannelManager>>,
    State(registry): State<Arc<ProviderTypeRegistry>>,
    State(repository): State<Arc<ChannelRepository>>,
    State(vault): State<Arc<CredentialVault>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:write")?;
    let tenant_id = tenant_of(&claims)?;

    if registry.get_type(&payload.provider_type).is_none() {
        return Err(ApiError::new(AuthError::InputInvalid {
            message: format!("unknown provider type '{}'", payload.provider_type),
        }));
    }

    let now = Utc::now();
    let channel = Channel {
        id: Uuid::new_v4(),
        tenant_id,
        name: payload.name,
        provider_type: payload.provider_type,
        models: payload.models,
        credentials: payload.credentials,
        weight: payload.weight,
        priority: payload.priority,
        max_requests_per_minute: payload.max_requests_per_minute,
        status: ChannelStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let encrypted = vault
        .encrypt(&channel.credentials)
        .map_err(|e| ApiError::new(AuthError::Internal(e.to_string())))?;
    repository.create(&channel, &encrypted).await?;
    manager.register(channel.clone());

    Ok((StatusCode::CREATED, Json(redact(channel))))
}

pub async fn list_channels(
    State(manager): State<Arc<ChannelManager>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:read")?;
    let tenant_id = tenant_of(&claims)?;
    let channels: Vec<Channel> = manager.list(tenant_id).into_iter().map(redact).collect();
    Ok(Json(channels))
}

pub async fn get_channel(
    State(manager): State<Arc<ChannelManager>>,
    Extension(claims): Extension<Claims>,
    Path(channel_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:read")?;
    let tenant_id = tenant_of(&claims)?;
    let channel = manager
        .get(channel_id)
        .filter(|c| c.tenant_id == tenant_id)
        .ok_or_else(|| ApiError::new(AuthError::ResourceMissing {
            resource: "channel".to_string(),
        }))?;
    Ok(Json(redact(channel)))
}

pub async fn update_channel(
    State(manager): State<Arc<ChannelManager>>,
    State(repository): State<Arc<ChannelRepository>>,
    State(vault): State<Arc<CredentialVault>>,
    Extension(claims): Extension<Claims>,
    Path(channel_id): Path<Uuid>,
    Json(payload): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:write")?;
    let tenant_id = tenant_of(&claims)?;
    let mut channel = manager
        .get(channel_id)
        .filter(|c| c.tenant_id == tenant_id)
        .ok_or_else(|| ApiError::new(AuthError::ResourceMissing {
            resource: "channel".to_string(),
        }))?;

    if let Some(name) = payload.name {
        channel.name = name;
    }
    if let Some(models) = payload.models {
        channel.models = models;
    }
    if let Some(credentials) = payload.credentials {
        channel.credentials = credentials;
    }
    if let Some(weight) = payload.weight {
        channel.weight = weight;
    }
    if let Some(priority) = payload.priority {
        channel.priority = priority;
    }
    if let Some(max_rpm) = payload.max_requests_per_minute {
        channel.max_requests_per_minute = max_rpm;
    }
    if let Some(status) = payload.status {
        channel.status = parse_status(&status)?;
    }
    channel.updated_at = Utc::now();

    let encrypted = vault
        .encrypt(&channel.credentials)
        .map_err(|e| ApiError::new(AuthError::Internal(e.to_string())))?;
    repository.update(&channel, &encrypted).await?;
    manager.update(channel.clone());

    Ok(Json(redact(channel)))
}

pub async fn delete_channel(
    State(manager): State<Arc<ChannelManager>>,
    State(repository): State<Arc<ChannelRepository>>,
    Extension(claims): Extension<Claims>,
    Path(channel_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:write")?;
    let tenant_id = tenant_of(&claims)?;
    let channel = manager
        .get(channel_id)
        .filter(|c| c.tenant_id == tenant_id)
        .ok_or_else(|| ApiError::new(AuthError::ResourceMissing {
            resource: "channel".to_string(),
        }))?;

    repository.delete(channel.id).await?;
    manager.delete(channel.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_provider_types(
    State(registry): State<Arc<ProviderTypeRegistry>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&claims, "channels:read")?;
    let types: Vec<_> = registry.list_types().into_iter().cloned().collect();
    Ok(Json(types))
}
