//! Chat completion proxy: the HTTP surface over `ProxyHandler`. Accepts a
//! canonical chat request, resolves it through the tenant's channels, and
//! either returns one JSON response or streams Server-Sent-Events.

use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use auth_core::error::AuthError;
use auth_core::models::Claims;
use auth_core::services::authorization::AuthorizationEngine;
use provider_core::{CanonicalRequest, ProxyHandler};

use crate::error::ApiError;

fn tenant_of(claims: &Claims) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&claims.tenant_id).map_err(|_| {
        ApiError::new(AuthError::AuthRequired {
            reason: "invalid tenant claim".to_string(),
        })
    })
}

/// POST /v1/chat/completions
///
/// Dispatches to streaming or non-streaming handling based on the
/// request's own `stream` flag, mirroring the OpenAI chat-completions
/// contract the canonical request/response shapes already follow.
pub async fn chat_completions(
    State(proxy): State<Arc<ProxyHandler>>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CanonicalRequest>,
) -> Result<Response, ApiError> {
    if !AuthorizationEngine::check(&claims.permissions, "chat:write") {
        return Err(ApiError::new(AuthError::PermissionDenied {
            permission: "chat:write".to_string(),
            resource: "chat completion".to_string(),
        }));
    }
    let tenant_id = tenant_of(&claims)?;

    if request.stream {
        let (stream, _channel_id, _provider_type) = proxy.stream(request, tenant_id).await?;
        let body = Body::from_stream(stream.map(|chunk| Ok::<_, std::io::Error>(chunk)));
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(body)
            .map_err(|e| ApiError::new(AuthError::Internal(e.to_string())))?;
        Ok(response)
    } else {
        let (response, _usage) = proxy.complete(request, tenant_id).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}
