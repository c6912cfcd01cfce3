//! JWT authentication middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use auth_core::models::token::TokenKind;
use crate::AppState;
use crate::error::ApiError;

fn extract_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| {
            req.headers().get(header::COOKIE).and_then(|h| h.to_str().ok()).and_then(|cookies| {
                cookies.split(';').find_map(|cookie| {
                    let mut parts = cookie.trim().splitn(2, '=');
                    match (parts.next(), parts.next()) {
                        (Some("token"), Some(value)) => Some(value.to_string()),
                        _ => None,
                    }
                })
            })
        })
}

/// Validates the access token's signature, expiry, kind and revocation
/// status, then attaches its claims to the request for downstream handlers.
/// Missing or invalid tokens redirect to the admin login page, matching
/// this middleware's current use on the HTML admin routes.
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(token) = extract_token(&req) else {
        return Err(Redirect::to("/admin/login").into_response());
    };

    match state.token_engine.verify(&token, TokenKind::Access).await {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(Redirect::to("/admin/login").into_response()),
    }
}

/// Same validation as `jwt_auth`, but answers with a JSON `ApiError` instead
/// of a redirect — for JSON API routes that sit behind a bearer token.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(&req).ok_or_else(|| {
        ApiError::new(auth_core::error::AuthError::AuthRequired {
            reason: "missing bearer token".to_string(),
        })
        .into_response()
    })?;

    let claims = state
        .token_engine
        .verify(&token, TokenKind::Access)
        .await
        .map_err(|reason| {
            ApiError::new(auth_core::error::AuthError::AuthRequired {
                reason: format!("{reason:?}"),
            })
            .into_response()
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
