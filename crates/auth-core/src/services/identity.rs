//! Registration, password login and profile management.
//!
//! Login lockout is tracked in the KV store: a failed attempt increments a
//! per-(tenant,user) counter with a 15-minute TTL, and hitting the
//! threshold sets a 30-minute lockout stamp and clears the counter. The
//! user's `status`/`locked_until` columns are kept in sync for anything
//! reading the user record directly (admin views, audit), but the KV
//! stamp is authoritative for the login decision itself.

use crate::error::AuthError;
use crate::models::{CreateUserRequest, UpdateUserRequest, User, UserStatus};
use crate::services::authorization::AuthorizationEngine;
use crate::services::session_service::SessionService;
use crate::services::tenant_service::TenantService;
use crate::services::token_service::TokenProvider;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use auth_cache::KvStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const LOCKOUT_THRESHOLD: i64 = 5;
const FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);
const LOCKOUT_DURATION: Duration = Duration::from_secs(30 * 60);

fn failure_key(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("login:failures:{tenant_id}:{user_id}")
}

fn lockout_key(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("login:lockout:{tenant_id}:{user_id}")
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<User>, AuthError>;
    async fn find_by_phone(&self, phone: &str, tenant_id: Uuid) -> Result<Option<User>, AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;
    async fn create(
        &self,
        request: CreateUserRequest,
        password_hash: String,
        tenant_id: Uuid,
    ) -> Result<User, AuthError>;
    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), AuthError>;
    async fn record_login(&self, id: Uuid, ip: Option<String>) -> Result<(), AuthError>;
    async fn update(&self, user: UpdateUserRequest) -> Result<User, AuthError>;
    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), AuthError>;
    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<(), AuthError>;
    async fn set_phone_verified(&self, id: Uuid, verified: bool) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
    pub tenant_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub requires_mfa: bool,
    pub session_id: Uuid,
}

pub struct IdentityService {
    store: Arc<dyn UserStore>,
    token_service: Arc<dyn TokenProvider>,
    authz: Arc<AuthorizationEngine>,
    kv: Arc<dyn KvStore>,
    sessions: Arc<SessionService>,
    tenants: Arc<TenantService>,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn UserStore>,
        token_service: Arc<dyn TokenProvider>,
        authz: Arc<AuthorizationEngine>,
        kv: Arc<dyn KvStore>,
        tenants: Arc<TenantService>,
    ) -> Self {
        let sessions = Arc::new(SessionService::new(kv.clone()));
        Self {
            store,
            token_service,
            authz,
            kv,
            sessions,
            tenants,
        }
    }

    pub fn sessions(&self) -> Arc<SessionService> {
        self.sessions.clone()
    }

    async fn hash_password(password: String) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))
    }

    pub async fn register(
        &self,
        request: CreateUserRequest,
        tenant_id: Uuid,
    ) -> Result<User, AuthError> {
        self.tenants.require_active(tenant_id).await?;

        let Some(password) = request.password.clone() else {
            return Err(AuthError::InputInvalid {
                message: "password is required".to_string(),
            });
        };

        if self
            .store
            .find_by_email(&request.email, tenant_id)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict {
                message: "email already registered".to_string(),
            });
        }
        if let Some(ref phone) = request.phone {
            if self.store.find_by_phone(phone, tenant_id).await?.is_some() {
                return Err(AuthError::Conflict {
                    message: "phone already registered".to_string(),
                });
            }
        }

        let password_hash = Self::hash_password(password).await?;
        self.store.create(request, password_hash, tenant_id).await
    }

    pub async fn login(&self, request: AuthRequest) -> Result<AuthResponse, AuthError> {
        self.tenants.require_active(request.tenant_id).await?;

        let user = self
            .store
            .find_by_email(&request.email, request.tenant_id)
            .await?
            .ok_or_else(AuthError::invalid_credentials)?;

        if let Some(locked_until) = self.check_lockout(request.tenant_id, user.id).await {
            return Err(AuthError::AccountLocked {
                locked_until: locked_until.to_rfc3339(),
            });
        }
        if !user.can_authenticate() {
            return Err(AuthError::AuthFailed {
                message: "account is not active".to_string(),
            });
        }

        let hash = user
            .password_hash
            .clone()
            .ok_or_else(AuthError::invalid_credentials)?;
        let candidate = request.password.clone();
        let is_valid = tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash).ok()?;
            Some(Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .unwrap_or(false);

        if !is_valid {
            self.record_failure(request.tenant_id, user.id).await?;
            return Err(AuthError::invalid_credentials());
        }

        if let Err(e) = self.kv.clear(&failure_key(request.tenant_id, user.id)).await {
            warn!("failed to clear login failure counter: {e}");
        }
        self.store.record_login(user.id, request.ip_address.clone()).await?;

        self.issue_tokens_for_user(&user, request.tenant_id, request.ip_address, request.remember)
            .await
    }

    /// Returns the active lockout expiry if the account is currently locked
    /// out, logging and allowing the attempt through if the KV store can't
    /// be reached to answer the question.
    async fn check_lockout(&self, tenant_id: Uuid, user_id: Uuid) -> Option<chrono::DateTime<Utc>> {
        match self.kv.get_value(&lockout_key(tenant_id, user_id)).await {
            Ok(Some(stamp)) => stamp.parse::<i64>().ok().and_then(chrono::DateTime::from_timestamp).filter(|until| *until > Utc::now()),
            Ok(None) => None,
            Err(e) => {
                warn!("KV unreachable during lockout check, allowing: {e}");
                None
            }
        }
    }

    async fn record_failure(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AuthError> {
        let count = match self.kv.incr(&failure_key(tenant_id, user_id), FAILURE_WINDOW).await {
            Ok(count) => count,
            Err(e) => {
                warn!("KV unreachable recording login failure, not locking out: {e}");
                return Ok(());
            }
        };
        if count >= LOCKOUT_THRESHOLD {
            let locked_until = Utc::now() + chrono::Duration::from_std(LOCKOUT_DURATION).unwrap();
            self.kv
                .set_value(&lockout_key(tenant_id, user_id), &locked_until.timestamp().to_string(), LOCKOUT_DURATION)
                .await
                .map_err(|e| AuthError::DependencyUnavailable {
                    dependency: format!("kv store: {e}"),
                })?;
            let _ = self.kv.clear(&failure_key(tenant_id, user_id)).await;
            self.store.update_status(user_id, UserStatus::Locked).await?;
        }
        Ok(())
    }

    pub async fn issue_tokens_for_user(
        &self,
        user: &User,
        tenant_id: Uuid,
        client_address: Option<String>,
        remember: bool,
    ) -> Result<AuthResponse, AuthError> {
        let access = self.authz.get_user_permissions(user.id, tenant_id).await.unwrap_or_default();
        let pair = self
            .token_service
            .issue_pair(user.id, tenant_id, access.permissions, access.roles)
            .await?;

        let session = self
            .sessions
            .create_session(user.id, tenant_id, client_address, remember)
            .await?;

        Ok(AuthResponse {
            user: user.clone(),
            access_token: pair.access_token.token,
            refresh_token: pair.refresh_token,
            requires_mfa: user.mfa_enabled,
            session_id: session.id,
        })
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        self.sessions.delete_session(session_id).await
    }

    pub async fn ban_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.update_status(user_id, UserStatus::Inactive).await
    }

    pub async fn activate_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.update_status(user_id, UserStatus::Active).await
    }

    pub async fn update_password(&self, user_id: Uuid, new_password: String) -> Result<(), AuthError> {
        let password_hash = Self::hash_password(new_password).await?;
        self.store.update_password_hash(user_id, password_hash).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store.find_by_id(user_id).await?.ok_or_else(AuthError::user_not_found)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        profile_data: serde_json::Value,
    ) -> Result<User, AuthError> {
        let update_request = UpdateUserRequest {
            id: user_id,
            email: None,
            phone: None,
            profile_data: Some(profile_data),
            preferences: None,
        };
        self.store.update(update_request).await
    }

    pub async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.set_email_verified(user_id, true).await
    }

    pub async fn mark_phone_verified(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.set_phone_verified(user_id, true).await
    }
}
