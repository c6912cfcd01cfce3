use crate::error::AuthError;
use crate::models::tenant::Tenant;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AuthError>;
}

pub struct TenantService {
    store: std::sync::Arc<dyn TenantStore>,
}

impl TenantService {
    pub fn new(store: std::sync::Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// Look up a tenant and reject anything that isn't active. Every
    /// tenant-scoped operation (login, token issuance, channel routing)
    /// should gate on this rather than checking `Tenant::is_active`
    /// directly, so a missing tenant and a suspended one fail the same way.
    pub async fn require_active(&self, tenant_id: Uuid) -> Result<Tenant, AuthError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| AuthError::ResourceMissing {
                resource: "tenant".to_string(),
            })?;
        if !tenant.is_active() {
            return Err(AuthError::TenantInactive);
        }
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tenant::TenantStatus;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FakeStore(Option<Tenant>);

    #[async_trait]
    impl TenantStore for FakeStore {
        async fn get_tenant(&self, _tenant_id: Uuid) -> Result<Option<Tenant>, AuthError> {
            Ok(self.0.clone())
        }
    }

    fn tenant(status: TenantStatus) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "acme".to_string(),
            slug: "acme".to_string(),
            custom_domain: None,
            branding_config: serde_json::Value::Null,
            auth_config: serde_json::Value::Null,
            compliance_config: serde_json::Value::Null,
            status,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn suspended_tenant_rejected() {
        let svc = TenantService::new(Arc::new(FakeStore(Some(tenant(TenantStatus::Suspended)))));
        let err = svc.require_active(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::TenantInactive));
    }

    #[tokio::test]
    async fn missing_tenant_rejected() {
        let svc = TenantService::new(Arc::new(FakeStore(None)));
        let err = svc.require_active(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::ResourceMissing { .. }));
    }
}
