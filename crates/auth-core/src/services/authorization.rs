//! Role-based access control: role CRUD, user-role assignment, and the
//! permission check used on every guarded request.
//!
//! Permission strings are `resource:action` (or `resource:*` for a
//! wildcard grant, or the superuser grant `system:admin`). A user's
//! effective permissions are the union of every permission on every
//! non-expired, non-revoked role assigned to them within the tenant. If
//! the role store is unreachable, callers fall back to the permissions
//! already embedded in the caller's access token rather than failing
//! the request outright.

use crate::error::AuthError;
use crate::models::{CreateRoleRequest, Role, RoleScope, UpdateRoleRequest, UserRole};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn create(&self, role: Role) -> Result<Role, AuthError>;
    async fn update(&self, role: Role) -> Result<Role, AuthError>;
    async fn delete(&self, id: Uuid) -> Result<(), AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, AuthError>;
    async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Role>, AuthError>;
    async fn find_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>, AuthError>;
}

#[async_trait::async_trait]
pub trait UserRoleStore: Send + Sync {
    async fn assign(&self, assignment: UserRole) -> Result<UserRole, AuthError>;
    async fn revoke(&self, id: Uuid, revoked_by: Uuid) -> Result<(), AuthError>;
    async fn revoke_all_for_role(&self, role_id: Uuid) -> Result<(), AuthError>;
    async fn find_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<UserRole>, AuthError>;
}

/// Well-known role levels for ordering a user's roles by seniority.
/// Names outside this table rank at the bottom, not in the middle, so an
/// unrecognized custom role never outranks a known one by accident.
fn role_level(name: &str) -> u8 {
    match name {
        "owner" => 100,
        "admin" => 80,
        "manager" => 50,
        "member" => 20,
        "viewer" => 10,
        "guest" => 5,
        _ => 0,
    }
}

/// A user's resolved access within a tenant: the flat permission set used
/// for `check()` plus the role names, ordered most to least senior, used
/// for display and for embedding in token claims.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAccess {
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
}

pub struct AuthorizationEngine {
    roles: Arc<dyn RoleStore>,
    assignments: Arc<dyn UserRoleStore>,
}

impl AuthorizationEngine {
    pub fn new(roles: Arc<dyn RoleStore>, assignments: Arc<dyn UserRoleStore>) -> Self {
        Self { roles, assignments }
    }

    /// `system:admin` always passes. Otherwise an exact match, or a
    /// `resource:*` grant covering the required permission's resource.
    pub fn check(granted: &[String], required: &str) -> bool {
        if granted.iter().any(|p| p == "system:admin") {
            return true;
        }
        if granted.iter().any(|p| p == required) {
            return true;
        }
        if let Some((resource, _action)) = required.split_once(':') {
            let wildcard = format!("{resource}:*");
            if granted.iter().any(|p| p == &wildcard) {
                return true;
            }
        }
        false
    }

    pub async fn get_user_permissions(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<ResolvedAccess, AuthError> {
        let assignments = self.assignments.find_for_user(user_id, tenant_id).await?;
        let now = Utc::now();

        let mut permissions = HashSet::new();
        let mut roles = Vec::new();
        for assignment in assignments {
            if assignment.revoked_at.is_some() {
                continue;
            }
            if assignment.expires_at.is_some_and(|exp| exp <= now) {
                continue;
            }
            let Some(role) = self.roles.find_by_id(assignment.role_id).await? else {
                continue;
            };
            permissions.extend(role.permissions.iter().cloned());
            roles.push(role.name);
        }
        roles.sort_by_key(|name| std::cmp::Reverse(role_level(name)));
        roles.dedup();

        Ok(ResolvedAccess {
            permissions: permissions.into_iter().collect(),
            roles,
        })
    }

    pub async fn create_role(&self, tenant_id: Uuid, req: CreateRoleRequest) -> Result<Role, AuthError> {
        if self.roles.find_by_name(tenant_id, &req.name).await?.is_some() {
            return Err(AuthError::Conflict {
                message: format!("role '{}' already exists in this tenant", req.name),
            });
        }

        let role = Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: req.name,
            description: req.description,
            parent_role_id: req.parent_role_id,
            is_system_role: false,
            permissions: req.permissions,
            constraints: req.constraints,
            organization_id: None,
            scope: RoleScope::Tenant,
            metadata: None,
            created_at: now_rounded(),
            updated_at: None,
        };

        self.roles.create(role).await
    }

    pub async fn update_role(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        req: UpdateRoleRequest,
    ) -> Result<Role, AuthError> {
        let mut role = self.find_scoped(tenant_id, id).await?;

        if let Some(name) = req.name {
            if name != role.name && self.roles.find_by_name(tenant_id, &name).await?.is_some() {
                return Err(AuthError::Conflict {
                    message: format!("role '{name}' already exists in this tenant"),
                });
            }
            role.name = name;
        }
        if let Some(description) = req.description {
            role.description = Some(description);
        }
        if req.parent_role_id.is_some() {
            role.parent_role_id = req.parent_role_id;
        }
        if let Some(permissions) = req.permissions {
            role.permissions = permissions;
        }
        if let Some(constraints) = req.constraints {
            role.constraints = Some(constraints);
        }
        role.updated_at = Some(now_rounded());

        self.roles.update(role).await
    }

    /// System roles can't be deleted. Deleting a tenant role revokes every
    /// assignment of it first, so no dangling grant survives the role.
    pub async fn delete_role(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AuthError> {
        let role = self.find_scoped(tenant_id, id).await?;
        if role.is_system_role {
            return Err(AuthError::PermissionDenied {
                permission: "role:delete".to_string(),
                resource: "system role".to_string(),
            });
        }
        self.assignments.revoke_all_for_role(id).await?;
        self.roles.delete(id).await
    }

    pub async fn assign_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
        granted_by: Uuid,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<UserRole, AuthError> {
        self.find_scoped(tenant_id, role_id).await?;
        let assignment = UserRole {
            id: Uuid::new_v4(),
            user_id,
            tenant_id,
            role_id,
            granted_by,
            granted_at: now_rounded(),
            expires_at,
            revoked_at: None,
            revoked_by: None,
        };
        self.assignments.assign(assignment).await
    }

    async fn find_scoped(&self, tenant_id: Uuid, id: Uuid) -> Result<Role, AuthError> {
        let role = self
            .roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::ResourceMissing {
                resource: "role".to_string(),
            })?;
        if role.tenant_id != tenant_id {
            return Err(AuthError::ResourceMissing {
                resource: "role".to_string(),
            });
        }
        Ok(role)
    }
}

fn now_rounded() -> chrono::DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_admin_grants_everything() {
        let granted = vec!["system:admin".to_string()];
        assert!(AuthorizationEngine::check(&granted, "billing:write"));
    }

    #[test]
    fn exact_match_grants() {
        let granted = vec!["channels:read".to_string()];
        assert!(AuthorizationEngine::check(&granted, "channels:read"));
        assert!(!AuthorizationEngine::check(&granted, "channels:write"));
    }

    #[test]
    fn wildcard_grants_resource() {
        let granted = vec!["channels:*".to_string()];
        assert!(AuthorizationEngine::check(&granted, "channels:write"));
        assert!(!AuthorizationEngine::check(&granted, "users:write"));
    }

    #[test]
    fn unranked_role_sorts_last() {
        let mut roles = vec!["custom-thing".to_string(), "admin".to_string()];
        roles.sort_by_key(|name| std::cmp::Reverse(role_level(name)));
        assert_eq!(roles, vec!["admin".to_string(), "custom-thing".to_string()]);
    }
}
