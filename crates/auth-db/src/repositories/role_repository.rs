use auth_core::error::AuthError;
use auth_core::models::role::RoleScope;
use auth_core::models::{Role, UserRole};
use auth_core::services::authorization::{RoleStore, UserRoleStore};
use sqlx::{MySql, Pool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct RoleRepository {
    pool: Pool<MySql>,
}

impl RoleRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<Role, sqlx::Error> {
        let id_str: String = row.try_get("id")?;
        let tenant_str: String = row.try_get("tenant_id")?;
        let parent_str: Option<String> = row.try_get("parent_role_id")?;
        let org_str: Option<String> = row.try_get("organization_id")?;
        let scope_str: String = row.try_get("scope")?;
        let permissions: serde_json::Value = row.try_get("permissions")?;
        let constraints: Option<serde_json::Value> = row.try_get("constraints")?;

        Ok(Role {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            tenant_id: Uuid::parse_str(&tenant_str).unwrap_or_default(),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            parent_role_id: parent_str.and_then(|s| Uuid::parse_str(&s).ok()),
            is_system_role: row.try_get("is_system_role")?,
            permissions: serde_json::from_value(permissions).unwrap_or_default(),
            constraints: constraints.and_then(|v| serde_json::from_value(v).ok()),
            organization_id: org_str.and_then(|s| Uuid::parse_str(&s).ok()),
            scope: serde_json::from_value(serde_json::Value::String(scope_str)).unwrap_or(RoleScope::Tenant),
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    const SELECT: &'static str = "SELECT id, tenant_id, name, description, parent_role_id, is_system_role, permissions, constraints, organization_id, scope, metadata, created_at, updated_at FROM roles";
}

#[async_trait::async_trait]
impl RoleStore for RoleRepository {
    async fn create(&self, role: Role) -> Result<Role, AuthError> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, parent_role_id, is_system_role, permissions, constraints, organization_id, scope, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(role.id.to_string())
        .bind(role.tenant_id.to_string())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.parent_role_id.map(|u| u.to_string()))
        .bind(role.is_system_role)
        .bind(serde_json::to_value(&role.permissions).unwrap())
        .bind(role.constraints.as_ref().map(|c| serde_json::to_value(c).unwrap()))
        .bind(role.organization_id.map(|u| u.to_string()))
        .bind(serde_json::to_value(&role.scope).unwrap().as_str().unwrap_or("tenant").to_string())
        .bind(&role.metadata)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(role)
    }

    async fn update(&self, role: Role) -> Result<Role, AuthError> {
        sqlx::query(
            r#"
            UPDATE roles
            SET name = ?, description = ?, parent_role_id = ?, permissions = ?, constraints = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.parent_role_id.map(|u| u.to_string()))
        .bind(serde_json::to_value(&role.permissions).unwrap())
        .bind(role.constraints.as_ref().map(|c| serde_json::to_value(c).unwrap()))
        .bind(role.updated_at)
        .bind(role.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(role)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, AuthError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", Self::SELECT))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::from)?;
        row.map(|r| self.map_row(r)).transpose().map_err(AuthError::from)
    }

    async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Role>, AuthError> {
        let rows = sqlx::query(&format!("{} WHERE tenant_id = ?", Self::SELECT))
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(AuthError::from)?;
        rows.into_iter().map(|r| self.map_row(r)).collect::<Result<_, _>>().map_err(AuthError::from)
    }

    async fn find_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>, AuthError> {
        let row = sqlx::query(&format!("{} WHERE tenant_id = ? AND name = ?", Self::SELECT))
            .bind(tenant_id.to_string())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::from)?;
        row.map(|r| self.map_row(r)).transpose().map_err(AuthError::from)
    }
}

#[derive(Clone)]
pub struct UserRoleRepository {
    pool: Pool<MySql>,
}

impl UserRoleRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<UserRole, sqlx::Error> {
        let id_str: String = row.try_get("id")?;
        let user_str: String = row.try_get("user_id")?;
        let tenant_str: String = row.try_get("tenant_id")?;
        let role_str: String = row.try_get("role_id")?;
        let granted_by_str: String = row.try_get("granted_by")?;
        let revoked_by_str: Option<String> = row.try_get("revoked_by")?;

        Ok(UserRole {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            user_id: Uuid::parse_str(&user_str).unwrap_or_default(),
            tenant_id: Uuid::parse_str(&tenant_str).unwrap_or_default(),
            role_id: Uuid::parse_str(&role_str).unwrap_or_default(),
            granted_by: Uuid::parse_str(&granted_by_str).unwrap_or_default(),
            granted_at: row.try_get("granted_at")?,
            expires_at: row.try_get("expires_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_by: revoked_by_str.and_then(|s| Uuid::parse_str(&s).ok()),
        })
    }
}

#[async_trait::async_trait]
impl UserRoleStore for UserRoleRepository {
    async fn assign(&self, assignment: UserRole) -> Result<UserRole, AuthError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (id, user_id, tenant_id, role_id, granted_by, granted_at, expires_at, revoked_at, revoked_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.user_id.to_string())
        .bind(assignment.tenant_id.to_string())
        .bind(assignment.role_id.to_string())
        .bind(assignment.granted_by.to_string())
        .bind(assignment.granted_at)
        .bind(assignment.expires_at)
        .bind(assignment.revoked_at)
        .bind(assignment.revoked_by.map(|u| u.to_string()))
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(assignment)
    }

    async fn revoke(&self, id: Uuid, revoked_by: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE user_roles SET revoked_at = ?, revoked_by = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(revoked_by.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn revoke_all_for_role(&self, role_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE user_roles SET revoked_at = ? WHERE role_id = ? AND revoked_at IS NULL")
            .bind(chrono::Utc::now())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn find_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<UserRole>, AuthError> {
        let rows = sqlx::query(
            "SELECT id, user_id, tenant_id, role_id, granted_by, granted_at, expires_at, revoked_at, revoked_by FROM user_roles WHERE user_id = ? AND tenant_id = ?",
        )
        .bind(user_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(AuthError::from)?;

        rows.into_iter().map(|r| self.map_row(r)).collect::<Result<_, _>>().map_err(AuthError::from)
    }
}
