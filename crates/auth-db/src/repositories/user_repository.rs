use auth_core::error::AuthError;
use auth_core::models::user::{CreateUserRequest, UpdateUserRequest, UserStatus};
use auth_core::models::User;
use auth_core::services::identity::UserStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::MySqlPool;
use sqlx::Row;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<User, sqlx::Error> {
        let status_str: String = row.try_get("status")?;
        let status: UserStatus = serde_json::from_str(&status_str).unwrap_or(UserStatus::Active);
        let id_str: String = row.try_get("id")?;

        Ok(User {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            email: row.try_get("email")?,
            email_verified: row.try_get("email_verified")?,
            phone: row.try_get("phone")?,
            phone_verified: row.try_get("phone_verified")?,
            password_hash: row.try_get("password_hash")?,
            password_changed_at: row.try_get("password_changed_at")?,
            failed_login_attempts: row.try_get::<i32, _>("failed_login_attempts").unwrap_or(0) as u32,
            locked_until: row.try_get("locked_until")?,
            last_login_at: row.try_get("last_login_at")?,
            last_login_ip: row.try_get("last_login_ip")?,
            mfa_enabled: row.try_get("mfa_enabled")?,
            mfa_secret: row.try_get("mfa_secret")?,
            backup_codes: row
                .try_get("backup_codes")
                .map(|v: serde_json::Value| serde_json::from_value(v).unwrap_or_default())
                .ok(),
            risk_score: row.try_get::<f32, _>("risk_score").unwrap_or(0.0),
            profile_data: row.try_get::<serde_json::Value, _>("profile_data").unwrap_or(serde_json::json!({})),
            preferences: row.try_get::<serde_json::Value, _>("preferences").unwrap_or(serde_json::json!({})),
            status,
            created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
            updated_at: row.try_get("updated_at").unwrap_or_else(|_| Utc::now()),
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        id, email, email_verified, phone, phone_verified, password_hash, password_changed_at,
        failed_login_attempts, locked_until, last_login_at, last_login_ip, mfa_enabled,
        mfa_secret, backup_codes, risk_score, profile_data, preferences, status, created_at,
        updated_at, deleted_at
    "#;

    async fn fetch_one_optional(&self, where_clause: &str, bind: &str, tenant_id: Option<Uuid>) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} AND deleted_at IS NULL{}",
            Self::SELECT_COLUMNS,
            where_clause,
            if tenant_id.is_some() { " AND tenant_id = ?" } else { "" }
        );
        let mut query = sqlx::query(&sql).bind(bind);
        if let Some(tenant_id) = tenant_id {
            query = query.bind(tenant_id.to_string());
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| self.map_row(r)).transpose()
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<User>, AuthError> {
        self.fetch_one_optional("email = ?", email, Some(tenant_id))
            .await
            .map_err(AuthError::from)
    }

    async fn find_by_phone(&self, phone: &str, tenant_id: Uuid) -> Result<Option<User>, AuthError> {
        self.fetch_one_optional("phone = ?", phone, Some(tenant_id))
            .await
            .map_err(AuthError::from)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        self.fetch_one_optional("id = ?", &id.to_string(), None)
            .await
            .map_err(AuthError::from)
    }

    async fn create(
        &self,
        request: CreateUserRequest,
        password_hash: String,
        tenant_id: Uuid,
    ) -> Result<User, AuthError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status_str = serde_json::to_string(&UserStatus::Active).unwrap();
        let profile = request.profile_data.clone().unwrap_or(serde_json::json!({}));

        sqlx::query(
            r#"
            INSERT INTO users (
                id, tenant_id, email, phone, password_hash, status,
                created_at, updated_at, email_verified, phone_verified,
                failed_login_attempts, risk_score, mfa_enabled,
                profile_data, preferences
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, false, false, 0, 0.0, false, ?, '{}')
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&password_hash)
        .bind(&status_str)
        .bind(now)
        .bind(now)
        .bind(&profile)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;

        self.find_by_id(id).await?.ok_or_else(AuthError::user_not_found)
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), AuthError> {
        let status_str = serde_json::to_string(&status).unwrap();
        sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_str)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, ip: Option<String>) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET last_login_at = ?, last_login_ip = ?, failed_login_attempts = 0, locked_until = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(ip)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }

    async fn update(&self, request: UpdateUserRequest) -> Result<User, AuthError> {
        if let Some(email) = &request.email {
            sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
                .bind(email)
                .bind(Utc::now())
                .bind(request.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(AuthError::from)?;
        }
        if let Some(phone) = &request.phone {
            sqlx::query("UPDATE users SET phone = ?, updated_at = ? WHERE id = ?")
                .bind(phone)
                .bind(Utc::now())
                .bind(request.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(AuthError::from)?;
        }
        if let Some(profile_data) = &request.profile_data {
            sqlx::query("UPDATE users SET profile_data = ?, updated_at = ? WHERE id = ?")
                .bind(profile_data)
                .bind(Utc::now())
                .bind(request.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(AuthError::from)?;
        }
        if let Some(preferences) = &request.preferences {
            sqlx::query("UPDATE users SET preferences = ?, updated_at = ? WHERE id = ?")
                .bind(preferences)
                .bind(Utc::now())
                .bind(request.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(AuthError::from)?;
        }
        self.find_by_id(request.id).await?.ok_or_else(AuthError::user_not_found)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password_hash = ?, password_changed_at = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET email_verified = ?, updated_at = ? WHERE id = ?")
            .bind(verified)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn set_phone_verified(&self, id: Uuid, verified: bool) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET phone_verified = ?, updated_at = ? WHERE id = ?")
            .bind(verified)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }
}
