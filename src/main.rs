//! Main application entry point for the multi-tenant AI gateway platform

use anyhow::Result;
use auth_config::{ConfigLoader, ConfigManager};
use secrecy::ExposeSecret;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Port management
use auth_platform::{shutdown_signal, PortAuthority, PortClass, PortPolicy};

// Repositories
use auth_db::repositories::{
    otp_repository::OtpRepository, tenant_repository::TenantRepository,
    user_repository::UserRepository, ChannelRepository, RefreshTokenRepository, RoleRepository,
    UserRoleRepository,
};

// Services
use async_trait::async_trait;
use auth_core::services::{
    authorization::AuthorizationEngine, otp_delivery::OtpDeliveryService,
    otp_service::OtpService, rate_limiter::RateLimiter,
    tenant_service::{TenantService, TenantStore},
    token_service::TokenEngine,
};

use auth_audit::AuditService;
use auth_core::audit::AuditLogger;
use auth_core::services::background::audit_worker::{AsyncAuditLogger, AuditWorker};

use auth_api::AppState;
use auth_cache::{Cache, MultiLevelCache};
use auth_crypto::{CredentialVault, JwtConfig, JwtService, KeyManager};
use provider_core::{ChannelManager, HealthLoop, ProviderTypeRegistry, ProxyHandler};

const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 10;

fn jwt_algorithm(name: &str) -> jsonwebtoken::Algorithm {
    match name {
        "HS384" => jsonwebtoken::Algorithm::HS384,
        "HS512" => jsonwebtoken::Algorithm::HS512,
        _ => jsonwebtoken::Algorithm::HS256,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_platform=debug,auth_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AI gateway platform");

    // Load configuration
    let environment =
        std::env::var("AUTH__ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let config_loader = ConfigLoader::new("config", &environment);
    let config_manager = ConfigManager::new(config_loader)?;

    let config = config_manager.get_config();
    info!("Configuration loaded for environment: {}", environment);

    // Initialize Database - Use MySQL from config
    let database_url = config.database.mysql_url.expose_secret();
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(database_url)
        .await
        .expect("Failed to connect to MySQL database");

    info!("Database connection established");

    // Run migrations - Handle dirty migrations gracefully
    if let Err(e) = sqlx::migrate!().run(&pool).await {
        match e {
            sqlx::migrate::MigrateError::Dirty(version) => {
                info!(
                    "Migrations already applied (dirty: {}), continuing...",
                    version
                );
            }
            sqlx::migrate::MigrateError::VersionMissing(_) => {
                info!("Migrations already applied, continuing...");
            }
            _ => {
                eprintln!("Failed to run migrations: {:?}", e);
                panic!("Failed to run migrations: {:?}", e);
            }
        }
    } else {
        info!("Migrations applied successfully");
    }

    // Initialize Repositories
    let role_repo = Arc::new(RoleRepository::new(pool.clone()));
    let user_role_repo = Arc::new(UserRoleRepository::new(pool.clone()));
    let user_repo = Arc::new(UserRepository::new(pool.clone()));
    let otp_repo = Arc::new(OtpRepository::new(pool.clone()));
    let refresh_token_repo = Arc::new(RefreshTokenRepository::new(pool.clone()));
    let channel_repo = Arc::new(ChannelRepository::new(pool.clone()));
    let tenant_repo = Arc::new(TenantRepository::new(pool.clone()));
    let tenant_service = Arc::new(TenantService::new(tenant_repo as Arc<dyn TenantStore>));

    // Initialize Cache / KV store first: both the authorization engine's
    // permission cache and the identity service's lockout counters need it.
    let redis_url = config
        .external_services
        .redis
        .as_ref()
        .map(|r| r.url.clone());

    if redis_url.is_none() && environment == "production" {
        tracing::error!("Production environment detected but Redis is not configured! Falling back to in-memory cache.");
    }

    let multi_level_cache: Arc<MultiLevelCache> = match redis_url {
        Some(ref url) => match MultiLevelCache::new(url) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to Redis: {}. Falling back to in-memory.",
                    e
                );
                Arc::new(MultiLevelCache::new("redis://127.0.0.1/").expect("fallback cache url is always valid"))
            }
        },
        None => Arc::new(MultiLevelCache::new("redis://127.0.0.1/").expect("fallback cache url is always valid")),
    };
    let cache: Arc<dyn Cache> = multi_level_cache.clone();
    let kv: Arc<dyn auth_cache::KvStore> = multi_level_cache;

    // Initialize RBAC authorization engine
    let authorization_engine = Arc::new(AuthorizationEngine::new(
        role_repo.clone(),
        user_role_repo.clone(),
    ));

    // Initialize Token Engine
    let key_manager = KeyManager::new(
        config.security.jwt_secret.clone(),
        jwt_algorithm(&config.security.jwt_algorithm),
    )
    .expect("configured JWT secret/algorithm must be valid");
    let jwt_config = JwtConfig {
        access_token_ttl: chrono::Duration::minutes(config.security.jwt_expiry_minutes as i64),
        refresh_token_ttl: chrono::Duration::days(config.security.refresh_token_expiry_days as i64),
        ..JwtConfig::default()
    };
    let jwt_service = JwtService::new(jwt_config, key_manager);
    let token_service: Arc<dyn auth_core::services::token_service::TokenProvider> = Arc::new(
        TokenEngine::new(jwt_service, kv.clone(), refresh_token_repo),
    );

    // Initialize Async Audit: events are queued in-process and drained by a
    // worker into the hash-chained persistent log, so request handlers never
    // block on a database write to record an audit event.
    let persistent_logger: Arc<dyn AuditLogger> = Arc::new(AuditService::new(pool.clone()));
    let (async_logger, audit_rx) = AsyncAuditLogger::new(1000);
    let audit_logger: Arc<dyn AuditLogger> = Arc::new(async_logger);

    // Spawn Audit Worker
    let audit_worker = AuditWorker::new(audit_rx, persistent_logger);
    tokio::spawn(audit_worker.run());

    // Initialize Identity Service
    let identity_service = Arc::new(auth_core::services::identity::IdentityService::new(
        user_repo as Arc<dyn auth_core::services::identity::UserStore>,
        token_service.clone(),
        authorization_engine.clone(),
        kv.clone(),
        tenant_service,
    ));

    // Initialize OTP Service
    let otp_service = Arc::new(OtpService::new());

    // Initialize OTP Delivery Service (using simple providers for now)
    use auth_core::services::otp_delivery::DeliveryError;
    use auth_core::services::otp_delivery::{EmailProvider, OtpProvider};

    struct SimpleSmsProvider;
    struct SimpleEmailProvider;

    #[async_trait]
    impl OtpProvider for SimpleSmsProvider {
        async fn send_otp(&self, to: &str, _otp: &str) -> Result<String, DeliveryError> {
            Ok(format!("sms_sent_to_{}", to))
        }
    }

    #[async_trait]
    impl EmailProvider for SimpleEmailProvider {
        async fn send_email(
            &self,
            to: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<String, DeliveryError> {
            Ok(format!("email_sent_to_{}", to))
        }
    }

    let sms_provider = Arc::new(SimpleSmsProvider);
    let email_provider = Arc::new(SimpleEmailProvider);
    let otp_delivery_service = Arc::new(OtpDeliveryService::new(sms_provider, email_provider));

    // Initialize Rate Limiter (KV-backed sliding window)
    let rate_limiter = Arc::new(RateLimiter::new(kv.clone()));

    // Initialize provider-channel routing core
    let channel_manager = Arc::new(ChannelManager::new());
    let provider_registry = Arc::new(ProviderTypeRegistry::with_builtins());
    let credential_vault = Arc::new(CredentialVault::new(&config.security.credential_vault_secret));

    let stored_channels = channel_repo.find_all().await?;
    for stored in stored_channels {
        let mut channel = stored.channel;
        match credential_vault.decrypt(&stored.encrypted_credentials) {
            Ok(credentials) => channel.credentials = credentials,
            Err(e) => {
                tracing::error!(channel_id = %channel.id, "failed to decrypt channel credentials: {e}");
                continue;
            }
        }
        channel_manager.register(channel);
    }
    info!("Provider channels loaded into routing core");

    let proxy_handler = Arc::new(ProxyHandler::new(
        channel_manager.clone(),
        provider_registry.clone(),
        config.providers.max_retries,
    ));

    let health_loop = HealthLoop::new(
        channel_manager.clone(),
        provider_registry.clone(),
        Duration::from_secs(config.providers.health_check_interval_seconds),
    );
    tokio::spawn(health_loop.run());

    let session_service = identity_service.sessions();

    let app_state = AppState {
        db: pool,
        identity_service,
        session_service,
        authorization_engine,
        role_repository: role_repo,
        otp_service,
        otp_delivery_service,
        rate_limiter,
        otp_repository: otp_repo,
        audit_logger,
        cache,
        token_engine: token_service,
        channel_manager,
        provider_registry,
        proxy_handler,
        channel_repository: channel_repo,
        credential_vault,
    };

    // Initialize Router
    let app = auth_api::app(app_state);

    // Initialize Port Authority for production-grade port management
    let port_authority = PortAuthority::new()?;

    let port_policy = PortPolicy::new(config.server.port, PortClass::Public, "gateway-platform")
        .with_fallback_range((config.server.port + 1)..=(config.server.port + 9));

    // Acquire port with policy enforcement
    let managed_listener = port_authority
        .acquire(&port_policy, &config.server.host)
        .await?;

    let bound_port = managed_listener.port();

    // Determine display host (localhost for 0.0.0.0 binding)
    let display_host = if config.server.host == "0.0.0.0" {
        "localhost"
    } else {
        &config.server.host
    };

    println!("\nAI Gateway Platform Starting...");
    println!("Server URL: http://{}:{}", display_host, bound_port);
    println!("Service: {}", managed_listener.service_name());
    println!("Port Management: Production-grade (PID: {})", std::process::id());
    println!(
        "Graceful Shutdown: {}s drain timeout",
        DEFAULT_LEASE_TIMEOUT_SECS
    );
    println!("Health: http://{}:{}/health", display_host, bound_port);
    println!("Docs: http://{}:{}/swagger-ui", display_host, bound_port);
    println!("\nReady to accept connections!\n");

    // Convert to tokio listener
    let listener = managed_listener.into_tokio_listener()?;

    // Start server with graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown");

            if let Err(e) = port_authority.release(bound_port).await {
                tracing::warn!("Failed to release port lease: {}", e);
            }

            info!("Graceful shutdown complete");
        }
    }

    Ok(())
}
