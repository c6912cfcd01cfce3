//! Database repository modules

pub mod channel_repository;
pub mod otp_repository;
pub mod refresh_token_repository;
pub mod role_repository;
pub mod tenant_repository;
pub mod user_repository;

pub use channel_repository::{ChannelRepository, StoredChannel};
pub use otp_repository::*;
pub use refresh_token_repository::{RefreshTokenError, RefreshTokenRecord, RefreshTokenRepository};
pub use role_repository::*;
pub use tenant_repository::*;
pub use user_repository::*;
