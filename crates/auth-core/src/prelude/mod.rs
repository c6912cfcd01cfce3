pub mod token_service {
    pub use crate::services::token_service::{RefreshTokenStore, TokenEngine, TokenProvider};
}
