pub mod hashing;
pub mod jwt;
pub mod keys;
pub mod vault;

pub use jwt::{JwtClaims, JwtConfig, JwtError, JwtService};
pub use keys::{KeyError, KeyManager};
pub use vault::{CredentialVault, VaultError};
