pub mod authorization;
pub mod credential;
pub mod identity;
pub mod session_service;
pub mod tenant_service;
pub mod token_service;

pub use authorization::*;
pub use credential::*;
pub use identity::*;
pub use session_service::*;
pub use tenant_service::*;
pub use token_service::*;

pub mod otp_service;
pub mod otp_delivery;
pub mod rate_limiter;

pub use otp_service::*;
pub use otp_delivery::*;
pub use rate_limiter::*;

pub mod background;
