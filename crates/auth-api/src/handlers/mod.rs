pub mod auth;
pub mod authorization;
pub mod channels;
pub mod chat;
pub mod health;
pub mod otp;
pub mod profile;
pub mod users;
pub mod verification;
