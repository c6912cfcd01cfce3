//! Audit logging and compliance system.

pub mod service;

pub use service::{AuditLog, AuditService};
