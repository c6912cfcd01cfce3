//! Provider registry and channel routing: the upstream half of the gateway.
//!
//! A [`registry::ProviderTypeRegistry`] declares how to talk to each
//! provider family; a [`channel::ChannelManager`] holds tenant-scoped routes
//! to provider accounts and picks one per request; [`health::HealthLoop`]
//! keeps channel metrics current in the background; [`converter`] and
//! [`proxy::ProxyHandler`] carry a canonical chat request to an upstream and
//! the response back.

pub mod channel;
pub mod converter;
pub mod error;
pub mod health;
pub mod models;
pub mod proxy;
pub mod registry;

pub use channel::{ChannelManager, ProbeOutcome};
pub use converter::{AnthropicConverter, CanonicalRequest, CanonicalResponse, Converter, OpenAiConverter};
pub use error::ProviderError;
pub use health::HealthLoop;
pub use models::{
    AuthScheme, Channel, ChannelHealth, ChannelMetrics, ChannelStatus, CredentialField, ModelInfo,
    ProviderTypeConfig,
};
pub use proxy::{ProxyHandler, UsageRecord};
pub use registry::ProviderTypeRegistry;
