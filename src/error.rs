//! Error types for the wellbeing engine
//!
//! Collaborator failures (storage, notifications) are degraded at the call
//! site and logged rather than propagated, so the public engine operations
//! stay infallible. These types are what the host's collaborator
//! implementations report back through the `host` traits.

use thiserror::Error;

/// Failure reported by the durable record store collaborator
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Failure reported by the notification collaborator
#[derive(Debug, Error)]
#[error("notification error: {0}")]
pub struct NotificationError(pub String);
