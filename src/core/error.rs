//! Error handling - hierarchical errors shared across the crate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// fleet-oms error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (bad file, missing credential, malformed argument)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Broker API errors (venue rejection, bad reply envelope)
    #[error("Broker error: {0}")]
    Broker(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown account id in a registry lookup
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
}
