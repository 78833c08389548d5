//! Core module - common types, traits, config and error handling

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{AccountConfig, AppConfig, ServerConfig, VenueConfig};
pub use error::{Error, Result};
pub use traits::BrokerGateway;
pub use types::*;
