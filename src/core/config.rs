//! Central configuration.
//!
//! Loads from `config.toml` at the project root. Credentials never live in
//! the file - each account entry names the environment variables that hold
//! them (populated via `.env` in development).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::core::{Error, Result};

/// Server and dispatch knobs
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the control surface
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds between risk sweeps over all accounts
    #[serde(default = "default_risk_poll")]
    pub risk_poll_secs: u64,
    /// Max simultaneous in-flight account tasks; 0 means one per account
    #[serde(default)]
    pub max_in_flight: usize,
    /// Per-account task timeout so one hung venue call cannot stall a dispatch
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Lot size used when a place request omits it or sends garbage
    #[serde(default = "default_lot_size")]
    pub default_lot_size: i64,
}

fn default_bind() -> String {
    "127.0.0.1:8181".to_string()
}
fn default_risk_poll() -> u64 {
    10
}
fn default_task_timeout() -> u64 {
    15
}
fn default_lot_size() -> i64 {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            risk_poll_secs: default_risk_poll(),
            max_in_flight: 0,
            task_timeout_secs: default_task_timeout(),
            default_lot_size: default_lot_size(),
        }
    }
}

/// Venue endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub base_url: String,
    /// Directory for cached session tokens
    #[serde(default = "default_token_dir")]
    pub token_dir: String,
}

fn default_token_dir() -> String {
    "tokens".to_string()
}

/// One trading account.
///
/// `password_env` / `pin_env` / `secret_env` name environment variables; the
/// values themselves are read at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub client_id: String,
    pub password_env: String,
    pub pin_env: String,
    pub secret_env: String,
    /// Quantity multiplier relative to the requested base quantity
    #[serde(default = "default_capital")]
    pub capital: f64,
    /// Hard stop-loss in account currency (absolute value is used)
    #[serde(default = "default_max_loss")]
    pub max_loss: f64,
    /// Trailing arms once max MTM exceeds `max_loss * trail_after`
    #[serde(default = "default_trail_after")]
    pub trail_after: f64,
    /// Giveback fraction of the MTM high-water mark
    #[serde(default = "default_trail_percent")]
    pub trail_percent: f64,
    /// Take-profit in account currency (absolute value is used)
    #[serde(default = "default_target")]
    pub target: f64,
    /// Allowed segments: 1 = NSE, 2 = NFO, 3 = both
    #[serde(default = "default_exc_code")]
    pub exc_code: u8,
}

// The risk defaults are sentinels large enough to never trigger, so an
// account with no explicit limits trades unconstrained.
fn default_capital() -> f64 {
    1.0
}
fn default_max_loss() -> f64 {
    1e10
}
fn default_trail_after() -> f64 {
    1e3
}
fn default_trail_percent() -> f64 {
    1e3
}
fn default_target() -> f64 {
    1e10
}
fn default_exc_code() -> u8 {
    1
}

/// Top-level config file structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub venue: VenueConfig,
    /// Extra shortcut keys for the argument parser, merged over the built-ins
    #[serde(default)]
    pub shortcuts: HashMap<String, String>,
    pub accounts: Vec<AccountConfig>,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load from the default locations (project root config.toml).
    pub fn load_default() -> Result<Self> {
        let candidates = [
            "config.toml",
            concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml"),
        ];

        for path in &candidates {
            if Path::new(path).is_file() {
                tracing::info!("Loaded config from {}", path);
                return Self::load(Path::new(path));
            }
        }

        Err(Error::Config("no config.toml found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [venue]
            base_url = "https://venue.example/api/v1"

            [[accounts]]
            client_id = "aa1234"
            password_env = "AA1234_PASSWORD"
            pin_env = "AA1234_PIN"
            secret_env = "AA1234_SECRET"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:8181");
        assert_eq!(cfg.server.default_lot_size, 50);
        assert_eq!(cfg.accounts.len(), 1);
        let account = &cfg.accounts[0];
        assert_eq!(account.capital, 1.0);
        assert_eq!(account.exc_code, 1);
        assert_eq!(account.max_loss, 1e10);
    }

    #[test]
    fn test_account_overrides() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [venue]
            base_url = "https://venue.example/api/v1"

            [server]
            max_in_flight = 6

            [[accounts]]
            client_id = "bb1"
            password_env = "P"
            pin_env = "N"
            secret_env = "S"
            capital = 2.5
            max_loss = 10000
            trail_after = 0.5
            trail_percent = 0.2
            target = 50000
            exc_code = 3
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.max_in_flight, 6);
        let account = &cfg.accounts[0];
        assert_eq!(account.capital, 2.5);
        assert_eq!(account.trail_percent, 0.2);
        assert_eq!(account.exc_code, 3);
    }
}
