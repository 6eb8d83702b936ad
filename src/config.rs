//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. When unset the
///   service keeps API keys in memory, which is only suitable for development.
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `AUTH_ENABLED` (optional): set to `false` to disable the authentication gate, defaults to true
/// - `BOOTSTRAP_SECRET` (optional): shared secret that authorizes creation of the first API key
/// - `BCRYPT_COST` (optional): bcrypt work factor for key hashes, defaults to `bcrypt::DEFAULT_COST`
/// - `STORE_TIMEOUT_SECS` (optional): upper bound on the key lookup done by the gate, defaults to 10
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_auth_enabled")]
    pub auth_enabled: bool,

    pub bootstrap_secret: Option<String>,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_auth_enabled() -> bool {
    true
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_store_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: bootstrap_secret -> BOOTSTRAP_SECRET
        envy::from_env::<Config>()
    }

    /// Settings consumed by the authentication layer.
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            enabled: self.auth_enabled,
            // An empty secret counts as "not configured"
            bootstrap_secret: self
                .bootstrap_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            bcrypt_cost: self.bcrypt_cost,
            store_timeout: Duration::from_secs(self.store_timeout_secs),
        }
    }
}

/// Deployment-level inputs of the authentication subsystem.
///
/// None of these live in the key store; they are supplied by the deployment
/// and read on every check that needs them.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// When false the request gate lets every request through unauthenticated.
    pub enabled: bool,

    /// Secret required by the bootstrap endpoint. `None` disables bootstrap.
    pub bootstrap_secret: Option<String>,

    /// bcrypt work factor used when hashing newly issued keys.
    pub bcrypt_cost: u32,

    /// Maximum time the gate waits for the active-key read.
    pub store_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bootstrap_secret: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            store_timeout: Duration::from_secs(default_store_timeout_secs()),
        }
    }
}
