//! Configuration module for the bug tracker backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rand::RngCore;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HMAC secret used to sign session tokens
    pub jwt_secret: Vec<u8>,
    /// Set when no secret was configured and a per-process one was generated
    pub jwt_secret_generated: bool,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory uploaded documents are written to
    pub document_dir: PathBuf,
    /// Whether uploads are written to disk and served under /public
    pub storage_enabled: bool,
    /// Whether listing routes are served from the response cache
    pub cache_enabled: bool,
    /// Lifetime of a cached response
    pub cache_ttl: Duration,
    /// Lifetime of a session token
    pub token_ttl: Duration,
    /// Origins allowed to make credentialed requests; empty means any origin
    pub cors_origins: Vec<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let (jwt_secret, jwt_secret_generated) = match env::var("BUGTRACKER_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => (secret.into_bytes(), false),
            _ => (random_secret(), true),
        };

        let db_path = env::var("BUGTRACKER_DB_PATH")
            .unwrap_or_else(|_| "./data/bugtracker.sqlite".to_string())
            .into();

        let document_dir = env::var("BUGTRACKER_DOCUMENT_DIR")
            .unwrap_or_else(|_| "./documents".to_string())
            .into();

        let storage_enabled = parse_flag("BUGTRACKER_STORAGE_ENABLED", true)?;
        let cache_enabled = parse_flag("BUGTRACKER_CACHE_ENABLED", false)?;
        let cache_ttl = Duration::from_secs(parse_number("BUGTRACKER_CACHE_TTL_SECS", 15)?);
        let token_ttl =
            Duration::from_secs(parse_number("BUGTRACKER_TOKEN_TTL_MINUTES", 15)? * 60);

        let cors_origins = env::var("BUGTRACKER_CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let bind_addr = env::var("BUGTRACKER_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid BUGTRACKER_BIND_ADDR: {}", e)))?;

        let log_level = env::var("BUGTRACKER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            jwt_secret,
            jwt_secret_generated,
            db_path,
            document_dir,
            storage_enabled,
            cache_enabled,
            cache_ttl,
            token_ttl,
            cors_origins,
            bind_addr,
            log_level,
        })
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

fn parse_flag(name: &str, default: bool) -> Result<bool, AppError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(AppError::Internal(format!(
                "Invalid {}: expected a boolean, got '{}'",
                name, other
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn parse_number(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
