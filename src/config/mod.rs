//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::gateway::service::DEFAULT_RECONNECT_GRACE_SECS;
use crate::gateway::GatewaySettings;
use crate::game::r#match::{DEFAULT_COURT_SCALE, DEFAULT_MAX_SCORE};
use crate::util::time::{interval_for, SIMULATION_TPS, SNAPSHOT_TPS};

/// Supabase project access for persistence and profile lookups
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Shared secret for HS256 token verification
    pub jwt_secret: String,
    /// Without it results and profiles stay in memory
    pub supabase: Option<SupabaseConfig>,

    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Court height relative to its width
    pub court_scale: f64,
    /// Points needed to win
    pub max_score: u32,
    /// Simulation steps per second
    pub tick_rate: u32,
    /// Snapshots per second
    pub broadcast_rate: u32,
    /// How long a dropped participant may stay away before forfeiting
    pub reconnect_grace_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (Err(_), Ok(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (Err(_), Err(_)) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .or_else(|_| env::var("SUPABASE_JWT_SECRET"))
                .map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            supabase,

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            court_scale: parse_var("COURT_SCALE", env::var("COURT_SCALE").ok(), DEFAULT_COURT_SCALE)?,
            max_score: parse_var("MAX_SCORE", env::var("MAX_SCORE").ok(), DEFAULT_MAX_SCORE)?,
            tick_rate: parse_var("TICK_RATE", env::var("TICK_RATE").ok(), SIMULATION_TPS)?,
            broadcast_rate: parse_var(
                "BROADCAST_RATE",
                env::var("BROADCAST_RATE").ok(),
                SNAPSHOT_TPS,
            )?,
            reconnect_grace_secs: parse_var(
                "RECONNECT_GRACE_SECS",
                env::var("RECONNECT_GRACE_SECS").ok(),
                DEFAULT_RECONNECT_GRACE_SECS,
            )?,
        })
    }

    /// Room tunables derived from this configuration
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            court_scale: self.court_scale,
            max_score: self.max_score,
            tick_interval: interval_for(self.tick_rate),
            broadcast_interval: interval_for(self.broadcast_rate),
            reconnect_grace: Duration::from_secs(self.reconnect_grace_secs),
        }
    }

    /// Defaults with in-memory stores, for tests
    #[cfg(test)]
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            jwt_secret: jwt_secret.to_string(),
            supabase: None,
            client_origin: "http://localhost:5173".to_string(),
            court_scale: DEFAULT_COURT_SCALE,
            max_score: DEFAULT_MAX_SCORE,
            tick_rate: SIMULATION_TPS,
            broadcast_rate: SNAPSHOT_TPS,
            reconnect_grace_secs: DEFAULT_RECONNECT_GRACE_SECS,
        }
    }
}

/// Parse an optional raw value, falling back to `default` when unset
fn parse_var<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
