//! Service configuration from environment variables
//!
//! Loaded once at startup with per-field defaults; a `.env` file is honored
//! via dotenv in the binary.

use std::env;
use std::str::FromStr;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Runtime configuration
///
/// Environment variables:
/// - `REFRESH_INTERVAL_MS` (default: 30000)
/// - `BROADCAST_INTERVAL_MS` (default: 10000)
/// - `CACHE_BACKEND` ("memory" or "redis", default: memory)
/// - `REDIS_URL` (default: redis://127.0.0.1:6379)
/// - `CACHE_TTL_SECS` (default: 60)
/// - `CACHE_SWEEP_INTERVAL_SECS` (default: 30)
/// - `HTTP_TIMEOUT_SECS` (default: 10)
/// - `RETRY_MAX_ATTEMPTS` (default: 3)
/// - `RETRY_BASE_DELAY_MS` (default: 500)
/// - `RETRY_MAX_DELAY_MS` (default: 10000)
/// - `DEXSCREENER_RATE_LIMIT` (default: 300 requests/min)
/// - `GECKOTERMINAL_RATE_LIMIT` (default: 30 requests/min)
/// - `RAYDIUM_RATE_LIMIT` (default: 60 requests/min)
/// - `COINGECKO_RATE_LIMIT` (default: 10 requests/min)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub refresh_interval_ms: u64,
    pub broadcast_interval_ms: u64,

    pub cache_backend: String,
    pub redis_url: String,
    pub cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,

    pub http_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    /// Per-source request budgets, all per minute
    pub dexscreener_rate_limit: u32,
    pub geckoterminal_rate_limit: u32,
    pub raydium_rate_limit: u32,
    pub coingecko_rate_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            refresh_interval_ms: env_or("REFRESH_INTERVAL_MS", 30_000),
            broadcast_interval_ms: env_or("BROADCAST_INTERVAL_MS", 10_000),

            cache_backend: env::var("CACHE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", 60),
            cache_sweep_interval_secs: env_or("CACHE_SWEEP_INTERVAL_SECS", 30),

            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 10),
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", 3),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 500),
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", 10_000),

            dexscreener_rate_limit: env_or("DEXSCREENER_RATE_LIMIT", 300),
            geckoterminal_rate_limit: env_or("GECKOTERMINAL_RATE_LIMIT", 30),
            raydium_rate_limit: env_or("RAYDIUM_RATE_LIMIT", 60),
            coingecko_rate_limit: env_or("COINGECKO_RATE_LIMIT", 10),
        }
    }
}
