//! Upstream source adapters
//!
//! Three providers feed the aggregation engine:
//! - `dexscreener` — primary pair data (by-token lookup, free-text search)
//! - `geckoterminal` — discovery (trending + new pools, pool search)
//! - `raydium` — pool stats (volume-ranked list, by-mint lookup, the only
//!   source reporting weekly volume)
//!
//! Every adapter owns a rate limiter sized to its provider's published limit
//! and routes each call through the shared retry wrapper. Transforms from
//! provider payloads to `TokenRecord` are pure functions so they can be
//! tested against literal JSON fixtures.

pub mod dexscreener;
pub mod geckoterminal;
pub mod raydium;

pub use dexscreener::DexScreenerSource;
pub use geckoterminal::GeckoTerminalSource;
pub use raydium::RaydiumSource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::SourceError;
use crate::limiter::RateLimiter;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::TokenRecord;

/// Wrapped-SOL mint, the native quote side of most Solana pools
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Common interface every upstream adapter implements.
///
/// Not every provider supports every operation; unsupported calls return
/// `SourceError::Unsupported` and the engine routes around them.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn id(&self) -> &'static str;

    /// Whether this adapter can serve free-text search queries
    fn supports_search(&self) -> bool {
        false
    }

    /// Fetch the provider's current token batch for a full refresh
    async fn fetch_tokens(&self, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError>;

    /// Fetch a single token by mint address
    async fn fetch_by_address(
        &self,
        address: &str,
        reference_rate: f64,
    ) -> Result<Option<TokenRecord>, SourceError>;

    /// Free-text search against the provider
    async fn search(
        &self,
        query: &str,
        reference_rate: f64,
    ) -> Result<Vec<TokenRecord>, SourceError>;
}

/// HTTP plumbing shared by all adapters: one client with a timeout, the
/// per-source rate limiter, and the retry policy. Success/failure reports
/// feed the limiter's backoff so a struggling upstream is polled more
/// gently.
pub struct SourceClient {
    source_id: &'static str,
    http: reqwest::Client,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl SourceClient {
    pub fn new(
        source_id: &'static str,
        limiter: RateLimiter,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::transport(source_id, &e))?;
        Ok(Self {
            source_id,
            http,
            limiter,
            retry,
        })
    }

    pub fn source_id(&self) -> &'static str {
        self.source_id
    }

    /// GET `url` and decode the JSON body, with rate limiting and retries.
    /// Exhausted retries propagate the last error to the engine.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let source_id = self.source_id;
        let result = with_retry(&self.retry, source_id, || async move {
            self.limiter.wait_for_unit().await;

            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| SourceError::transport(source_id, &e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    source_id,
                    status: status.as_u16(),
                });
            }

            response.json::<T>().await.map_err(|e| SourceError::Decode {
                source_id,
                message: e.to_string(),
            })
        })
        .await;

        match &result {
            Ok(_) => self.limiter.report_success(),
            Err(_) => self.limiter.report_failure(),
        }
        result
    }
}

/// Parse the string-typed numerics these APIs are fond of; absent or
/// malformed values read as zero so the merge step treats them as unknown.
pub(crate) fn parse_num(value: Option<&str>) -> f64 {
    value.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

#[derive(Debug, Deserialize)]
struct CoinGeckoSimplePrice {
    solana: CoinGeckoUsd,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoUsd {
    usd: f64,
}

/// Fetch the SOL/USD reference rate from CoinGecko.
///
/// Best-effort at the engine level: the caller keeps the stale rate when
/// this fails.
pub async fn fetch_reference_rate(client: &SourceClient) -> Result<f64, SourceError> {
    let url = "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";
    let body: CoinGeckoSimplePrice = client.get_json(url).await?;
    Ok(body.solana.usd)
}
