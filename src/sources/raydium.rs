//! Raydium API integration (secondary pool source)
//!
//! ## API Reference
//!
//! - Pool list: `https://api-v3.raydium.io/pools/info/list?...&poolSortField=volume24h`
//! - Pools by mint: `https://api-v3.raydium.io/pools/info/mint?mint1={mint}`
//!
//! Pools report both sides of the pair; the token side is whichever mint is
//! not wrapped SOL (or USDC for stable-quoted pools). `day`/`week` stat
//! blocks carry the 24h and 7d volume figures; `week` is the only 7d number
//! any source provides. `tvl` maps to liquidity. No trade counts, price
//! changes, or market cap here; other sources fill those in at merge time.

use async_trait::async_trait;
use serde::Deserialize;

use super::{SourceClient, TokenSource, WSOL_MINT};
use crate::error::SourceError;
use crate::types::TokenRecord;

pub const SOURCE_ID: &str = "raydium";

const BASE_URL: &str = "https://api-v3.raydium.io";

const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

#[derive(Debug, Deserialize)]
struct RayEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<RayPage>,
}

#[derive(Debug, Deserialize)]
struct RayPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RayPool {
    /// Pool account address
    #[serde(default)]
    pub id: String,
    pub mint_a: RayMint,
    pub mint_b: RayMint,
    /// Price of mintA denominated in mintB
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub tvl: f64,
    pub day: Option<RayWindowStats>,
    pub week: Option<RayWindowStats>,
    /// Epoch seconds as a string
    pub open_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RayMint {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "logoURI")]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RayWindowStats {
    #[serde(default)]
    pub volume: f64,
}

/// Map a Raydium pool onto the unified record. Pure function.
///
/// Returns `None` for pools quoted in neither SOL nor USDC; their prices
/// cannot be anchored to the reference units.
pub fn transform(pool: &RayPool, reference_rate: f64) -> Option<TokenRecord> {
    let (token, price_sol, price_usd) = if pool.mint_b.address == WSOL_MINT {
        let price_sol = pool.price;
        (&pool.mint_a, price_sol, price_sol * reference_rate)
    } else if pool.mint_a.address == WSOL_MINT {
        let price_sol = if pool.price > 0.0 { 1.0 / pool.price } else { 0.0 };
        (&pool.mint_b, price_sol, price_sol * reference_rate)
    } else if pool.mint_b.address == USDC_MINT {
        let price_usd = pool.price;
        let price_sol = if reference_rate > 0.0 {
            price_usd / reference_rate
        } else {
            0.0
        };
        (&pool.mint_a, price_sol, price_usd)
    } else if pool.mint_a.address == USDC_MINT {
        let price_usd = if pool.price > 0.0 { 1.0 / pool.price } else { 0.0 };
        let price_sol = if reference_rate > 0.0 {
            price_usd / reference_rate
        } else {
            0.0
        };
        (&pool.mint_b, price_sol, price_usd)
    } else {
        return None;
    };

    let mut rec = TokenRecord::empty(&token.address);
    rec.name = token.name.clone();
    rec.symbol = token.symbol.clone();
    rec.chain = "solana".to_string();
    rec.protocol = SOURCE_ID.to_string();
    rec.pair_address = pool.id.clone();

    rec.price_sol = price_sol;
    rec.price_usd = price_usd;

    rec.volume_24h_usd = pool.day.clone().unwrap_or_default().volume;
    rec.volume_7d_usd = pool.week.clone().unwrap_or_default().volume;
    rec.volume_usd = rec.volume_24h_usd;
    if reference_rate > 0.0 {
        rec.volume_sol = rec.volume_usd / reference_rate;
    }

    rec.liquidity_usd = pool.tvl;
    if reference_rate > 0.0 {
        rec.liquidity_sol = pool.tvl / reference_rate;
    }

    rec.created_at = pool
        .open_time
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    rec.last_updated = chrono::Utc::now().timestamp();
    rec.image_url = token.logo_uri.clone();

    rec.sources.insert(SOURCE_ID.to_string());
    Some(rec)
}

pub struct RaydiumSource {
    client: SourceClient,
}

impl RaydiumSource {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }

    async fn fetch_page(&self, url: &str, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError> {
        let body: RayEnvelope = self.client.get_json(url).await?;
        if !body.success {
            return Err(SourceError::Decode {
                source_id: SOURCE_ID,
                message: "upstream reported success=false".to_string(),
            });
        }

        let mut records = Vec::new();
        for value in body.data.map(|p| p.data).unwrap_or_default() {
            match serde_json::from_value::<RayPool>(value) {
                Ok(pool) => {
                    if let Some(rec) = transform(&pool, reference_rate) {
                        records.push(rec);
                    }
                }
                Err(e) => log::warn!("Skipping malformed raydium pool: {}", e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TokenSource for RaydiumSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch_tokens(&self, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError> {
        let url = format!(
            "{}/pools/info/list?poolType=all&poolSortField=volume24h&sortType=desc&pageSize=100&page=1",
            BASE_URL
        );
        self.fetch_page(&url, reference_rate).await
    }

    async fn fetch_by_address(
        &self,
        address: &str,
        reference_rate: f64,
    ) -> Result<Option<TokenRecord>, SourceError> {
        let url = format!(
            "{}/pools/info/mint?mint1={}&poolType=all&poolSortField=default&sortType=desc&pageSize=10&page=1",
            BASE_URL, address
        );
        let records = self.fetch_page(&url, reference_rate).await?;
        // The by-mint endpoint can return pools where the queried mint is on
        // either side; keep the record that actually describes it
        Ok(records.into_iter().find(|r| r.address == address))
    }

    async fn search(
        &self,
        _query: &str,
        _reference_rate: f64,
    ) -> Result<Vec<TokenRecord>, SourceError> {
        Err(SourceError::Unsupported {
            source_id: SOURCE_ID,
            operation: "search",
        })
    }
}
