//! DexScreener API integration (primary pair-data source)
//!
//! ## API Reference
//!
//! - Search: `https://api.dexscreener.com/latest/dex/search?q={query}`
//! - Token pairs: `https://api.dexscreener.com/token-pairs/v1/solana/{mint}`
//!
//! Both return trading pairs. `priceUsd`/`priceNative` are strings; volume,
//! price change, and transaction counts come as per-window objects
//! (`h1`/`h24`), with transactions further split into buys/sells. `fdv`
//! stands in for market cap when `marketCap` is absent.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_num, SourceClient, TokenSource};
use crate::error::SourceError;
use crate::types::TokenRecord;

pub const SOURCE_ID: &str = "dexscreener";

const BASE_URL: &str = "https://api.dexscreener.com";

/// DexScreener pair response structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsPair {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    #[serde(default)]
    pub pair_address: String,
    pub base_token: DsToken,
    pub quote_token: DsToken,
    pub price_native: Option<String>,
    pub price_usd: Option<String>,
    pub volume: Option<DsWindows>,
    pub price_change: Option<DsWindows>,
    pub txns: Option<DsTxns>,
    pub liquidity: Option<DsLiquidity>,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    /// Milliseconds since epoch
    pub pair_created_at: Option<i64>,
    pub info: Option<DsInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsToken {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DsWindows {
    pub h1: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsTxns {
    pub h24: Option<DsTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsTxnCounts {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsInfo {
    pub image_url: Option<String>,
    pub websites: Option<Vec<DsWebsite>>,
    pub socials: Option<Vec<DsSocial>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsWebsite {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DsSocial {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct DsSearchResponse {
    pairs: Option<Vec<serde_json::Value>>,
}

/// Map a DexScreener pair onto the unified record. Pure function.
pub fn transform(pair: &DsPair, reference_rate: f64) -> TokenRecord {
    let mut rec = TokenRecord::empty(&pair.base_token.address);
    rec.name = pair.base_token.name.clone();
    rec.symbol = pair.base_token.symbol.clone();
    rec.chain = pair.chain_id.clone();
    rec.protocol = pair.dex_id.clone();
    rec.pair_address = pair.pair_address.clone();

    rec.price_usd = parse_num(pair.price_usd.as_deref());
    rec.price_sol = if pair.quote_token.symbol == "SOL" {
        parse_num(pair.price_native.as_deref())
    } else if reference_rate > 0.0 {
        rec.price_usd / reference_rate
    } else {
        0.0
    };

    let volume = pair.volume.clone().unwrap_or_default();
    rec.volume_1h_usd = volume.h1.unwrap_or(0.0);
    rec.volume_24h_usd = volume.h24.unwrap_or(0.0);
    rec.volume_usd = rec.volume_24h_usd;
    if reference_rate > 0.0 {
        rec.volume_sol = rec.volume_usd / reference_rate;
    }

    let change = pair.price_change.clone().unwrap_or_default();
    rec.price_change_1h = change.h1.unwrap_or(0.0);
    rec.price_change_24h = change.h24.unwrap_or(0.0);

    if let Some(counts) = pair.txns.as_ref().and_then(|t| t.h24.as_ref()) {
        rec.tx_count = counts.buys + counts.sells;
    }

    rec.liquidity_usd = pair
        .liquidity
        .as_ref()
        .and_then(|l| l.usd)
        .unwrap_or(0.0);
    if reference_rate > 0.0 {
        rec.liquidity_sol = rec.liquidity_usd / reference_rate;
    }

    // fdv is the market-cap proxy when the true figure is absent
    rec.market_cap_usd = pair.market_cap.or(pair.fdv).unwrap_or(0.0);
    if reference_rate > 0.0 {
        rec.market_cap_sol = rec.market_cap_usd / reference_rate;
    }

    rec.created_at = pair.pair_created_at.map(|ms| ms / 1000).unwrap_or(0);
    rec.last_updated = chrono::Utc::now().timestamp();

    if let Some(info) = &pair.info {
        rec.image_url = info.image_url.clone();
        rec.website = info
            .websites
            .as_ref()
            .and_then(|w| w.first())
            .map(|w| w.url.clone());
        if let Some(socials) = &info.socials {
            for social in socials {
                match social.kind.as_str() {
                    "twitter" => rec.socials.twitter = Some(social.url.clone()),
                    "telegram" => rec.socials.telegram = Some(social.url.clone()),
                    "discord" => rec.socials.discord = Some(social.url.clone()),
                    _ => {}
                }
            }
        }
    }

    rec.sources.insert(SOURCE_ID.to_string());
    rec
}

pub struct DexScreenerSource {
    client: SourceClient,
}

impl DexScreenerSource {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }

    /// Decode pairs one by one so a single malformed record is skipped
    /// instead of poisoning the whole batch.
    fn decode_pairs(&self, raw: Vec<serde_json::Value>) -> Vec<DsPair> {
        let mut pairs = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<DsPair>(value) {
                Ok(pair) => pairs.push(pair),
                Err(e) => log::warn!("Skipping malformed dexscreener pair: {}", e),
            }
        }
        pairs
    }

    async fn search_pairs(&self, query: &str) -> Result<Vec<DsPair>, SourceError> {
        let url = format!("{}/latest/dex/search?q={}", BASE_URL, query);
        let body: DsSearchResponse = self.client.get_json(&url).await?;
        Ok(self.decode_pairs(body.pairs.unwrap_or_default()))
    }
}

#[async_trait]
impl TokenSource for DexScreenerSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch_tokens(&self, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError> {
        // Most active Solana pairs quoted in SOL
        let pairs = self.search_pairs("SOL").await?;
        Ok(pairs
            .iter()
            .filter(|p| p.chain_id == "solana")
            .map(|p| transform(p, reference_rate))
            .collect())
    }

    async fn fetch_by_address(
        &self,
        address: &str,
        reference_rate: f64,
    ) -> Result<Option<TokenRecord>, SourceError> {
        let url = format!("{}/token-pairs/v1/solana/{}", BASE_URL, address);
        let raw: Vec<serde_json::Value> = self.client.get_json(&url).await?;
        let pairs = self.decode_pairs(raw);

        // Prefer the SOL-quoted pair, matching how prices are denominated
        let pair = pairs
            .iter()
            .find(|p| p.quote_token.symbol == "SOL")
            .or_else(|| pairs.first());
        Ok(pair.map(|p| transform(p, reference_rate)))
    }

    async fn search(
        &self,
        query: &str,
        reference_rate: f64,
    ) -> Result<Vec<TokenRecord>, SourceError> {
        let pairs = self.search_pairs(query).await?;
        Ok(pairs
            .iter()
            .filter(|p| p.chain_id == "solana")
            .map(|p| transform(p, reference_rate))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture_pair() -> DsPair {
        serde_json::from_value(json!({
            "chainId": "solana",
            "dexId": "raydium",
            "pairAddress": "PairAddr111",
            "baseToken": {
                "address": "MintAddr111",
                "name": "Test Token",
                "symbol": "TEST"
            },
            "quoteToken": { "address": "So11111111111111111111111111111111111111112", "symbol": "SOL" },
            "priceNative": "0.0000512",
            "priceUsd": "0.00755",
            "volume": { "h1": 1200.5, "h24": 48000.0 },
            "priceChange": { "h1": 2.4, "h24": -11.8 },
            "txns": { "h24": { "buys": 310, "sells": 205 } },
            "liquidity": { "usd": 95000.0 },
            "fdv": 7_550_000.0,
            "pairCreatedAt": 1_700_000_000_000i64,
            "info": {
                "imageUrl": "https://img.example/test.png",
                "websites": [ { "url": "https://test.example" } ],
                "socials": [
                    { "type": "twitter", "url": "https://x.com/test" },
                    { "type": "telegram", "url": "https://t.me/test" }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_transform_maps_documented_fields() {
        let rec = transform(&fixture_pair(), 150.0);

        assert_eq!(rec.address, "MintAddr111");
        assert_eq!(rec.symbol, "TEST");
        assert_eq!(rec.chain, "solana");
        assert_eq!(rec.protocol, "raydium");
        assert_eq!(rec.pair_address, "PairAddr111");

        // String-typed prices parse; SOL-quoted pair reads priceNative
        assert_eq!(rec.price_usd, 0.00755);
        assert_eq!(rec.price_sol, 0.0000512);

        assert_eq!(rec.volume_1h_usd, 1200.5);
        assert_eq!(rec.volume_24h_usd, 48000.0);
        assert_eq!(rec.volume_usd, 48000.0);
        assert_eq!(rec.price_change_1h, 2.4);
        assert_eq!(rec.price_change_24h, -11.8);

        // Nested txns breakdown sums buys + sells
        assert_eq!(rec.tx_count, 515);

        assert_eq!(rec.liquidity_usd, 95000.0);
        // No marketCap in the payload: fdv is the proxy
        assert_eq!(rec.market_cap_usd, 7_550_000.0);

        // pairCreatedAt is milliseconds
        assert_eq!(rec.created_at, 1_700_000_000);

        assert_eq!(rec.image_url.as_deref(), Some("https://img.example/test.png"));
        assert_eq!(rec.website.as_deref(), Some("https://test.example"));
        assert_eq!(rec.socials.twitter.as_deref(), Some("https://x.com/test"));
        assert_eq!(rec.socials.telegram.as_deref(), Some("https://t.me/test"));
        assert!(rec.socials.discord.is_none());

        assert!(rec.sources.contains(SOURCE_ID));
        assert_eq!(rec.sources.len(), 1);
    }

    #[test]
    fn test_transform_market_cap_prefers_true_figure_over_fdv() {
        let mut pair = fixture_pair();
        pair.market_cap = Some(5_000_000.0);
        let rec = transform(&pair, 150.0);
        assert_eq!(rec.market_cap_usd, 5_000_000.0);
    }

    #[test]
    fn test_transform_derives_sol_price_for_non_sol_quote() {
        let mut pair = fixture_pair();
        pair.quote_token.symbol = "USDC".to_string();
        let rec = transform(&pair, 151.0);
        assert!((rec.price_sol - 0.00755 / 151.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_tolerates_sparse_payload() {
        // Minimal pair with everything optional absent: zeros, no panic
        let pair: DsPair = serde_json::from_value(json!({
            "baseToken": { "address": "MintAddr222", "name": "Bare", "symbol": "BARE" },
            "quoteToken": { "symbol": "SOL" }
        }))
        .unwrap();

        let rec = transform(&pair, 150.0);
        assert_eq!(rec.address, "MintAddr222");
        assert_eq!(rec.price_usd, 0.0);
        assert_eq!(rec.volume_24h_usd, 0.0);
        assert_eq!(rec.tx_count, 0);
        assert_eq!(rec.created_at, 0);
        assert!(rec.image_url.is_none());
    }

    #[test]
    fn test_unparseable_price_reads_as_zero() {
        let mut pair = fixture_pair();
        pair.price_usd = Some("n/a".to_string());
        let rec = transform(&pair, 150.0);
        assert_eq!(rec.price_usd, 0.0);
    }
}
