//! GeckoTerminal API integration (aggregator/discovery source)
//!
//! ## API Reference
//!
//! - Trending: `https://api.geckoterminal.com/api/v2/networks/solana/trending_pools`
//! - New pools: `https://api.geckoterminal.com/api/v2/networks/solana/new_pools`
//! - Search: `https://api.geckoterminal.com/api/v2/search/pools?query={q}&network=solana`
//!
//! JSON:API envelope: each pool carries string-typed numerics in
//! `attributes` and the base token mint in `relationships` as
//! `"solana_{mint}"`. `market_cap_usd` is frequently null, in which case
//! `fdv_usd` serves as the market-cap proxy. There is no by-address token
//! endpoint here; lookups stay with the primary source.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_num, SourceClient, TokenSource};
use crate::error::SourceError;
use crate::types::TokenRecord;

pub const SOURCE_ID: &str = "geckoterminal";

const BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

#[derive(Debug, Deserialize)]
struct GtEnvelope {
    data: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtPool {
    pub attributes: GtAttributes,
    pub relationships: Option<GtRelationships>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtAttributes {
    /// Pair label, e.g. "WIF / SOL"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub base_token_price_usd: Option<String>,
    pub base_token_price_native_currency: Option<String>,
    /// RFC 3339 timestamp
    pub pool_created_at: Option<String>,
    pub reserve_in_usd: Option<String>,
    pub fdv_usd: Option<String>,
    pub market_cap_usd: Option<String>,
    pub price_change_percentage: Option<GtWindowsStr>,
    pub transactions: Option<GtTransactions>,
    pub volume_usd: Option<GtWindowsStr>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GtWindowsStr {
    pub h1: Option<String>,
    pub h24: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtTransactions {
    pub h24: Option<GtTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtTxnCounts {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtRelationships {
    pub base_token: Option<GtRef>,
    pub dex: Option<GtRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtRef {
    pub data: Option<GtRefData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GtRefData {
    #[serde(default)]
    pub id: String,
}

fn relationship_id(rel: Option<&GtRef>) -> Option<&str> {
    rel.and_then(|r| r.data.as_ref()).map(|d| d.id.as_str())
}

/// Map a GeckoTerminal pool onto the unified record. Pure function.
///
/// Returns `None` when the base-token relationship is missing, which is the
/// one field the record cannot exist without.
pub fn transform(pool: &GtPool, reference_rate: f64) -> Option<TokenRecord> {
    let relationships = pool.relationships.as_ref()?;
    let token_id = relationship_id(relationships.base_token.as_ref())?;
    // Relationship ids are network-prefixed: "solana_{mint}"
    let address = token_id.strip_prefix("solana_").unwrap_or(token_id);

    let attrs = &pool.attributes;
    let mut rec = TokenRecord::empty(address);

    // The pool name is "BASE / QUOTE"; the base symbol is all we get
    let base_symbol = attrs.name.split(" / ").next().unwrap_or("").trim();
    rec.name = base_symbol.to_string();
    rec.symbol = base_symbol.to_string();
    rec.chain = "solana".to_string();
    rec.protocol = relationship_id(relationships.dex.as_ref())
        .unwrap_or("")
        .to_string();
    rec.pair_address = attrs.address.clone();

    rec.price_usd = parse_num(attrs.base_token_price_usd.as_deref());
    rec.price_sol = parse_num(attrs.base_token_price_native_currency.as_deref());
    if rec.price_sol == 0.0 && reference_rate > 0.0 {
        rec.price_sol = rec.price_usd / reference_rate;
    }

    let volume = attrs.volume_usd.clone().unwrap_or_default();
    rec.volume_1h_usd = parse_num(volume.h1.as_deref());
    rec.volume_24h_usd = parse_num(volume.h24.as_deref());
    rec.volume_usd = rec.volume_24h_usd;
    if reference_rate > 0.0 {
        rec.volume_sol = rec.volume_usd / reference_rate;
    }

    let change = attrs.price_change_percentage.clone().unwrap_or_default();
    rec.price_change_1h = parse_num(change.h1.as_deref());
    rec.price_change_24h = parse_num(change.h24.as_deref());

    if let Some(counts) = attrs.transactions.as_ref().and_then(|t| t.h24.as_ref()) {
        rec.tx_count = counts.buys + counts.sells;
    }

    rec.liquidity_usd = parse_num(attrs.reserve_in_usd.as_deref());
    if reference_rate > 0.0 {
        rec.liquidity_sol = rec.liquidity_usd / reference_rate;
    }

    // market_cap_usd is null for most young tokens; fdv is the proxy
    rec.market_cap_usd = match parse_num(attrs.market_cap_usd.as_deref()) {
        v if v != 0.0 => v,
        _ => parse_num(attrs.fdv_usd.as_deref()),
    };
    if reference_rate > 0.0 {
        rec.market_cap_sol = rec.market_cap_usd / reference_rate;
    }

    rec.created_at = attrs
        .pool_created_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0);
    rec.last_updated = chrono::Utc::now().timestamp();

    rec.sources.insert(SOURCE_ID.to_string());
    Some(rec)
}

pub struct GeckoTerminalSource {
    client: SourceClient,
}

impl GeckoTerminalSource {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }

    async fn fetch_pools(&self, url: &str, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError> {
        let body: GtEnvelope = self.client.get_json(url).await?;
        let mut records = Vec::new();
        for value in body.data.unwrap_or_default() {
            match serde_json::from_value::<GtPool>(value) {
                Ok(pool) => {
                    if let Some(rec) = transform(&pool, reference_rate) {
                        records.push(rec);
                    }
                }
                Err(e) => log::warn!("Skipping malformed geckoterminal pool: {}", e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TokenSource for GeckoTerminalSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch_tokens(&self, reference_rate: f64) -> Result<Vec<TokenRecord>, SourceError> {
        // Trending pools for the actively traded set, new pools for discovery
        let trending = self
            .fetch_pools(
                &format!("{}/networks/solana/trending_pools", BASE_URL),
                reference_rate,
            )
            .await?;
        let fresh = self
            .fetch_pools(
                &format!("{}/networks/solana/new_pools", BASE_URL),
                reference_rate,
            )
            .await?;

        let mut records = trending;
        records.extend(fresh);
        Ok(records)
    }

    async fn fetch_by_address(
        &self,
        _address: &str,
        _reference_rate: f64,
    ) -> Result<Option<TokenRecord>, SourceError> {
        Err(SourceError::Unsupported {
            source_id: SOURCE_ID,
            operation: "fetch_by_address",
        })
    }

    async fn search(
        &self,
        query: &str,
        reference_rate: f64,
    ) -> Result<Vec<TokenRecord>, SourceError> {
        let url = format!("{}/search/pools?query={}&network=solana", BASE_URL, query);
        self.fetch_pools(&url, reference_rate).await
    }
}
