//! Core data types for the aggregation service
//!
//! `TokenRecord` is the unified view of one tradable token merged across all
//! upstream sources. Query types (`TokenFilter`, `SortSpec`, `Pagination`)
//! are the value objects the route layer hands to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Social links attached to a token, merged field-by-field across sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub discord: Option<String>,
}

impl SocialLinks {
    /// Shallow merge: a field set on `incoming` overrides the same field here,
    /// unset fields keep their existing value.
    pub fn merged_with(&self, incoming: &SocialLinks) -> SocialLinks {
        SocialLinks {
            twitter: incoming.twitter.clone().or_else(|| self.twitter.clone()),
            telegram: incoming.telegram.clone().or_else(|| self.telegram.clone()),
            discord: incoming.discord.clone().or_else(|| self.discord.clone()),
        }
    }
}

/// Unified token record, keyed by mint address
///
/// One record exists per address in the canonical set. Numeric fields carry
/// zero when no source has reported them yet; the merge step treats zero as
/// "absent" and never lets it overwrite a known value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Mint address (unique key across the whole system)
    pub address: String,
    pub name: String,
    pub symbol: String,
    /// Originating chain identifier (e.g. "solana")
    pub chain: String,
    /// Primary venue/protocol (e.g. "raydium", "pumpswap")
    pub protocol: String,
    pub pair_address: String,

    pub price_sol: f64,
    pub price_usd: f64,

    pub market_cap_sol: f64,
    pub market_cap_usd: f64,

    pub volume_sol: f64,
    pub volume_usd: f64,
    pub volume_1h_usd: f64,
    pub volume_24h_usd: f64,
    pub volume_7d_usd: f64,

    /// Total trade count (buys + sells); merged with max, not prefer-nonzero
    pub tx_count: u64,

    pub price_change_1h: f64,
    pub price_change_24h: f64,
    pub price_change_7d: f64,

    pub liquidity_sol: f64,
    pub liquidity_usd: f64,

    /// Pair/pool creation time, epoch seconds (0 when unknown)
    pub created_at: i64,
    /// Last merge touching this record, epoch seconds
    pub last_updated: i64,

    pub image_url: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub socials: SocialLinks,

    /// Source identifiers that have contributed to this record.
    /// Monotonically non-shrinking across merges.
    #[serde(default)]
    pub sources: BTreeSet<String>,
}

impl TokenRecord {
    /// Empty record for an address; all numerics zero, all metadata unset.
    pub fn empty(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: String::new(),
            symbol: String::new(),
            chain: String::new(),
            protocol: String::new(),
            pair_address: String::new(),
            price_sol: 0.0,
            price_usd: 0.0,
            market_cap_sol: 0.0,
            market_cap_usd: 0.0,
            volume_sol: 0.0,
            volume_usd: 0.0,
            volume_1h_usd: 0.0,
            volume_24h_usd: 0.0,
            volume_7d_usd: 0.0,
            tx_count: 0,
            price_change_1h: 0.0,
            price_change_24h: 0.0,
            price_change_7d: 0.0,
            liquidity_sol: 0.0,
            liquidity_usd: 0.0,
            created_at: 0,
            last_updated: 0,
            image_url: None,
            website: None,
            socials: SocialLinks::default(),
            sources: BTreeSet::new(),
        }
    }

    /// Volume for the requested window, falling back to the generic USD
    /// volume when the window-specific figure is zero.
    pub fn volume_for(&self, period: TimePeriod) -> f64 {
        let v = match period {
            TimePeriod::H1 => self.volume_1h_usd,
            TimePeriod::H24 => self.volume_24h_usd,
            TimePeriod::D7 => self.volume_7d_usd,
        };
        if v != 0.0 {
            v
        } else {
            self.volume_usd
        }
    }

    /// Price change for the requested window, falling back to the 24h figure
    /// when the window-specific one is zero.
    pub fn price_change_for(&self, period: TimePeriod) -> f64 {
        let p = match period {
            TimePeriod::H1 => self.price_change_1h,
            TimePeriod::H24 => self.price_change_24h,
            TimePeriod::D7 => self.price_change_7d,
        };
        if p != 0.0 {
            p
        } else {
            self.price_change_24h
        }
    }

    /// Case-insensitive substring match against name, symbol, and address
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.symbol.to_lowercase().contains(needle_lower)
            || self.address.to_lowercase().contains(needle_lower)
    }
}

/// Time window selector for volume/price-change reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriod {
    H1,
    H24,
    D7,
}

impl TimePeriod {
    /// Parse a query value. Accepts exactly "1h", "24h", "7d";
    /// anything else defaults to 24h.
    pub fn parse(s: &str) -> Self {
        match s {
            "1h" => TimePeriod::H1,
            "7d" => TimePeriod::D7,
            _ => TimePeriod::H24,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimePeriod::H1 => "1h",
            TimePeriod::H24 => "24h",
            TimePeriod::D7 => "7d",
        }
    }
}

impl Default for TimePeriod {
    fn default() -> Self {
        TimePeriod::H24
    }
}

/// Sortable fields for token queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    Volume,
    PriceChange,
    MarketCap,
    Liquidity,
    TxCount,
    CreatedAt,
}

impl SortField {
    /// Parse a query value; unrecognized fields default to volume.
    pub fn parse(s: &str) -> Self {
        match s {
            "price_change" | "priceChange" => SortField::PriceChange,
            "market_cap" | "marketCap" => SortField::MarketCap,
            "liquidity" => SortField::Liquidity,
            "tx_count" | "txCount" | "transactions" => SortField::TxCount,
            "created_at" | "createdAt" | "age" => SortField::CreatedAt,
            _ => SortField::Volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Self {
        match s {
            "asc" => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

/// Sort specification: field plus direction
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Volume,
            direction: SortDirection::Desc,
        }
    }
}

/// Filter constraints for token queries. All fields optional, AND-combined.
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
    pub min_liquidity: Option<f64>,
    /// Protocol equality, case-insensitive
    pub protocol: Option<String>,
    /// Chain equality, case-insensitive
    pub chain: Option<String>,
    /// Free-text substring match against name/symbol/address
    pub search: Option<String>,
    /// Window the volume/price-change constraints and sorts read from
    pub period: TimePeriod,
}

/// Page request. The cursor is opaque to callers; it encodes a positional
/// offset into the filtered+sorted sequence, so any mutation of the
/// underlying set between requests can shift page boundaries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub limit: usize,
    pub cursor: Option<String>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            cursor: None,
        }
    }
}

/// One page of query results plus navigation cursors
#[derive(Debug, Clone, Serialize)]
pub struct TokenPage {
    pub tokens: Vec<TokenRecord>,
    /// Total records matching the filter (before pagination)
    pub total: usize,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    /// True when the page was served from a cached snapshot
    pub cache_hit: bool,
}
