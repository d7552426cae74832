//! # Tokenflow
//!
//! Token-market aggregation service for Solana. Pulls pair and pool data
//! from DexScreener, GeckoTerminal, and Raydium, merges records per mint
//! address under a prefer-freshest-nonzero policy, detects significant
//! price/volume deltas, and serves filterable, sortable, paginated views
//! backed by a TTL cache (in-process or Redis).
//!
//! ## Architecture
//!
//! ```text
//! Scheduler
//!     ↓
//! AggregationEngine::refresh_all()
//!     ↓ (parallel, per-source rate limit + retry)
//! DexScreener | GeckoTerminal | Raydium
//!     ↓ transform → TokenRecord
//! merge into canonical set ──→ EventSink (price update / volume spike / new token)
//!     ↓
//! Cache snapshot ──→ query / lookup / search / broadcast
//! ```
//!
//! The HTTP route layer and the pub/sub transport live outside this crate:
//! routes call the engine's query methods, and the transport consumes the
//! `TokenEvent` stream from `ChannelEventSink`.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod limiter;
pub mod retry;
pub mod scheduler;
pub mod sources;
pub mod types;

pub use cache::{Cache, CacheStats, MemoryCache, RedisCache};
pub use config::AppConfig;
pub use engine::{AggregationEngine, EngineStats};
pub use error::{EngineError, SourceError};
pub use events::{ChannelEventSink, EventSink, NullEventSink, TokenEvent};
pub use limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use sources::{
    DexScreenerSource, GeckoTerminalSource, RaydiumSource, SourceClient, TokenSource,
};
pub use types::{
    Pagination, SortDirection, SortField, SortSpec, TimePeriod, TokenFilter, TokenPage,
    TokenRecord,
};
