//! Aggregation engine
//!
//! Owns the canonical record set and orchestrates the fetch-merge-publish
//! cycle:
//! 1. `refresh_all` fans out one fetch per source adapter, tolerating any
//!    subset of failures
//! 2. each fetched record merges into the canonical map under the
//!    prefer-freshest-nonzero policy, emitting events on significant deltas
//! 3. the merged snapshot lands in the cache, where queries read it until
//!    the TTL expires
//!
//! The canonical map only grows: upstream feeds never unlist a token, so no
//! eviction path exists. Readers may observe a partially refreshed set
//! mid-cycle; freshness is favored over read isolation.

pub mod query;

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{token_key, Cache, CacheStats, SNAPSHOT_KEY};
use crate::error::EngineError;
use crate::events::{EventSink, PriceUpdateEvent, TokenEvent, VolumeSpikeEvent};
use crate::sources::{fetch_reference_rate, SourceClient, TokenSource};
use crate::types::{Pagination, SortSpec, TimePeriod, TokenFilter, TokenPage, TokenRecord};

/// Fixed policy constants for delta-triggered events
mod thresholds {
    /// Minimum absolute price move (percent) to publish a price update
    pub const PRICE_UPDATE_MIN_CHANGE_PCT: f64 = 1.0;
    /// Minimum 24h-volume growth (percent) to publish a volume spike
    pub const VOLUME_SPIKE_MIN_GROWTH_PCT: f64 = 50.0;
}

/// Engine statistics for the route layer's stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_tokens: usize,
    /// Sources that succeeded in the last full refresh
    pub active_sources: usize,
    pub source_ids: Vec<String>,
    pub last_refresh: Option<i64>,
    pub reference_rate: f64,
    pub cache: CacheStats,
    pub cache_connected: bool,
}

#[derive(Default)]
struct EngineState {
    records: HashMap<String, TokenRecord>,
    /// Price observed at the previous merge, per address. Compared against
    /// instead of the pre-merge record so a burst of merges within one
    /// refresh does not double-count the same move.
    prev_price: HashMap<String, f64>,
    /// 24h volume observed at the previous merge, per address
    prev_volume: HashMap<String, f64>,
    last_refresh: Option<i64>,
    active_sources: Vec<String>,
    reference_rate: f64,
}

pub struct AggregationEngine {
    sources: Vec<Arc<dyn TokenSource>>,
    cache: Arc<dyn Cache>,
    events: Arc<dyn EventSink>,
    reference: SourceClient,
    cache_ttl: Duration,
    state: Mutex<EngineState>,
}

impl AggregationEngine {
    /// Build an engine. The first source is the primary adapter used for
    /// by-address fallback lookups; search fallbacks go to whichever
    /// sources advertise search support.
    pub fn new(
        sources: Vec<Arc<dyn TokenSource>>,
        cache: Arc<dyn Cache>,
        events: Arc<dyn EventSink>,
        reference: SourceClient,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            sources,
            cache,
            events,
            reference,
            cache_ttl,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// One reference-rate refresh, then one full refresh. The service
    /// cannot start with zero data, so an entirely failed first refresh is
    /// the single loud error in the engine.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.refresh_reference_rate().await;
        self.refresh_all().await;

        let empty = self.state.lock().unwrap().records.is_empty();
        if empty {
            return Err(EngineError::NoInitialData {
                attempted: self.sources.len(),
            });
        }
        Ok(())
    }

    /// Refresh the SOL/USD rate. Best-effort: on failure the last known
    /// rate stays in place and startup is never blocked.
    pub async fn refresh_reference_rate(&self) {
        match fetch_reference_rate(&self.reference).await {
            Ok(rate) if rate > 0.0 => {
                self.state.lock().unwrap().reference_rate = rate;
                log::info!("💱 Reference rate updated: 1 SOL = {:.2} USD", rate);
            }
            Ok(rate) => {
                log::warn!("Ignoring non-positive reference rate {}", rate);
            }
            Err(e) => {
                log::warn!("Reference rate refresh failed, keeping last known: {}", e);
            }
        }
    }

    /// Full multi-source refresh.
    ///
    /// All adapters are fetched concurrently and each outcome is captured
    /// independently; one surviving adapter still produces a valid (if
    /// incomplete) refresh, and zero survivors complete without error.
    pub async fn refresh_all(&self) {
        let started = std::time::Instant::now();
        let rate = self.state.lock().unwrap().reference_rate;

        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move { (source.id(), source.fetch_tokens(rate).await) }
        });
        let outcomes = join_all(fetches).await;

        let mut active = Vec::new();
        let mut merged_count = 0usize;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(records) => {
                    merged_count += records.len();
                    for record in records {
                        self.merge_record(record);
                    }
                    active.push(id.to_string());
                }
                Err(e) => {
                    log::warn!("❌ {} refresh failed: {}", id, e);
                }
            }
        }

        let total = {
            let mut state = self.state.lock().unwrap();
            state.last_refresh = Some(chrono::Utc::now().timestamp());
            state.active_sources = active.clone();
            state.records.len()
        };

        self.write_snapshot().await;

        log::info!(
            "📊 Refresh complete: {} records merged from {}/{} sources, {} total | {}ms",
            merged_count,
            active.len(),
            self.sources.len(),
            total,
            started.elapsed().as_millis()
        );
    }

    /// Merge one incoming record into the canonical set and emit any
    /// triggered events. Returns the canonical record after the merge.
    pub fn merge_record(&self, incoming: TokenRecord) -> TokenRecord {
        let now = chrono::Utc::now().timestamp();
        let (merged, events) = {
            let mut state = self.state.lock().unwrap();
            Self::merge_into(&mut state, incoming, now)
        };

        // Lock released before the synchronous event callbacks run
        for event in events {
            match event {
                TokenEvent::PriceUpdate(ev) => self.events.on_price_update(ev),
                TokenEvent::VolumeSpike(ev) => self.events.on_volume_spike(ev),
                TokenEvent::NewToken(rec) => self.events.on_new_token(rec),
            }
        }
        merged
    }

    fn merge_into(
        state: &mut EngineState,
        incoming: TokenRecord,
        now: i64,
    ) -> (TokenRecord, Vec<TokenEvent>) {
        let address = incoming.address.clone();
        let mut events = Vec::new();

        let merged = match state.records.get(&address) {
            None => {
                let mut record = incoming;
                record.last_updated = now.max(record.last_updated);
                state.records.insert(address.clone(), record.clone());
                events.push(TokenEvent::NewToken(record.clone()));
                record
            }
            Some(existing) => {
                let merged = merge_fields(existing, &incoming, now);

                let prev_price = state.prev_price.get(&address).copied().unwrap_or(0.0);
                if prev_price > 0.0 && merged.price_usd > 0.0 {
                    let percent = (merged.price_usd - prev_price) / prev_price * 100.0;
                    if percent.abs() >= thresholds::PRICE_UPDATE_MIN_CHANGE_PCT {
                        events.push(TokenEvent::PriceUpdate(PriceUpdateEvent {
                            address: address.clone(),
                            old_price: prev_price,
                            new_price: merged.price_usd,
                            percent_change: percent,
                            volume_24h: merged.volume_24h_usd,
                        }));
                    }
                }

                let prev_volume = state.prev_volume.get(&address).copied().unwrap_or(0.0);
                if prev_volume > 0.0 && merged.volume_24h_usd > 0.0 {
                    let growth = (merged.volume_24h_usd - prev_volume) / prev_volume * 100.0;
                    if growth >= thresholds::VOLUME_SPIKE_MIN_GROWTH_PCT {
                        events.push(TokenEvent::VolumeSpike(VolumeSpikeEvent {
                            address: address.clone(),
                            symbol: merged.symbol.clone(),
                            percent_change: growth,
                            current_volume: merged.volume_24h_usd,
                            previous_volume: prev_volume,
                            window: TimePeriod::H24.label().to_string(),
                        }));
                    }
                }

                state.records.insert(address.clone(), merged.clone());
                merged
            }
        };

        // Updated after event evaluation: the next merge compares against
        // this one, not against the last query
        state.prev_price.insert(address.clone(), merged.price_usd);
        state
            .prev_volume
            .insert(address, merged.volume_24h_usd);

        (merged, events)
    }

    /// Filtered, sorted, paginated view. Served from the cached snapshot
    /// when one is live, otherwise from the canonical set.
    pub async fn query(
        &self,
        filter: &TokenFilter,
        sort: SortSpec,
        page: &Pagination,
    ) -> TokenPage {
        let (records, cache_hit) = match self.cache.get(SNAPSHOT_KEY).await {
            Some(json) => match serde_json::from_str::<Vec<TokenRecord>>(&json) {
                Ok(records) => (records, true),
                Err(e) => {
                    log::warn!("Discarding undecodable cached snapshot: {}", e);
                    (self.all_records(), false)
                }
            },
            None => (self.all_records(), false),
        };

        let mut filtered = query::apply_filter(records, filter);
        query::sort_records(&mut filtered, sort, filter.period);
        query::paginate(filtered, page, cache_hit)
    }

    /// Single-token lookup: cache, then canonical set, then one best-effort
    /// by-address fetch against the primary source.
    pub async fn lookup(&self, address: &str) -> Option<TokenRecord> {
        if let Some(json) = self.cache.get(&token_key(address)).await {
            if let Ok(record) = serde_json::from_str::<TokenRecord>(&json) {
                return Some(record);
            }
        }

        let known = self.state.lock().unwrap().records.get(address).cloned();
        if let Some(record) = known {
            self.cache_record(&record).await;
            return Some(record);
        }

        let rate = self.state.lock().unwrap().reference_rate;
        let primary = self.sources.first()?;
        match primary.fetch_by_address(address, rate).await {
            Ok(Some(record)) => {
                let merged = self.merge_record(record);
                self.cache_record(&merged).await;
                Some(merged)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Fallback lookup for {} failed: {}", address, e);
                None
            }
        }
    }

    /// Substring search. When the canonical set comes up short, the
    /// search-capable sources are queried concurrently, their hits merged,
    /// and the canonical set re-filtered.
    pub async fn search(&self, query_text: &str, limit: usize) -> Vec<TokenRecord> {
        let needle = query_text.to_lowercase();
        let local = self.matching_records(&needle, limit);
        if local.len() >= limit {
            return local;
        }

        let rate = self.state.lock().unwrap().reference_rate;
        let searchers: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.supports_search())
            .map(Arc::clone)
            .collect();
        let fetches = searchers.iter().map(|source| {
            let source = Arc::clone(source);
            let query_text = query_text.to_string();
            async move { (source.id(), source.search(&query_text, rate).await) }
        });

        for (id, outcome) in join_all(fetches).await {
            match outcome {
                Ok(records) => {
                    for record in records {
                        self.merge_record(record);
                    }
                }
                Err(e) => log::debug!("Search against {} failed: {}", id, e),
            }
        }

        self.matching_records(&needle, limit)
    }

    /// Full record list for the periodic broadcast
    pub fn get_all(&self) -> Vec<TokenRecord> {
        self.all_records()
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.lock().unwrap();
        EngineStats {
            total_tokens: state.records.len(),
            active_sources: state.active_sources.len(),
            source_ids: state.active_sources.clone(),
            last_refresh: state.last_refresh,
            reference_rate: state.reference_rate,
            cache: self.cache.stats(),
            cache_connected: self.cache.is_connected(),
        }
    }

    /// Drop every record, the previous-observed maps, and the cache.
    /// The only path that shrinks a record's source set.
    pub async fn flush(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.records.clear();
            state.prev_price.clear();
            state.prev_volume.clear();
            state.active_sources.clear();
        }
        self.cache.flush().await;
        log::info!("🧹 Canonical set and cache flushed");
    }

    fn all_records(&self) -> Vec<TokenRecord> {
        self.state.lock().unwrap().records.values().cloned().collect()
    }

    fn matching_records(&self, needle_lower: &str, limit: usize) -> Vec<TokenRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.matches_text(needle_lower))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn cache_record(&self, record: &TokenRecord) {
        match serde_json::to_string(record) {
            Ok(json) => {
                self.cache
                    .set(&token_key(&record.address), json, self.cache_ttl)
                    .await
            }
            Err(e) => log::warn!("Failed to serialize record for cache: {}", e),
        }
    }

    async fn write_snapshot(&self) {
        let records = self.all_records();
        match serde_json::to_string(&records) {
            Ok(json) => self.cache.set(SNAPSHOT_KEY, json, self.cache_ttl).await,
            Err(e) => log::warn!("Failed to serialize snapshot for cache: {}", e),
        }
    }
}

/// Field-level merge of an incoming record into the existing one.
///
/// Numeric fields take the incoming value unless it is zero; `tx_count`
/// takes the max; identity strings take a non-empty incoming value;
/// optional metadata prefers incoming-if-present; socials merge shallowly;
/// `sources` is the set union. `last_updated` never decreases.
fn merge_fields(existing: &TokenRecord, incoming: &TokenRecord, now: i64) -> TokenRecord {
    fn pick(incoming: f64, existing: f64) -> f64 {
        if incoming != 0.0 {
            incoming
        } else {
            existing
        }
    }

    fn pick_str(incoming: &str, existing: &str) -> String {
        if !incoming.is_empty() {
            incoming.to_string()
        } else {
            existing.to_string()
        }
    }

    let mut sources = existing.sources.clone();
    sources.extend(incoming.sources.iter().cloned());

    TokenRecord {
        address: existing.address.clone(),
        name: pick_str(&incoming.name, &existing.name),
        symbol: pick_str(&incoming.symbol, &existing.symbol),
        chain: pick_str(&incoming.chain, &existing.chain),
        protocol: pick_str(&incoming.protocol, &existing.protocol),
        pair_address: pick_str(&incoming.pair_address, &existing.pair_address),

        price_sol: pick(incoming.price_sol, existing.price_sol),
        price_usd: pick(incoming.price_usd, existing.price_usd),
        market_cap_sol: pick(incoming.market_cap_sol, existing.market_cap_sol),
        market_cap_usd: pick(incoming.market_cap_usd, existing.market_cap_usd),
        volume_sol: pick(incoming.volume_sol, existing.volume_sol),
        volume_usd: pick(incoming.volume_usd, existing.volume_usd),
        volume_1h_usd: pick(incoming.volume_1h_usd, existing.volume_1h_usd),
        volume_24h_usd: pick(incoming.volume_24h_usd, existing.volume_24h_usd),
        volume_7d_usd: pick(incoming.volume_7d_usd, existing.volume_7d_usd),

        tx_count: existing.tx_count.max(incoming.tx_count),

        price_change_1h: pick(incoming.price_change_1h, existing.price_change_1h),
        price_change_24h: pick(incoming.price_change_24h, existing.price_change_24h),
        price_change_7d: pick(incoming.price_change_7d, existing.price_change_7d),

        liquidity_sol: pick(incoming.liquidity_sol, existing.liquidity_sol),
        liquidity_usd: pick(incoming.liquidity_usd, existing.liquidity_usd),

        created_at: if incoming.created_at != 0 {
            incoming.created_at
        } else {
            existing.created_at
        },
        last_updated: now.max(existing.last_updated),

        image_url: incoming.image_url.clone().or_else(|| existing.image_url.clone()),
        website: incoming.website.clone().or_else(|| existing.website.clone()),
        socials: existing.socials.merged_with(&incoming.socials),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::events::EventSink;
    use crate::limiter::RateLimiter;
    use crate::retry::RetryPolicy;

    /// Sink that records everything it sees
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TokenEvent>>,
    }

    impl RecordingSink {
        fn drain(&self) -> Vec<TokenEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl EventSink for RecordingSink {
        fn on_price_update(&self, event: PriceUpdateEvent) {
            self.events
                .lock()
                .unwrap()
                .push(TokenEvent::PriceUpdate(event));
        }
        fn on_volume_spike(&self, event: VolumeSpikeEvent) {
            self.events
                .lock()
                .unwrap()
                .push(TokenEvent::VolumeSpike(event));
        }
        fn on_new_token(&self, record: TokenRecord) {
            self.events.lock().unwrap().push(TokenEvent::NewToken(record));
        }
    }

    fn reference_client() -> SourceClient {
        SourceClient::new(
            "coingecko",
            RateLimiter::new(5, 60),
            RetryPolicy {
                max_attempts: 1,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
            Duration::from_millis(200),
        )
        .unwrap()
    }

    fn test_engine(sources: Vec<Arc<dyn TokenSource>>) -> (AggregationEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = AggregationEngine::new(
            sources,
            Arc::new(MemoryCache::new()),
            sink.clone(),
            reference_client(),
            Duration::from_secs(60),
        );
        (engine, sink)
    }

    fn record(address: &str, source: &str) -> TokenRecord {
        let mut rec = TokenRecord::empty(address);
        rec.sources.insert(source.to_string());
        rec
    }

    #[test]
    fn test_first_sighting_inserts_and_emits_new_token() {
        let (engine, sink) = test_engine(vec![]);

        let mut rec = record("mintA", "dexscreener");
        rec.price_usd = 1.0;
        engine.merge_record(rec);

        let all = engine.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].sources.len(), 1);

        let events = sink.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TokenEvent::NewToken(r) if r.address == "mintA"));
    }

    #[test]
    fn test_prefer_nonzero_merge_law() {
        // Incoming wins when non-zero; existing survives an incoming zero
        let mut existing = record("mintA", "a");
        existing.price_usd = 2.0;
        existing.liquidity_usd = 5000.0;
        existing.volume_7d_usd = 111.0;

        let mut incoming = record("mintA", "b");
        incoming.price_usd = 3.0; // non-zero: overwrites
        incoming.liquidity_usd = 0.0; // zero: existing retained
        incoming.volume_24h_usd = 42.0;

        let merged = merge_fields(&existing, &incoming, 1000);
        assert_eq!(merged.price_usd, 3.0);
        assert_eq!(merged.liquidity_usd, 5000.0);
        assert_eq!(merged.volume_24h_usd, 42.0);
        assert_eq!(merged.volume_7d_usd, 111.0);
    }

    #[test]
    fn test_tx_count_takes_max() {
        let mut existing = record("mintA", "a");
        existing.tx_count = 500;
        let mut incoming = record("mintA", "b");
        incoming.tx_count = 300;

        // Lower incoming count does not regress the total
        assert_eq!(merge_fields(&existing, &incoming, 0).tx_count, 500);

        incoming.tx_count = 800;
        assert_eq!(merge_fields(&existing, &incoming, 0).tx_count, 800);
    }

    #[test]
    fn test_sources_union() {
        let mut existing = record("mintA", "a");
        existing.sources.insert("b".to_string());
        let incoming = record("mintA", "c");

        let merged = merge_fields(&existing, &incoming, 0);
        assert_eq!(merged.sources.len(), 3);
        for id in ["a", "b", "c"] {
            assert!(merged.sources.contains(id));
        }
    }

    #[test]
    fn test_metadata_prefers_incoming_when_present() {
        let mut existing = record("mintA", "a");
        existing.image_url = Some("old.png".into());
        existing.website = Some("old.example".into());

        let mut incoming = record("mintA", "b");
        incoming.image_url = Some("new.png".into());

        let merged = merge_fields(&existing, &incoming, 0);
        assert_eq!(merged.image_url.as_deref(), Some("new.png"));
        assert_eq!(merged.website.as_deref(), Some("old.example"));
    }

    #[test]
    fn test_merge_idempotent_on_equal_input() {
        let (engine, sink) = test_engine(vec![]);

        let mut rec = record("mintA", "dexscreener");
        rec.price_usd = 1.5;
        rec.volume_24h_usd = 10_000.0;
        rec.tx_count = 77;

        let first = engine.merge_record(rec.clone());
        sink.drain();
        let second = engine.merge_record(rec);

        // Same input twice: nothing changes but last_updated, and the
        // source set already contains the contributor
        assert_eq!(second.price_usd, first.price_usd);
        assert_eq!(second.volume_24h_usd, first.volume_24h_usd);
        assert_eq!(second.tx_count, first.tx_count);
        assert_eq!(second.sources, first.sources);
        assert!(second.last_updated >= first.last_updated);

        // Price unchanged, volume unchanged: no delta events
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_price_update_threshold_exactness() {
        let (engine, sink) = test_engine(vec![]);

        let mut rec = record("mintA", "a");
        rec.price_usd = 100.0;
        engine.merge_record(rec.clone());
        sink.drain();

        // 0.99% move: below threshold, no event
        rec.price_usd = 100.99;
        engine.merge_record(rec.clone());
        assert!(sink
            .drain()
            .iter()
            .all(|e| !matches!(e, TokenEvent::PriceUpdate(_))));

        // Exactly 1.0% from the last merge (100.99 -> 102.0 is < 1%, so
        // reset the base first)
        let (engine, sink) = test_engine(vec![]);
        let mut rec = record("mintB", "a");
        rec.price_usd = 100.0;
        engine.merge_record(rec.clone());
        sink.drain();

        rec.price_usd = 101.0;
        engine.merge_record(rec);
        let events = sink.drain();
        let update = events
            .iter()
            .find_map(|e| match e {
                TokenEvent::PriceUpdate(ev) => Some(ev),
                _ => None,
            })
            .expect("a 1.0% move must emit a price update");
        assert_eq!(update.old_price, 100.0);
        assert_eq!(update.new_price, 101.0);
        assert!((update.percent_change - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_spike_threshold_exactness() {
        let (engine, sink) = test_engine(vec![]);

        let mut rec = record("mintA", "a");
        rec.volume_24h_usd = 1000.0;
        engine.merge_record(rec.clone());
        sink.drain();

        // +49%: no spike
        rec.volume_24h_usd = 1490.0;
        engine.merge_record(rec.clone());
        assert!(sink
            .drain()
            .iter()
            .all(|e| !matches!(e, TokenEvent::VolumeSpike(_))));

        // +50% exactly from the last merge: 1490 * 1.5 = 2235
        rec.volume_24h_usd = 2235.0;
        engine.merge_record(rec);
        let events = sink.drain();
        let spike = events
            .iter()
            .find_map(|e| match e {
                TokenEvent::VolumeSpike(ev) => Some(ev),
                _ => None,
            })
            .expect("a 50% volume increase must emit a spike");
        assert_eq!(spike.previous_volume, 1490.0);
        assert_eq!(spike.current_volume, 2235.0);
        assert_eq!(spike.window, "24h");
    }

    #[test]
    fn test_thresholds_compare_against_last_merge_not_last_event() {
        // Two sub-threshold moves that sum past 1% must not fire: each
        // merge rebases the previous-observed price
        let (engine, sink) = test_engine(vec![]);

        let mut rec = record("mintA", "a");
        rec.price_usd = 100.0;
        engine.merge_record(rec.clone());
        rec.price_usd = 100.6;
        engine.merge_record(rec.clone());
        rec.price_usd = 101.2;
        engine.merge_record(rec);

        assert!(sink
            .drain()
            .iter()
            .all(|e| !matches!(e, TokenEvent::PriceUpdate(_))));
    }

    #[test]
    fn test_zero_price_never_triggers_events() {
        let (engine, sink) = test_engine(vec![]);

        // Existing price unknown: a first real price is not a "move"
        let mut rec = record("mintA", "a");
        rec.price_usd = 0.0;
        engine.merge_record(rec.clone());
        sink.drain();

        rec.price_usd = 5.0;
        engine.merge_record(rec);
        assert!(sink
            .drain()
            .iter()
            .all(|e| !matches!(e, TokenEvent::PriceUpdate(_))));
    }

    #[tokio::test]
    async fn test_query_reports_cache_hit() {
        let (engine, _sink) = test_engine(vec![]);

        let mut rec = record("mintA", "a");
        rec.volume_24h_usd = 10.0;
        engine.merge_record(rec);

        // Nothing cached yet: served from the canonical set
        let page = engine
            .query(&TokenFilter::default(), SortSpec::default(), &Pagination::default())
            .await;
        assert!(!page.cache_hit);
        assert_eq!(page.total, 1);

        // Snapshot written: the next query comes from cache
        engine.write_snapshot().await;
        let page = engine
            .query(&TokenFilter::default(), SortSpec::default(), &Pagination::default())
            .await;
        assert!(page.cache_hit);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_flush_clears_state_and_sources() {
        let (engine, _sink) = test_engine(vec![]);
        engine.merge_record(record("mintA", "a"));
        engine.write_snapshot().await;

        engine.flush().await;
        assert!(engine.get_all().is_empty());
        let page = engine
            .query(&TokenFilter::default(), SortSpec::default(), &Pagination::default())
            .await;
        assert_eq!(page.total, 0);
        assert!(!page.cache_hit);
    }
}
