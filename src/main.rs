use std::sync::Arc;
use std::time::Duration;

use tokenflow::cache::{Cache, MemoryCache, RedisCache};
use tokenflow::config::AppConfig;
use tokenflow::engine::AggregationEngine;
use tokenflow::events::{ChannelEventSink, TokenEvent};
use tokenflow::limiter::RateLimiter;
use tokenflow::retry::RetryPolicy;
use tokenflow::sources::{
    dexscreener, geckoterminal, raydium, DexScreenerSource, GeckoTerminalSource, RaydiumSource,
    SourceClient, TokenSource,
};
use tokenflow::scheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    log::info!("🚀 Starting tokenflow...");
    log::info!("📊 Configuration:");
    log::info!("   Refresh interval: {}ms", config.refresh_interval_ms);
    log::info!("   Broadcast interval: {}ms", config.broadcast_interval_ms);
    log::info!(
        "   Cache: {} (TTL {}s)",
        config.cache_backend,
        config.cache_ttl_secs
    );

    // Cache backend, explicitly constructed and injected. A dead Redis is
    // downgraded to the in-process map; the cache is never a hard
    // dependency.
    let cache: Arc<dyn Cache> = match config.cache_backend.as_str() {
        "redis" => match RedisCache::connect(&config.redis_url) {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                log::warn!(
                    "Redis unavailable ({}), falling back to in-memory cache",
                    e
                );
                memory_cache(&config)
            }
        },
        _ => memory_cache(&config),
    };

    let retry = RetryPolicy {
        max_attempts: config.retry_max_attempts,
        base_delay_ms: config.retry_base_delay_ms,
        max_delay_ms: config.retry_max_delay_ms,
    };
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let sources: Vec<Arc<dyn TokenSource>> = vec![
        Arc::new(DexScreenerSource::new(SourceClient::new(
            dexscreener::SOURCE_ID,
            RateLimiter::new(config.dexscreener_rate_limit, 60),
            retry.clone(),
            timeout,
        )?)),
        Arc::new(GeckoTerminalSource::new(SourceClient::new(
            geckoterminal::SOURCE_ID,
            RateLimiter::new(config.geckoterminal_rate_limit, 60),
            retry.clone(),
            timeout,
        )?)),
        Arc::new(RaydiumSource::new(SourceClient::new(
            raydium::SOURCE_ID,
            RateLimiter::new(config.raydium_rate_limit, 60),
            retry.clone(),
            timeout,
        )?)),
    ];

    let reference = SourceClient::new(
        "coingecko",
        RateLimiter::new(config.coingecko_rate_limit, 60),
        retry,
        timeout,
    )?;

    let (sink, mut events_rx) = ChannelEventSink::new();
    let engine = Arc::new(AggregationEngine::new(
        sources,
        cache,
        Arc::new(sink),
        reference,
        Duration::from_secs(config.cache_ttl_secs),
    ));

    // Fails loudly only when the very first refresh yields no data at all
    engine.initialize().await?;
    log::info!("✅ Initial refresh complete: {} tokens", engine.stats().total_tokens);

    // Outbound event consumer; the pub/sub transport attaches here
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match &event {
                TokenEvent::PriceUpdate(ev) => log::info!(
                    "📣 price-update {} {:.6} -> {:.6} ({:+.2}%)",
                    ev.address,
                    ev.old_price,
                    ev.new_price,
                    ev.percent_change
                ),
                TokenEvent::VolumeSpike(ev) => log::info!(
                    "🚨 volume-spike {} ({}) +{:.1}% [{}]",
                    ev.address,
                    ev.symbol,
                    ev.percent_change,
                    ev.window
                ),
                TokenEvent::NewToken(rec) => {
                    log::info!("🆕 new-token {} ({})", rec.address, rec.symbol)
                }
            }
        }
    });

    tokio::spawn(scheduler::refresh_task(
        Arc::clone(&engine),
        config.refresh_interval_ms,
    ));
    tokio::spawn(scheduler::broadcast_task(
        Arc::clone(&engine),
        config.broadcast_interval_ms,
        |records| log::debug!("📡 Broadcasting {} records", records.len()),
    ));

    log::info!("✅ tokenflow running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    log::info!("👋 Shutting down");
    Ok(())
}

fn memory_cache(config: &AppConfig) -> Arc<dyn Cache> {
    let cache = Arc::new(MemoryCache::new());
    cache.spawn_sweeper(Duration::from_secs(config.cache_sweep_interval_secs));
    cache
}
