//! Periodic background tasks
//!
//! Two interval loops: one drives the full multi-source refresh (including
//! the best-effort reference-rate update), the other reads the current
//! record set and hands it to the broadcast callback the pub/sub
//! collaborator supplies. Both run until their task is aborted.

use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::engine::AggregationEngine;
use crate::types::TokenRecord;

/// Refresh loop: reference rate first, then the full fetch-and-merge cycle.
/// Failures inside the engine are logged there and never stop the loop.
pub async fn refresh_task(engine: Arc<AggregationEngine>, interval_ms: u64) {
    log::info!("⏰ Starting refresh scheduler (interval: {}ms)", interval_ms);
    let mut timer = interval(Duration::from_millis(interval_ms));
    // The immediate first tick is skipped; initialize() already refreshed
    timer.tick().await;

    loop {
        timer.tick().await;
        engine.refresh_reference_rate().await;
        engine.refresh_all().await;
    }
}

/// Broadcast loop: pushes the full record list to the outbound collaborator
/// on a fixed cadence. An empty set is skipped.
pub async fn broadcast_task<F>(engine: Arc<AggregationEngine>, interval_ms: u64, publish: F)
where
    F: Fn(Vec<TokenRecord>) + Send + 'static,
{
    log::info!(
        "⏰ Starting broadcast scheduler (interval: {}ms)",
        interval_ms
    );
    let mut timer = interval(Duration::from_millis(interval_ms));

    loop {
        timer.tick().await;
        let records = engine.get_all();
        if records.is_empty() {
            continue;
        }
        publish(records);
    }
}
