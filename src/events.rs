//! Outbound domain events
//!
//! The engine emits three event kinds while merging: price updates past the
//! change threshold, volume spikes, and first sightings of a token. The sink
//! is injected at engine construction; delivery is synchronous within the
//! merge call, at-most-once, best-effort. The pub/sub transport consumes the
//! tagged `TokenEvent` stream from `ChannelEventSink` and applies its own
//! room/filter semantics.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::TokenRecord;

/// Price moved by at least the change threshold since the last merge
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdateEvent {
    pub address: String,
    pub old_price: f64,
    pub new_price: f64,
    pub percent_change: f64,
    pub volume_24h: f64,
}

/// 24h volume grew by at least the spike threshold since the last merge
#[derive(Debug, Clone, Serialize)]
pub struct VolumeSpikeEvent {
    pub address: String,
    pub symbol: String,
    pub percent_change: f64,
    pub current_volume: f64,
    pub previous_volume: f64,
    /// Window label the volumes were read from (currently always "24h")
    pub window: String,
}

/// Tagged union carried over the outbound channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    PriceUpdate(PriceUpdateEvent),
    VolumeSpike(VolumeSpikeEvent),
    NewToken(TokenRecord),
}

/// Receiver of engine events, injected at construction
pub trait EventSink: Send + Sync {
    fn on_price_update(&self, event: PriceUpdateEvent);
    fn on_volume_spike(&self, event: VolumeSpikeEvent);
    fn on_new_token(&self, record: TokenRecord);
}

/// Sink that forwards events over an unbounded channel to the pub/sub layer.
///
/// Unbounded so the synchronous emit inside a merge never blocks; if the
/// consumer is gone the event is dropped (best-effort delivery).
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<TokenEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TokenEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: TokenEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Event channel closed, dropping event");
        }
    }
}

impl EventSink for ChannelEventSink {
    fn on_price_update(&self, event: PriceUpdateEvent) {
        self.send(TokenEvent::PriceUpdate(event));
    }

    fn on_volume_spike(&self, event: VolumeSpikeEvent) {
        self.send(TokenEvent::VolumeSpike(event));
    }

    fn on_new_token(&self, record: TokenRecord) {
        self.send(TokenEvent::NewToken(record));
    }
}

/// Sink that discards everything; used when no subscriber transport is wired
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn on_price_update(&self, _event: PriceUpdateEvent) {}
    fn on_volume_spike(&self, _event: VolumeSpikeEvent) {}
    fn on_new_token(&self, _record: TokenRecord) {}
}
