//! Error taxonomy
//!
//! Upstream failures stay inside the engine: transient errors are retried and
//! then isolated per source, malformed records are skipped, and cache errors
//! are swallowed at the cache boundary. The only error that escapes to the
//! caller is a total initialization failure.

use thiserror::Error;

/// Failure of a single upstream call or record transform
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network/transport failure (timeout, connect, TLS)
    #[error("{source_id} request failed: {message}")]
    Transport {
        source_id: &'static str,
        message: String,
    },

    /// Upstream answered with a non-success status
    #[error("{source_id} returned HTTP {status}")]
    Status {
        source_id: &'static str,
        status: u16,
    },

    /// Payload did not match the documented schema
    #[error("{source_id} payload decode failed: {message}")]
    Decode {
        source_id: &'static str,
        message: String,
    },

    /// The adapter does not implement this operation
    #[error("{source_id} does not support {operation}")]
    Unsupported {
        source_id: &'static str,
        operation: &'static str,
    },
}

impl SourceError {
    pub fn transport(source_id: &'static str, err: &reqwest::Error) -> Self {
        SourceError::Transport {
            source_id,
            message: err.to_string(),
        }
    }

    /// Transient errors are worth retrying; schema mismatches and
    /// unsupported operations are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            // 429 and 5xx are upstream-transient
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Decode { .. } => false,
            SourceError::Unsupported { .. } => false,
        }
    }
}

/// Engine-level failures surfaced to the caller
#[derive(Debug, Error)]
pub enum EngineError {
    /// The very first refresh produced no data at all; the service has
    /// nothing to serve and startup must fail loudly.
    #[error("initial refresh produced no records (all {attempted} sources failed)")]
    NoInitialData { attempted: usize },
}
