use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Durable reconciliation record. This is the only persisted entity; the
/// process is restartable from it alone.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BotState {
    pub cursor_height: u64,
    pub sequence_number: u64,
}

impl BotState {
    pub fn seeded(start_height: u64) -> Self {
        Self {
            cursor_height: start_height,
            sequence_number: 0,
        }
    }
}

/// One observed emission of the watched Ping event. Identified by the
/// transaction that emitted it, not by its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalOccurrence {
    pub originating_tx_hash: B256,
    pub height: u64,
    pub log_index: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Active,
    Backoff,
}

#[derive(Clone, Debug)]
pub enum ConnectionEvent {
    Start,
    Connected,
    ConnectionLost { reason: String },
    RetryElapsed,
}

#[derive(Clone, Debug)]
pub struct TransitionError {
    pub from: ConnectionState,
    pub event: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state record io failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state record encode failure: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("pending sequence query failed: {0}")]
    SequenceQuery(String),
    #[error("fee query failed: {0}")]
    FeeQuery(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("submission rejected: {0}")]
    Submission(String),
    #[error("confirmation failed for {tx_hash}: {reason}")]
    Confirmation { tx_hash: B256, reason: String },
    #[error("confirmation timed out after {timeout_secs}s for {tx_hash}")]
    ConfirmationTimeout { tx_hash: B256, timeout_secs: u64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ledger connection failed: {0}")]
    Connectivity(String),
    #[error("log query failed: {0}")]
    Query(String),
    #[error("response failed: {0}")]
    Response(#[from] ResponseError),
    #[error("state persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}
