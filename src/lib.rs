pub mod config;
pub mod domain;
pub mod ledger;
pub mod responder;
pub mod scanner;
pub mod signer;
pub mod storage;
pub mod supervisor;
pub mod tx;

pub use config::BotConfig;
pub use domain::types::{BotState, EngineError, SignalOccurrence};
pub use ledger::{HeightSubscription, HttpLedgerClient, LedgerPort};
pub use responder::Responder;
pub use signer::{LocalKeySigner, SignerPort};
pub use storage::state::StateStore;
pub use supervisor::ReconnectionSupervisor;
