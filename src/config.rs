use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;

pub const DEFAULT_BATCH_WIDTH: u64 = 50;
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 30;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;
// Sepolia.
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

/// Environment-backed configuration, read once at startup. Validation
/// failures name the offending variable and are fatal.
#[derive(Clone)]
pub struct BotConfig {
    pub rpc_url: String,
    pub private_key: String,
    pub contract_address: Address,
    pub chain_id: u64,
    pub start_height: u64,
    pub batch_width: u64,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub state_path: PathBuf,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("start_height", &self.start_height)
            .field("batch_width", &self.batch_width)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_max", &self.backoff_max)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("state_path", &self.state_path)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, String> {
        let rpc_url = required("PONGBOT_RPC_URL")?;
        let private_key = required("PONGBOT_PRIVATE_KEY")?;
        let contract_raw = required("PONGBOT_CONTRACT_ADDRESS")?;
        let contract_address = parse_address("PONGBOT_CONTRACT_ADDRESS", &contract_raw)?;

        let batch_width = optional_u64("PONGBOT_BATCH_WIDTH", DEFAULT_BATCH_WIDTH)?;
        if batch_width == 0 {
            return Err("PONGBOT_BATCH_WIDTH must be at least 1".to_string());
        }

        Ok(Self {
            rpc_url,
            private_key,
            contract_address,
            chain_id: optional_u64("PONGBOT_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            start_height: optional_u64("PONGBOT_START_HEIGHT", 0)?,
            batch_width,
            backoff_base: Duration::from_secs(optional_u64(
                "PONGBOT_BACKOFF_BASE_SECS",
                DEFAULT_BACKOFF_BASE_SECS,
            )?),
            backoff_max: Duration::from_secs(optional_u64(
                "PONGBOT_BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            )?),
            confirmation_timeout: Duration::from_secs(optional_u64(
                "PONGBOT_CONFIRMATION_TIMEOUT_SECS",
                DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            )?),
            poll_interval: Duration::from_secs(
                optional_u64("PONGBOT_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?.max(1),
            ),
            state_path: PathBuf::from(optional_string(
                "PONGBOT_STATE_PATH",
                "pongbot-state.json",
            )),
        })
    }
}

fn required(name: &str) -> Result<String, String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(format!("{name} is not set")),
    }
}

fn optional_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional_u64(name: &str, default: u64) -> Result<u64, String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map_err(|error| format!("{name} must be an unsigned integer: {error}")),
        _ => Ok(default),
    }
}

fn parse_address(name: &str, raw: &str) -> Result<Address, String> {
    Address::from_str(raw).map_err(|error| format!("{name} is not a valid address: {error}"))
}
