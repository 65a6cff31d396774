use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::types::{FeeEstimate, SignalOccurrence};
use crate::tx::ping_topic0;

const PRIORITY_FEE_WEI: u64 = 1_000_000_000;
const HEIGHT_CHANNEL_CAPACITY: usize = 32;

/// Ledger collaborator consumed by the engine. Everything the bot knows about
/// the chain goes through this port; tests substitute a scripted double.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    async fn current_height(&self) -> Result<u64, String>;
    async fn query_logs(&self, from_height: u64, to_height: u64)
        -> Result<Vec<SignalOccurrence>, String>;
    async fn pending_sequence_number(&self, address: Address) -> Result<u64, String>;
    async fn current_fee_rate(&self) -> Result<FeeEstimate, String>;
    async fn estimate_gas(&self, from: Address, to: Address, data: &[u8]) -> Result<u64, String>;
    async fn submit_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256, String>;
    async fn await_confirmation(&self, tx_hash: B256) -> Result<u64, String>;
    fn subscribe_heights(&self) -> HeightSubscription;
}

/// Stream of new chain heights. Holding the value is holding the
/// subscription; dropping it cancels the producing task, which is how the
/// supervisor guarantees at most one live subscription exists.
pub struct HeightSubscription {
    rx: mpsc::Receiver<u64>,
    task: Option<JoinHandle<()>>,
}

impl HeightSubscription {
    pub fn from_receiver(rx: mpsc::Receiver<u64>) -> Self {
        Self { rx, task: None }
    }

    fn with_task(rx: mpsc::Receiver<u64>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// `None` means the producer is gone and the subscription is dead.
    pub async fn next_height(&mut self) -> Option<u64> {
        self.rx.recv().await
    }
}

impl Drop for HeightSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// JSON-RPC 2.0 client for the ledger endpoint, filtered to the watched
/// contract's Ping logs.
#[derive(Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    contract: Address,
    topic0: B256,
    poll_interval: Duration,
}

impl HttpLedgerClient {
    pub fn new(
        rpc_url: impl Into<String>,
        contract: Address,
        poll_interval: Duration,
    ) -> Result<Self, String> {
        let rpc_url = rpc_url.into();
        if rpc_url.trim().is_empty() {
            return Err("ledger rpc url is not configured".to_string());
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;
        Ok(Self {
            http,
            rpc_url,
            contract,
            topic0: ping_topic0(),
            poll_interval,
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|error| format!("{method} transport failed: {error}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{method} returned status {status}"));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|error| format!("failed to parse {method} response JSON: {error}"))?;
        if let Some(error) = value.get("error") {
            return Err(format!("rpc returned error for {method}: {error}"));
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| format!("{method} result was missing"))
    }

    async fn eth_block_number(&self) -> Result<u64, String> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| "eth_blockNumber result was not a string".to_string())?;
        parse_hex_u64(raw, "eth_blockNumber")
    }
}

#[async_trait]
impl LedgerPort for HttpLedgerClient {
    async fn current_height(&self) -> Result<u64, String> {
        self.eth_block_number().await
    }

    async fn query_logs(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<SignalOccurrence>, String> {
        let filter = json!({
            "fromBlock": format!("0x{from_height:x}"),
            "toBlock": format!("0x{to_height:x}"),
            "address": format!("0x{}", hex::encode(self.contract.as_slice())),
            "topics": [format!("0x{}", hex::encode(self.topic0.as_slice()))],
        });

        let result = self.rpc_call("eth_getLogs", json!([filter])).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(result)
            .map_err(|error| format!("failed to decode eth_getLogs result: {error}"))?;

        let mut occurrences = logs
            .into_iter()
            .map(occurrence_from_log)
            .collect::<Result<Vec<_>, _>>()?;
        occurrences.sort_by_key(|occurrence| (occurrence.height, occurrence.log_index));
        Ok(occurrences)
    }

    async fn pending_sequence_number(&self, address: Address) -> Result<u64, String> {
        let params = json!([format!("0x{}", hex::encode(address.as_slice())), "pending"]);
        let result = self.rpc_call("eth_getTransactionCount", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| "eth_getTransactionCount result was not a string".to_string())?;
        parse_hex_u64(raw, "eth_getTransactionCount")
    }

    async fn current_fee_rate(&self) -> Result<FeeEstimate, String> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| "eth_gasPrice result was not a string".to_string())?;
        Ok(fee_estimate_from_gas_price(parse_hex_u256(
            raw,
            "eth_gasPrice",
        )?))
    }

    async fn estimate_gas(&self, from: Address, to: Address, data: &[u8]) -> Result<u64, String> {
        let params = json!([{
            "from": format!("0x{}", hex::encode(from.as_slice())),
            "to": format!("0x{}", hex::encode(to.as_slice())),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let result = self.rpc_call("eth_estimateGas", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| "eth_estimateGas result was not a string".to_string())?;
        parse_hex_u64(raw, "eth_estimateGas")
    }

    async fn submit_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256, String> {
        let payload = format!("0x{}", hex::encode(raw_tx));
        let result = self
            .rpc_call("eth_sendRawTransaction", json!([payload]))
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| "eth_sendRawTransaction result was not a string".to_string())?;
        parse_hex_b256(raw, "eth_sendRawTransaction")
    }

    async fn await_confirmation(&self, tx_hash: B256) -> Result<u64, String> {
        let hash_hex = format!("0x{}", hex::encode(tx_hash.as_slice()));
        loop {
            let result = self
                .rpc_call("eth_getTransactionReceipt", json!([hash_hex.clone()]))
                .await?;
            if !result.is_null() {
                let receipt: RpcReceipt = serde_json::from_value(result).map_err(|error| {
                    format!("failed to decode eth_getTransactionReceipt result: {error}")
                })?;
                if let Some(status) = receipt.status.as_deref() {
                    if parse_hex_u64(status, "receipt status")? == 0 {
                        return Err(format!("transaction {hash_hex} reverted"));
                    }
                }
                let block = receipt
                    .block_number
                    .as_deref()
                    .ok_or_else(|| "receipt is missing blockNumber".to_string())?;
                return parse_hex_u64(block, "receipt blockNumber");
            }

            debug!(tx_hash = %hash_hex, "confirmation_pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn subscribe_heights(&self) -> HeightSubscription {
        let (tx, rx) = mpsc::channel(HEIGHT_CHANNEL_CAPACITY);
        let client = self.clone();
        let task = tokio::spawn(async move {
            let mut last_seen: Option<u64> = None;
            let mut ticker = tokio::time::interval(client.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match client.eth_block_number().await {
                    Ok(height) => {
                        if last_seen.map_or(true, |seen| height > seen) {
                            last_seen = Some(height);
                            if tx.send(height).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        // One failed poll ends the stream; the supervisor owns
                        // retry policy, not this task.
                        warn!(%error, "height_poll_failed");
                        return;
                    }
                }
            }
        });
        HeightSubscription::with_task(rx, task)
    }
}

fn occurrence_from_log(log: RpcLog) -> Result<SignalOccurrence, String> {
    Ok(SignalOccurrence {
        originating_tx_hash: parse_hex_b256(
            log.transaction_hash
                .as_deref()
                .ok_or_else(|| "rpc log missing transactionHash".to_string())?,
            "transactionHash",
        )?,
        height: parse_hex_u64(
            log.block_number
                .as_deref()
                .ok_or_else(|| "rpc log missing blockNumber".to_string())?,
            "blockNumber",
        )?,
        log_index: parse_hex_u64(
            log.log_index
                .as_deref()
                .ok_or_else(|| "rpc log missing logIndex".to_string())?,
            "logIndex",
        )?,
    })
}

fn fee_estimate_from_gas_price(gas_price: U256) -> FeeEstimate {
    let max_priority_fee_per_gas = U256::from(PRIORITY_FEE_WEI);
    FeeEstimate {
        max_fee_per_gas: gas_price.saturating_add(max_priority_fee_per_gas),
        max_priority_fee_per_gas,
    }
}

fn parse_hex_u64(raw: &str, field: &str) -> Result<u64, String> {
    let value = raw.trim();
    let without_prefix = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("{field} must be 0x-prefixed hex"))?;
    u64::from_str_radix(without_prefix, 16)
        .map_err(|error| format!("failed to parse {field} as hex u64: {error}"))
}

fn parse_hex_u256(raw: &str, field: &str) -> Result<U256, String> {
    let value = raw.trim();
    let without_prefix = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("{field} must be 0x-prefixed hex"))?;
    if without_prefix.is_empty() {
        return Ok(U256::ZERO);
    }
    if without_prefix.len() > 64 {
        return Err(format!("{field} exceeds 32 bytes"));
    }
    let padded = if without_prefix.len() % 2 == 0 {
        without_prefix.to_string()
    } else {
        format!("0{without_prefix}")
    };
    let bytes = hex::decode(&padded)
        .map_err(|error| format!("failed to decode {field} as hex: {error}"))?;
    Ok(U256::from_be_slice(&bytes))
}

fn parse_hex_b256(raw: &str, field: &str) -> Result<B256, String> {
    let value = raw.trim();
    let without_prefix = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("{field} must be 0x-prefixed hex"))?;
    if without_prefix.len() != 64 {
        return Err(format!("{field} must be 32 bytes of hex"));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(without_prefix, &mut out)
        .map_err(|error| format!("failed to decode {field}: {error}"))?;
    Ok(B256::from(out))
}

#[derive(Deserialize)]
struct RpcLog {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    #[serde(rename = "logIndex")]
    log_index: Option<String>,
    #[serde(rename = "transactionHash")]
    transaction_hash: Option<String>,
}

#[derive(Deserialize)]
struct RpcReceipt {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_u64_requires_prefix_and_valid_digits() {
        assert_eq!(
            parse_hex_u64("0x73", "field").expect("valid hex should parse"),
            0x73
        );
        assert_eq!(
            parse_hex_u64(" 0X0a ", "field").expect("padded uppercase prefix should parse"),
            10
        );
        assert!(parse_hex_u64("73", "field").is_err());
        assert!(parse_hex_u64("0xzz", "field").is_err());
    }

    #[test]
    fn parse_hex_u256_handles_odd_length_and_empty_quantities() {
        assert_eq!(
            parse_hex_u256("0x", "field").expect("empty quantity is zero"),
            U256::ZERO
        );
        assert_eq!(
            parse_hex_u256("0x3b9aca00", "field").expect("gas price should parse"),
            U256::from(1_000_000_000u64)
        );
        assert_eq!(
            parse_hex_u256("0xf", "field").expect("odd-length hex should parse"),
            U256::from(15u64)
        );
        assert!(parse_hex_u256(&format!("0x{}", "1".repeat(65)), "field").is_err());
    }

    #[test]
    fn parse_hex_b256_enforces_exact_width() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            parse_hex_b256(&hash, "field").expect("32-byte hash should parse"),
            B256::repeat_byte(0xab)
        );
        assert!(parse_hex_b256("0xabcd", "field").is_err());
    }

    #[test]
    fn occurrence_from_log_reads_rpc_field_names() {
        let log: RpcLog = serde_json::from_value(json!({
            "blockNumber": "0x73",
            "logIndex": "0x2",
            "transactionHash": format!("0x{}", "ab".repeat(32)),
        }))
        .expect("rpc log should deserialize");

        let occurrence = occurrence_from_log(log).expect("log should convert");
        assert_eq!(occurrence.height, 115);
        assert_eq!(occurrence.log_index, 2);
        assert_eq!(occurrence.originating_tx_hash, B256::repeat_byte(0xab));
    }

    #[test]
    fn occurrence_from_log_rejects_partial_logs() {
        let log: RpcLog = serde_json::from_value(json!({
            "logIndex": "0x0",
            "transactionHash": format!("0x{}", "ab".repeat(32)),
        }))
        .expect("rpc log should deserialize");
        assert!(occurrence_from_log(log).is_err());
    }

    #[test]
    fn fee_estimate_adds_fixed_priority_fee() {
        let fees = fee_estimate_from_gas_price(U256::from(5_000_000_000u64));
        assert_eq!(
            fees.max_priority_fee_per_gas,
            U256::from(1_000_000_000u64)
        );
        assert_eq!(fees.max_fee_per_gas, U256::from(6_000_000_000u64));
    }

    #[tokio::test]
    async fn subscription_yields_heights_until_sender_is_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut subscription = HeightSubscription::from_receiver(rx);

        tx.send(101).await.expect("send should succeed");
        tx.send(102).await.expect("send should succeed");
        drop(tx);

        assert_eq!(subscription.next_height().await, Some(101));
        assert_eq!(subscription.next_height().await, Some(102));
        assert_eq!(subscription.next_height().await, None);
    }
}
