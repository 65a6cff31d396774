use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use tracing::{debug, info};

use crate::domain::types::{BotState, EngineError, ResponseError, SignalOccurrence};
use crate::ledger::LedgerPort;
use crate::signer::SignerPort;
use crate::storage::state::StateStore;
use crate::tx::{encode_eip1559_signed, pong_calldata, Eip1559UnsignedTx};

const DEFAULT_PONG_GAS_LIMIT: u64 = 120_000;

#[derive(Clone, Copy, Debug)]
pub struct Confirmed {
    pub pong_tx_hash: B256,
    pub inclusion_height: u64,
    pub sequence_number: u64,
}

/// Turns one detected Ping occurrence into a confirmed pong transaction.
/// Every step suspends on the ledger. Nothing here retries: failures surface
/// to the supervisor, and the untouched cursor guarantees the occurrence is
/// re-detected on the next scan.
pub struct Responder {
    ledger: Arc<dyn LedgerPort>,
    signer: Arc<dyn SignerPort>,
    store: StateStore,
    chain_id: u64,
    contract: Address,
    confirmation_timeout: Duration,
}

impl Responder {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        signer: Arc<dyn SignerPort>,
        store: StateStore,
        chain_id: u64,
        contract: Address,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            signer,
            store,
            chain_id,
            contract,
            confirmation_timeout,
        }
    }

    pub async fn respond(
        &self,
        state: &mut BotState,
        occurrence: &SignalOccurrence,
    ) -> Result<Confirmed, EngineError> {
        let from = self.signer.address();

        // The ledger's pending count is the only nonce authority; the
        // persisted counter is a diagnostic mirror.
        let nonce = self
            .ledger
            .pending_sequence_number(from)
            .await
            .map_err(ResponseError::SequenceQuery)?;
        if state.sequence_number != nonce {
            debug!(
                local = state.sequence_number,
                ledger = nonce,
                "sequence_number_drift"
            );
        }

        let fees = self
            .ledger
            .current_fee_rate()
            .await
            .map_err(ResponseError::FeeQuery)?;

        let data = pong_calldata(&occurrence.originating_tx_hash);
        let gas_limit = self
            .ledger
            .estimate_gas(from, self.contract, &data)
            .await
            .unwrap_or(DEFAULT_PONG_GAS_LIMIT);

        let tx = Eip1559UnsignedTx {
            chain_id: U256::from(self.chain_id),
            nonce: U256::from(nonce),
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit: U256::from(gas_limit),
            to: self.contract,
            value: U256::ZERO,
            data,
        };

        let signature = self
            .signer
            .sign_prehash(&tx.signing_hash())
            .map_err(ResponseError::Signing)?;
        let raw = encode_eip1559_signed(&tx, &signature);

        let pong_tx_hash = self
            .ledger
            .submit_raw_transaction(&raw)
            .await
            .map_err(ResponseError::Submission)?;
        info!(
            ping_tx = %occurrence.originating_tx_hash,
            pong_tx = %pong_tx_hash,
            height = occurrence.height,
            nonce,
            "pong_submitted"
        );

        let inclusion_height = tokio::time::timeout(
            self.confirmation_timeout,
            self.ledger.await_confirmation(pong_tx_hash),
        )
        .await
        .map_err(|_| ResponseError::ConfirmationTimeout {
            tx_hash: pong_tx_hash,
            timeout_secs: self.confirmation_timeout.as_secs(),
        })?
        .map_err(|reason| ResponseError::Confirmation {
            tx_hash: pong_tx_hash,
            reason,
        })?;

        // Persist before reporting success: a save failure leaves the
        // occurrence unresolved even though the pong landed (at-least-once
        // bias; the ledger's nonce rejection absorbs the replay).
        state.cursor_height = state.cursor_height.max(occurrence.height);
        state.sequence_number = nonce;
        self.store.save(state)?;

        info!(
            pong_tx = %pong_tx_hash,
            inclusion_height,
            cursor = state.cursor_height,
            "pong_confirmed"
        );
        Ok(Confirmed {
            pong_tx_hash,
            inclusion_height,
            sequence_number: nonce,
        })
    }
}
