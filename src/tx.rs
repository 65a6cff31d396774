use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{length_of_length, BufMut, Encodable, Header};

use crate::signer::SignatureParts;

pub const PING_EVENT_SIGNATURE: &str = "Ping()";
pub const PONG_FUNCTION_SIGNATURE: &str = "pong(bytes32)";

const EMPTY_ACCESS_LIST_RLP_LEN: usize = 1;

pub fn ping_topic0() -> B256 {
    keccak256(PING_EVENT_SIGNATURE.as_bytes())
}

/// ABI calldata for `pong(bytes32)`: 4-byte selector followed by the
/// originating transaction hash as the single word-aligned argument.
pub fn pong_calldata(originating_tx_hash: &B256) -> Bytes {
    let selector = keccak256(PONG_FUNCTION_SIGNATURE.as_bytes());
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector[..4]);
    data.extend_from_slice(originating_tx_hash.as_slice());
    Bytes::from(data)
}

#[derive(Clone, Debug)]
pub struct Eip1559UnsignedTx {
    pub chain_id: U256,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559UnsignedTx {
    fn payload_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + EMPTY_ACCESS_LIST_RLP_LEN
    }

    /// Digest the signer commits to: keccak over the type byte plus the
    /// unsigned RLP payload.
    pub fn signing_hash(&self) -> B256 {
        keccak256(encode_eip1559_unsigned(self))
    }
}

impl Encodable for Eip1559UnsignedTx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

struct Eip1559SignedTx<'a> {
    tx: &'a Eip1559UnsignedTx,
    y_parity: u8,
    r: U256,
    s: U256,
}

impl Eip1559SignedTx<'_> {
    fn payload_length(&self) -> usize {
        self.tx.payload_length() + self.y_parity.length() + self.r.length() + self.s.length()
    }
}

impl Encodable for Eip1559SignedTx<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.tx.chain_id.encode(out);
        self.tx.nonce.encode(out);
        self.tx.max_priority_fee_per_gas.encode(out);
        self.tx.max_fee_per_gas.encode(out);
        self.tx.gas_limit.encode(out);
        self.tx.to.encode(out);
        self.tx.value.encode(out);
        self.tx.data.encode(out);
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

fn encode_eip1559_unsigned(tx: &Eip1559UnsignedTx) -> Vec<u8> {
    let payload = alloy_rlp::encode(tx);
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(0x02);
    out.extend_from_slice(&payload);
    out
}

pub fn encode_eip1559_signed(tx: &Eip1559UnsignedTx, signature: &SignatureParts) -> Vec<u8> {
    let payload = alloy_rlp::encode(Eip1559SignedTx {
        tx,
        y_parity: signature.y_parity,
        r: signature.r,
        s: signature.s,
    });
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(0x02);
    out.extend_from_slice(&payload);
    out
}
