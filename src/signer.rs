use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

#[derive(Clone, Copy, Debug)]
pub struct SignatureParts {
    pub r: U256,
    pub s: U256,
    pub y_parity: u8,
}

/// Signing collaborator. The engine only needs an identity address and a
/// recoverable signature over a 32-byte payload digest.
pub trait SignerPort: Send + Sync {
    fn address(&self) -> Address;
    fn sign_prehash(&self, digest: &B256) -> Result<SignatureParts, String>;
}

/// Signer backed by a secp256k1 private key taken from configuration.
#[derive(Clone)]
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    pub fn from_hex(private_key: &str) -> Result<Self, String> {
        let trimmed = private_key.trim();
        let without_prefix = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if without_prefix.len() != 64 {
            return Err("private key must be 32 bytes of hex".to_string());
        }

        let mut raw = [0u8; 32];
        hex::decode_to_slice(without_prefix, &mut raw)
            .map_err(|error| format!("failed to decode private key hex: {error}"))?;

        let key = SigningKey::from_slice(&raw)
            .map_err(|error| format!("invalid secp256k1 private key: {error}"))?;
        let address = derive_address(&key);
        Ok(Self { key, address })
    }
}

impl SignerPort for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_prehash(&self, digest: &B256) -> Result<SignatureParts, String> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|error| format!("ecdsa signing failed: {error}"))?;

        let compact = signature.to_bytes();
        Ok(SignatureParts {
            r: U256::from_be_slice(&compact[..32]),
            s: U256::from_be_slice(&compact[32..]),
            y_parity: recovery_id.to_byte() & 1,
        })
    }
}

fn derive_address(key: &SigningKey) -> Address {
    let uncompressed = key.verifying_key().to_encoded_point(false);
    let digest = keccak256(&uncompressed.as_bytes()[1..]);
    Address::from_slice(&digest[12..32])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // First well-known anvil/hardhat development key.
    const DEV_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn derives_the_expected_address_for_a_known_key() {
        let signer = LocalKeySigner::from_hex(DEV_PRIVATE_KEY).expect("dev key should parse");
        assert_eq!(
            signer.address(),
            Address::from_str(DEV_ADDRESS).expect("dev address should parse")
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(LocalKeySigner::from_hex("").is_err());
        assert!(LocalKeySigner::from_hex("0x1234").is_err());
        assert!(LocalKeySigner::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn signatures_are_recoverable_parts() {
        let signer = LocalKeySigner::from_hex(DEV_PRIVATE_KEY).expect("dev key should parse");
        let digest = keccak256(b"pong payload digest");

        let parts = signer
            .sign_prehash(&digest)
            .expect("signing a digest should succeed");
        assert!(parts.y_parity <= 1);
        assert_ne!(parts.r, U256::ZERO);
        assert_ne!(parts.s, U256::ZERO);
    }

    #[test]
    fn signing_is_deterministic_for_the_same_digest() {
        let signer = LocalKeySigner::from_hex(DEV_PRIVATE_KEY).expect("dev key should parse");
        let digest = keccak256(b"deterministic");

        let first = signer.sign_prehash(&digest).expect("first sign");
        let second = signer.sign_prehash(&digest).expect("second sign");
        assert_eq!(first.r, second.r);
        assert_eq!(first.s, second.s);
        assert_eq!(first.y_parity, second.y_parity);
    }
}
