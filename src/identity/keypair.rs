//! Agent keypairs.
//!
//! Generates or loads a secp256k1 private key, derives the Ethereum address
//! and signs 32-byte digests with a recoverable signature.

use crate::error::ChainError;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use std::fmt;

/// 65-byte ECDSA signature split into its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSignature {
    pub r: B256,
    pub s: B256,
    /// Recovery byte, 27 or 28.
    pub v: u8,
}

impl SplitSignature {
    /// `0x`-prefixed r‖s‖v hex.
    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(self.r.as_slice());
        bytes.extend_from_slice(self.s.as_slice());
        bytes.push(self.v);
        format!("0x{}", hex::encode(bytes))
    }

    /// Parse r‖s‖v hex. Accepts v as 0/1 or 27/28.
    pub fn from_hex(sig: &str) -> Result<Self, ChainError> {
        let raw = sig.strip_prefix("0x").unwrap_or(sig);
        let bytes =
            hex::decode(raw).map_err(|e| ChainError::Signing(format!("invalid signature hex: {e}")))?;
        if bytes.len() != 65 {
            return Err(ChainError::Signing(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let v = match bytes[64] {
            v @ (0 | 1) => v + 27,
            v @ (27 | 28) => v,
            other => return Err(ChainError::Signing(format!("invalid recovery byte {other}"))),
        };
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v,
        })
    }
}

/// A secp256k1 keypair owned by one agent wallet.
#[derive(Clone)]
pub struct AgentKeypair {
    signing_key: SigningKey,
    address: Address,
}

impl AgentKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = derive_address(&signing_key);
        Self {
            signing_key,
            address,
        }
    }

    /// Load a keypair from a hex private key (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self, ChainError> {
        let key_hex = private_key.trim().strip_prefix("0x").unwrap_or(private_key.trim());
        let key_bytes =
            hex::decode(key_hex).map_err(|e| ChainError::InvalidKey(format!("invalid hex: {e}")))?;
        if key_bytes.len() != 32 {
            return Err(ChainError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        let address = derive_address(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 checksummed address.
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Hex-encoded private key with 0x prefix.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Sign a 32-byte digest (no additional hashing).
    pub fn sign_hash(&self, digest: &B256) -> Result<SplitSignature, ChainError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let bytes = signature.to_bytes();
        Ok(SplitSignature {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..]),
            v: recovery_id.to_byte() + 27,
        })
    }

    /// Signer usable by an alloy provider wallet.
    pub fn to_signer(&self) -> Result<PrivateKeySigner, ChainError> {
        PrivateKeySigner::from_slice(&self.signing_key.to_bytes())
            .map_err(|e| ChainError::InvalidKey(e.to_string()))
    }
}

impl fmt::Debug for AgentKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKeypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derive an Ethereum address from a signing key.
fn derive_address(signing_key: &SigningKey) -> Address {
    // Uncompressed public key: 0x04 || x || y
    let pubkey = signing_key.verifying_key().to_encoded_point(false);

    // Keccak256 of x || y, last 20 bytes
    let hash = Keccak256::digest(&pubkey.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
