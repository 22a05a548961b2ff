//! ERC-2612 permit signatures.
//!
//! An agent wallet signs an EIP-712 `Permit` granting the relayer an
//! unlimited allowance, so the relayer can later move the agent's tokens
//! with `transferFrom` without the agent ever holding gas.

use crate::chain::contracts::Permit;
use crate::chain::TokenChain;
use crate::error::ChainError;
use crate::identity::{AgentKeypair, SplitSignature};
use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use std::sync::Arc;
use tracing::debug;

/// Domain version used by the agent token.
pub const PERMIT_DOMAIN_VERSION: &str = "1";

/// A permit message together with the owner's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPermit {
    pub permit: Permit,
    pub signature: SplitSignature,
}

impl SignedPermit {
    pub fn owner(&self) -> Address {
        self.permit.owner
    }

    pub fn spender(&self) -> Address {
        self.permit.spender
    }
}

/// EIP-712 domain of the token at `verifying_contract`.
pub fn permit_domain(token_name: String, chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(token_name.into()),
        Some(PERMIT_DOMAIN_VERSION.into()),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// Digest an owner signs for `permit` under `domain`.
pub fn permit_digest(permit: &Permit, domain: &Eip712Domain) -> B256 {
    permit.eip712_signing_hash(domain)
}

/// Builds max-allowance permits against the live token.
#[derive(Clone)]
pub struct PermitSigner {
    chain: Arc<dyn TokenChain>,
}

impl PermitSigner {
    pub fn new(chain: Arc<dyn TokenChain>) -> Self {
        Self { chain }
    }

    /// Sign a permit with value and deadline at `2^256 - 1` and the owner's
    /// current on-chain nonce.
    pub async fn sign_max_permit(
        &self,
        owner: &AgentKeypair,
        spender: Address,
    ) -> Result<SignedPermit, ChainError> {
        let token_name = self.chain.token_name().await?;
        let chain_id = self.chain.chain_id().await?;
        let nonce = self.chain.permit_nonce(owner.address()).await?;

        let permit = Permit {
            owner: owner.address(),
            spender,
            value: U256::MAX,
            nonce,
            deadline: U256::MAX,
        };
        let domain = permit_domain(token_name, chain_id, self.chain.token_address());
        let digest = permit_digest(&permit, &domain);
        let signature = owner.sign_hash(&digest)?;

        debug!(
            "Signed permit for {} (spender {}, nonce {})",
            owner.address(),
            spender,
            nonce
        );
        Ok(SignedPermit { permit, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha3::{Digest, Keccak256};

    fn keccak(data: &[u8]) -> [u8; 32] {
        Keccak256::digest(data).into()
    }

    fn word_u256(value: U256) -> [u8; 32] {
        value.to_be_bytes::<32>()
    }

    fn word_address(addr: Address) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        word
    }

    /// Hand-rolled EIP-712 encoding for cross-checking the generated one.
    fn manual_digest(name: &str, chain_id: u64, token: Address, p: &Permit) -> B256 {
        let mut domain = Vec::new();
        domain.extend_from_slice(&keccak(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        ));
        domain.extend_from_slice(&keccak(name.as_bytes()));
        domain.extend_from_slice(&keccak(b"1"));
        domain.extend_from_slice(&word_u256(U256::from(chain_id)));
        domain.extend_from_slice(&word_address(token));
        let separator = keccak(&domain);

        let mut message = Vec::new();
        message.extend_from_slice(&keccak(
            b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)",
        ));
        message.extend_from_slice(&word_address(p.owner));
        message.extend_from_slice(&word_address(p.spender));
        message.extend_from_slice(&word_u256(p.value));
        message.extend_from_slice(&word_u256(p.nonce));
        message.extend_from_slice(&word_u256(p.deadline));
        let struct_hash = keccak(&message);

        let mut payload = vec![0x19, 0x01];
        payload.extend_from_slice(&separator);
        payload.extend_from_slice(&struct_hash);
        B256::from(keccak(&payload))
    }

    #[test]
    fn digest_matches_manual_encoding() {
        let token = Address::repeat_byte(0x41);
        let permit = Permit {
            owner: Address::repeat_byte(0xaa),
            spender: Address::repeat_byte(0xbb),
            value: U256::MAX,
            nonce: U256::from(3),
            deadline: U256::MAX,
        };
        let domain = permit_domain("AgentCoin".to_string(), 8453, token);
        assert_eq!(
            permit_digest(&permit, &domain),
            manual_digest("AgentCoin", 8453, token, &permit)
        );
    }

    #[test]
    fn digest_depends_on_nonce() {
        let domain = permit_domain("AgentCoin".to_string(), 1, Address::ZERO);
        let mut permit = Permit {
            owner: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            value: U256::MAX,
            nonce: U256::ZERO,
            deadline: U256::MAX,
        };
        let first = permit_digest(&permit, &domain);
        permit.nonce = U256::from(1);
        assert_ne!(first, permit_digest(&permit, &domain));
    }
}
