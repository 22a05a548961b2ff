mod common;

use agent_chain::chain::contracts::Permit;
use agent_chain::chain::permit::{permit_digest, permit_domain};
use agent_chain::chain::{InitialFunder, OfflineChain, TokenChain, Treasury};
use agent_chain::error::ChainError;
use agent_chain::identity::{AgentKeypair, SplitSignature, WalletProvisioner};
use agent_chain::notify::{Notifier, RecordingNotifier};
use agent_chain::state::{AgentStore, LocalStore};
use agent_chain::types::{WalletRow, SIGNATURE_ERROR_SENTINEL};
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, B256, U256};
use common::*;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::sync::Arc;

struct Harness {
    chain: Arc<FakeChain>,
    store: Arc<LocalStore>,
    notifier: Arc<RecordingNotifier>,
    provisioner: WalletProvisioner,
    treasury: Treasury,
}

fn harness(chain: FakeChain) -> Harness {
    let chain = Arc::new(chain);
    let store = Arc::new(LocalStore::in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let dyn_chain: Arc<dyn TokenChain> = chain.clone();
    let dyn_store: Arc<dyn AgentStore> = store.clone();
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let funder = InitialFunder::new(dyn_chain.clone(), dyn_notifier.clone(), "100").unwrap();
    Harness {
        provisioner: WalletProvisioner::new(dyn_chain.clone(), dyn_store.clone(), dyn_notifier.clone(), funder),
        treasury: Treasury::new(dyn_chain, dyn_store, dyn_notifier),
        chain,
        store,
        notifier,
    }
}

fn recover(digest: B256, sig: &SplitSignature) -> Address {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(sig.r.as_slice());
    rs[32..].copy_from_slice(sig.s.as_slice());
    let signature = Signature::from_slice(&rs).unwrap();
    let recid = RecoveryId::from_byte(sig.v - 27).unwrap();
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recid).unwrap();
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[tokio::test]
async fn wallet_creation_is_idempotent() {
    let h = harness(FakeChain::new());

    let first = h.provisioner.ensure_wallet("@Alice").await.unwrap();
    let second = h.provisioner.ensure_wallet("alice").await.unwrap();

    assert_eq!(first.address, second.address);
    assert_eq!(first.handle, "alice");
    let grants = h.chain.calls().iter().filter(|c| c.starts_with("transfer ")).count();
    assert_eq!(grants, 1, "initial grant is sent once");
}

#[tokio::test]
async fn concurrent_creation_keeps_first_writer_and_skips_funding() {
    let store = Arc::new(LocalStore::in_memory().unwrap());
    let dyn_store: Arc<dyn AgentStore> = store.clone();
    let first = AgentKeypair::generate();
    let competing = WalletRow {
        handle: "mallory".into(),
        address: first.address_string(),
        private_key: first.private_key_hex(),
        permit_signature: SIGNATURE_ERROR_SENTINEL.into(),
        created_at: chrono::Utc::now(),
    };
    let chain = Arc::new(FakeChain {
        competing_wallet: Some((dyn_store.clone(), competing)),
        ..FakeChain::new()
    });
    let dyn_chain: Arc<dyn TokenChain> = chain.clone();
    let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());
    let funder = InitialFunder::new(dyn_chain.clone(), notifier.clone(), "100").unwrap();
    let provisioner = WalletProvisioner::new(dyn_chain, dyn_store, notifier, funder);

    let wallet = provisioner.ensure_wallet("mallory").await.unwrap();

    assert_eq!(wallet.address, first.address_string());
    assert!(!chain.calls().iter().any(|c| c.starts_with("transfer ")));
    assert_eq!(store.database().lock().await.count_wallets().unwrap(), 1);
}

#[tokio::test]
async fn empty_handle_gets_no_wallet() {
    let h = harness(FakeChain::new());
    assert!(h.provisioner.ensure_wallet("@").await.is_err());
    assert!(h.provisioner.ensure_wallet("  ").await.is_err());
    assert!(h.chain.calls().is_empty());
    assert_eq!(h.store.database().lock().await.count_wallets().unwrap(), 0);
}

#[tokio::test]
async fn initial_grant_is_one_hundred_tokens() {
    let h = harness(FakeChain::new());
    let wallet = h.provisioner.ensure_wallet("bob").await.unwrap();

    let expected = format!(
        "transfer {:#x} {}",
        wallet.address.parse::<Address>().unwrap(),
        parse_ether("100").unwrap()
    );
    assert_eq!(h.chain.calls(), vec![expected]);
}

#[tokio::test]
async fn permit_covers_max_allowance_for_relayer() {
    let h = harness(FakeChain {
        nonce: U256::from(7u64),
        ..FakeChain::new()
    });
    let wallet = h.provisioner.ensure_wallet("carol").await.unwrap();
    assert!(wallet.has_permit());

    let owner: Address = wallet.address.parse().unwrap();
    let permit = Permit {
        owner,
        spender: RELAYER,
        value: U256::MAX,
        nonce: U256::from(7u64),
        deadline: U256::MAX,
    };
    let digest = permit_digest(&permit, &permit_domain(TOKEN_NAME.to_string(), CHAIN_ID, TOKEN));
    let signature = SplitSignature::from_hex(&wallet.permit_signature).unwrap();

    assert_eq!(recover(digest, &signature), owner);
}

#[tokio::test]
async fn signing_failure_stores_sentinel() {
    let h = harness(FakeChain {
        fail_nonce: true,
        ..FakeChain::new()
    });
    let wallet = h.provisioner.ensure_wallet("dave").await.unwrap();

    assert_eq!(wallet.permit_signature, SIGNATURE_ERROR_SENTINEL);
    assert!(!wallet.has_permit());
    assert!(h.store.get_wallet("dave").await.unwrap().is_some());
    assert!(h.notifier.messages().iter().any(|m| m.contains("dave")));
}

#[tokio::test]
async fn funding_failure_keeps_wallet() {
    let h = harness(FakeChain {
        fail_transfer: true,
        ..FakeChain::new()
    });
    let wallet = h.provisioner.ensure_wallet("erin").await.unwrap();

    let stored = h.store.get_wallet("erin").await.unwrap().unwrap();
    assert_eq!(stored.address, wallet.address);
    assert!(!h.notifier.messages().is_empty());
}

#[tokio::test]
async fn offline_chain_provisions_without_funding() {
    let store: Arc<dyn AgentStore> = Arc::new(LocalStore::in_memory().unwrap());
    let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());
    let chain: Arc<dyn TokenChain> = Arc::new(OfflineChain::new(TOKEN, RELAYER));
    let funder = InitialFunder::new(chain.clone(), notifier.clone(), "100").unwrap();
    let provisioner = WalletProvisioner::new(chain, store.clone(), notifier, funder);

    let wallet = provisioner.ensure_wallet("frank").await.unwrap();
    assert_eq!(wallet.permit_signature, SIGNATURE_ERROR_SENTINEL);
    assert!(store.get_wallet("frank").await.unwrap().is_some());
}

#[tokio::test]
async fn charge_confirms_permit_before_transfer_from() {
    let h = harness(FakeChain::new());
    let wallet = h.provisioner.ensure_wallet("grace").await.unwrap();
    let amount = parse_ether("5").unwrap();

    let receipt = h.treasury.charge("grace", amount).await.unwrap();
    assert_ne!(receipt.permit.hash, receipt.transfer.hash);

    let calls = h.chain.calls();
    let owner: Address = wallet.address.parse().unwrap();
    assert_eq!(calls[calls.len() - 2], "permit");
    assert_eq!(calls[calls.len() - 1], format!("transferFrom {owner:#x} {RELAYER:#x} {amount}"));

    let permits = h.chain.permits();
    assert_eq!(permits.len(), 1);
    assert_eq!(permits[0].owner(), owner);
    assert_eq!(permits[0].spender(), RELAYER);
    assert_eq!(permits[0].permit.value, U256::MAX);
}

#[tokio::test]
async fn failed_permit_never_calls_transfer_from() {
    let h = harness(FakeChain {
        fail_permit: true,
        ..FakeChain::new()
    });
    h.provisioner.ensure_wallet("heidi").await.unwrap();

    let err = h.treasury.charge("heidi", parse_ether("1").unwrap()).await.unwrap_err();
    assert!(format!("{err:#}").contains("Permit transaction failed"));
    assert!(!h.chain.calls().iter().any(|c| c.starts_with("transferFrom")));
}

#[tokio::test]
async fn transfer_between_agents_moves_from_sender() {
    let h = harness(FakeChain::new());
    let from = h.provisioner.ensure_wallet("ivan").await.unwrap();
    let to = h.provisioner.ensure_wallet("judy").await.unwrap();

    h.treasury
        .transfer_between("ivan", "judy", parse_ether("2").unwrap())
        .await
        .unwrap();

    let last = h.chain.calls().pop().unwrap();
    let from: Address = from.address.parse().unwrap();
    let to: Address = to.address.parse().unwrap();
    assert!(last.starts_with(&format!("transferFrom {from:#x} {to:#x}")));
}

#[tokio::test]
async fn minting_requires_a_wallet() {
    let h = harness(FakeChain::new());
    let err = h.treasury.mint_nft("nobody", "https://art/1.png", "One").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ChainError>(), Some(ChainError::WalletNotFound(_))));

    h.provisioner.ensure_wallet("kate").await.unwrap();
    h.treasury.mint_nft("kate", "https://art/1.png", "One").await.unwrap();
    assert!(h.chain.calls().last().unwrap().ends_with("https://art/1.png"));
}

#[tokio::test]
async fn balances_fall_back_to_zero_without_wallet() {
    let h = harness(FakeChain::new());
    assert_eq!(h.treasury.balance_of_handle("ghost").await.unwrap(), U256::ZERO);

    h.provisioner.ensure_wallet("leo").await.unwrap();
    assert_eq!(h.treasury.balance_of_handle("leo").await.unwrap(), U256::from(42u64));
    assert_eq!(h.treasury.owned_nfts(RELAYER).await, 2);
}

#[tokio::test]
async fn balance_read_failure_falls_back_to_zero() {
    let h = harness(FakeChain {
        fail_balance: true,
        ..FakeChain::new()
    });
    h.provisioner.ensure_wallet("mia").await.unwrap();
    assert_eq!(h.treasury.balance_of_handle("mia").await.unwrap(), U256::ZERO);
}
