//! # Merkle Tree Scenarios (ps-02)
//!
//! MiMC-sponge trees built through `MerkleTreeService` and consumed by
//! `WithdrawalPreparer`.
//!
//! ## Test Categories
//!
//! 1. **Tree algebra** - incremental inserts, paths, capacity
//! 2. **Root validation** - unknown roots are never persisted
//! 3. **Chain sync** - deposits fetched from a node extend the tree
//! 4. **Withdrawal preparation** - spent notes, unknown commitments, prover

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use ps_01_event_sync::{
    EventService, EventSources, InMemoryEventStore, MockEventSync, MockLogProvider,
    MockSnapshotSource, NetworkConfig, SyncConfig, TokenConfig,
};
use ps_02_merkle_tree::{
    FileTreeStore, InMemoryTreeStore, MerkleTree, MerkleTreeApi, MerkleTreeError,
    MerkleTreeService, MimcSpongeHasher, MockPoolContract, MockProver, ProverContext,
    TreeConfig, TreeHasher, TreeState, TreeStore, WithdrawalPreparer, WithdrawalRequest,
};
use shared_types::{
    to_fixed_hex, DepositEvent, Event, EventKind, EventSet, InstanceKey, WithdrawalEvent, U256,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

const LEVELS: usize = 5;

fn instance() -> InstanceKey {
    InstanceKey::new(1, "eth", "0.1")
}

fn commitment(leaf_index: u32) -> U256 {
    U256::from(u64::from(leaf_index) * 7919 + 3)
}

fn deposit(leaf_index: u32) -> Event {
    Event::Deposit(DepositEvent {
        timestamp: 1_600_000_000,
        commitment: to_fixed_hex(&commitment(leaf_index)),
        block_number: 100 + u64::from(leaf_index) * 10,
        transaction_hash: format!("0x{:064x}", leaf_index + 1),
        leaf_index,
    })
}

fn deposits(n: u32) -> EventSet {
    EventSet::new((0..n).map(deposit).collect(), 100 + u64::from(n) * 10)
}

fn tree_config() -> TreeConfig {
    TreeConfig {
        levels: LEVELS,
        ..TreeConfig::for_testing()
    }
}

fn tree_service(
    events: Arc<MockEventSync>,
    contract: Arc<MockPoolContract>,
    store: Arc<dyn TreeStore>,
) -> Arc<MerkleTreeService> {
    Arc::new(MerkleTreeService::new(
        instance(),
        tree_config(),
        events,
        contract,
        store,
    ))
}

fn request(leaf_index: u32, nullifier_hash: u64) -> WithdrawalRequest {
    WithdrawalRequest {
        instance: instance(),
        commitment: commitment(leaf_index),
        nullifier_hash: U256::from(nullifier_hash),
        nullifier: U256::from(11),
        secret: U256::from(13),
        recipient: U256::from(0xbeef),
        relayer: U256::zero(),
        fee: U256::zero(),
        refund: U256::zero(),
    }
}

async fn ready_prover() -> (Arc<MockProver>, ProverContext) {
    let prover = Arc::new(MockProver::default());
    let context = ProverContext::initialize(prover.clone()).await.unwrap();
    (prover, context)
}

// =============================================================================
// 1. TREE ALGEBRA
// =============================================================================

#[test]
fn test_empty_levels_chain_from_zero_value() {
    let hasher = MimcSpongeHasher;
    let tree = MerkleTree::new(LEVELS, &[], hasher).unwrap();
    let zeros = tree.zeros();
    assert_eq!(zeros[0], hasher.zero_value());
    for level in 1..=LEVELS {
        assert_eq!(zeros[level], hasher.hash_pair(&zeros[level - 1], &zeros[level - 1]));
    }
    assert_eq!(tree.root(), zeros[LEVELS]);
}

#[test]
fn test_mimc_paths_recompute_root() {
    let leaves: Vec<U256> = (0..7).map(commitment).collect();
    let tree = MerkleTree::new(LEVELS, &leaves, MimcSpongeHasher).unwrap();
    for (index, leaf) in leaves.iter().enumerate() {
        let path = tree.path(index).unwrap();
        assert!(tree.verify_path(*leaf, &path), "leaf {index}");
    }
}

#[test]
fn test_full_tree_rejects_insert() {
    let leaves: Vec<U256> = (0..4).map(commitment).collect();
    let mut tree = MerkleTree::new(2, &leaves, MimcSpongeHasher).unwrap();
    assert!(matches!(
        tree.insert(commitment(4)),
        Err(MerkleTreeError::TreeFull { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_split_inserts_match_rebuild(total in 1u32..20, split in 0u32..20) {
        let split = split.min(total) as usize;
        let leaves: Vec<U256> = (0..total).map(commitment).collect();

        let mut incremental = MerkleTree::new(LEVELS, &leaves[..split], MimcSpongeHasher).unwrap();
        incremental.bulk_insert(&leaves[split..]).unwrap();
        let rebuilt = MerkleTree::new(LEVELS, &leaves, MimcSpongeHasher).unwrap();

        prop_assert_eq!(incremental.root(), rebuilt.root());
        prop_assert_eq!(incremental.to_snapshot(), rebuilt.to_snapshot());
    }
}

// =============================================================================
// 2. ROOT VALIDATION
// =============================================================================

#[tokio::test]
async fn test_unknown_root_leaves_store_untouched() {
    let store = Arc::new(InMemoryTreeStore::new());
    let service = tree_service(
        Arc::new(MockEventSync::with_deposits(deposits(3))),
        Arc::new(MockPoolContract::default()),
        store.clone(),
    );

    let err = service.build_tree().await.unwrap_err();
    assert!(matches!(err, MerkleTreeError::UnknownRoot { .. }));
    assert_eq!(service.state(), TreeState::Loaded { stale: true });
    assert_eq!(store.save_count(), 0);
    assert!(store.load(&instance()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_root_accepted_once_contract_catches_up() {
    let expected = MerkleTree::new(
        LEVELS,
        &(0..3).map(commitment).collect::<Vec<_>>(),
        MimcSpongeHasher,
    )
    .unwrap()
    .root();
    let contract = Arc::new(MockPoolContract::default());
    let store = Arc::new(InMemoryTreeStore::new());
    let service = tree_service(
        Arc::new(MockEventSync::with_deposits(deposits(3))),
        contract.clone(),
        store.clone(),
    );

    assert!(service.build_tree().await.is_err());
    contract.known_roots.lock().insert(expected);

    let tree = service.build_tree().await.unwrap();
    assert_eq!(tree.root(), expected);
    assert_eq!(service.state(), TreeState::Persisted);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_file_store_tree_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(MockEventSync::with_deposits(deposits(2)));
    let contract = Arc::new(MockPoolContract::accepting());

    tree_service(
        events.clone(),
        contract.clone(),
        Arc::new(FileTreeStore::new(dir.path())),
    )
    .build_tree()
    .await
    .unwrap();

    let restarted = tree_service(events, contract, Arc::new(FileTreeStore::new(dir.path())));
    let persisted = restarted.get_tree().await.unwrap().unwrap();
    assert_eq!(persisted.len(), 2);
    assert_eq!(restarted.state(), TreeState::Loaded { stale: true });
}

// =============================================================================
// 3. CHAIN SYNC
// =============================================================================

fn network() -> NetworkConfig {
    let mut instance_address = BTreeMap::new();
    instance_address.insert("0.1".to_string(), "0xpool".to_string());
    let mut tokens = BTreeMap::new();
    tokens.insert(
        "eth".to_string(),
        TokenConfig {
            symbol: "ETH".to_string(),
            decimals: 18,
            instance_address,
        },
    );
    NetworkConfig {
        name: "testnet".to_string(),
        rpc_url: "http://localhost:8545".to_string(),
        indexer_url: None,
        deployed_block: 1,
        native_currency: "eth".to_string(),
        encrypted_notes_block: None,
        echoer_address: None,
        snapshot_enabled: false,
        tokens,
    }
}

#[tokio::test(start_paused = true)]
async fn test_new_chain_deposits_extend_tree() {
    let provider = Arc::new(MockLogProvider::new((0..3).map(deposit).collect(), 200));
    let events = Arc::new(EventService::new(
        instance(),
        network(),
        SyncConfig::for_testing(),
        EventSources {
            store: Arc::new(InMemoryEventStore::new()),
            snapshots: Arc::new(MockSnapshotSource::default()),
            provider: provider.clone(),
            indexer: None,
        },
    ));
    let store = Arc::new(InMemoryTreeStore::new());
    let service = MerkleTreeService::new(
        instance(),
        tree_config(),
        events,
        Arc::new(MockPoolContract::accepting()),
        store.clone(),
    );

    assert_eq!(service.build_tree().await.unwrap().len(), 3);

    provider.append((3..6).map(deposit).collect(), 300);
    let tree = service.build_tree().await.unwrap();

    let leaves: Vec<U256> = (0..6).map(commitment).collect();
    assert_eq!(tree.elements(), leaves.as_slice());
    assert_eq!(
        tree.root(),
        MerkleTree::new(LEVELS, &leaves, MimcSpongeHasher)
            .unwrap()
            .root()
    );
    assert_eq!(store.save_count(), 2);
}

// =============================================================================
// 4. WITHDRAWAL PREPARATION
// =============================================================================

#[tokio::test]
async fn test_prepare_produces_proof_and_args() {
    let events = Arc::new(MockEventSync::with_deposits(deposits(4)));
    let trees = tree_service(
        events.clone(),
        Arc::new(MockPoolContract::accepting()),
        Arc::new(InMemoryTreeStore::new()),
    );
    let (prover, context) = ready_prover().await;
    let preparer = WithdrawalPreparer::<MimcSpongeHasher>::new(trees.clone(), events);

    let prepared = preparer.prepare(&request(2, 77), &context).await.unwrap();

    assert_eq!(prepared.leaf_index, 2);
    assert_eq!(prepared.args.len(), 6);
    let witnesses = prover.witnesses.lock();
    assert_eq!(witnesses.len(), 1);
    assert_eq!(prepared.args[0], to_fixed_hex(&witnesses[0].root));
    assert_eq!(witnesses[0].path_elements.len(), LEVELS);
    assert_eq!(witnesses[0].path_indices[0], 0);
}

#[tokio::test]
async fn test_spent_note_is_refused() {
    let events = Arc::new(MockEventSync::with_deposits(deposits(2)));
    events.set_events(
        EventKind::Withdrawal,
        EventSet::new(
            vec![Event::Withdrawal(WithdrawalEvent {
                to: "0x0000000000000000000000000000000000000001".to_string(),
                fee: "0".to_string(),
                block_number: 150,
                nullifier_hash: to_fixed_hex(&U256::from(77)).to_uppercase().replace("0X", "0x"),
                transaction_hash: format!("0x{:064x}", 99),
            })],
            150,
        ),
    );
    let trees = tree_service(
        events.clone(),
        Arc::new(MockPoolContract::accepting()),
        Arc::new(InMemoryTreeStore::new()),
    );
    let (prover, context) = ready_prover().await;
    let preparer = WithdrawalPreparer::<MimcSpongeHasher>::new(trees, events);

    let err = preparer.prepare(&request(1, 77), &context).await.unwrap_err();
    assert!(matches!(err, MerkleTreeError::NullifierSpent(_)));
    assert!(prover.witnesses.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_commitment_is_reported() {
    let events = Arc::new(MockEventSync::with_deposits(deposits(2)));
    let trees = tree_service(
        events.clone(),
        Arc::new(MockPoolContract::accepting()),
        Arc::new(InMemoryTreeStore::new()),
    );
    let (_prover, context) = ready_prover().await;
    let preparer = WithdrawalPreparer::<MimcSpongeHasher>::new(trees, events);

    let err = preparer.prepare(&request(9, 1), &context).await.unwrap_err();
    assert!(matches!(err, MerkleTreeError::LeafNotFound(_)));
}

#[tokio::test]
async fn test_prover_initialization_failure_surfaces() {
    let prover = Arc::new(MockProver {
        fail_init: true,
        ..MockProver::default()
    });
    assert!(matches!(
        ProverContext::initialize(prover).await,
        Err(MerkleTreeError::Prover(_))
    ));
}
