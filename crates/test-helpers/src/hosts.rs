//! In-memory host implementations for driving the handler in tests.

use blocklocks_core::{
    ChainError, ChainHost, Clock, FeatureGate, InstantLockView, LockNotifier, NetworkBridge,
    SyncStatus,
};
use blocklocks_types::{Block, BlockLockSig, BlockRef, Hash, Inv, PeerId, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

// ═══════════════════════════════════════════════════════════════════════
// MockChain
// ═══════════════════════════════════════════════════════════════════════

struct ChainNode {
    parent: Option<Hash>,
    height: i32,
}

#[derive(Default)]
struct ChainInner {
    nodes: HashMap<Hash, ChainNode>,
    tip: Option<Hash>,
    block_data: HashMap<Hash, Block>,
    tx_index: HashMap<Hash, (Transaction, Option<Hash>)>,
    enforced: Vec<BlockRef>,
    activations: u32,
    activation_target: Option<Hash>,
    fail_activation: bool,
}

/// An in-memory block tree implementing [`ChainHost`].
///
/// Blocks are added explicitly; `enforce_block` and `activate_best_chain`
/// only record that they were called (plus an optional configured tip
/// switch), so tests can assert on the enforcement sequence.
#[derive(Default)]
pub struct MockChain {
    inner: Mutex<ChainInner>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block on top of `parent` (or a genesis when `None`).
    ///
    /// The hash is derived from `tag` so tests can name blocks.
    pub fn add_block(&self, parent: Option<&BlockRef>, tag: &[u8]) -> BlockRef {
        let hash = Hash::from_bytes(tag);
        let (parent_hash, height) = match parent {
            Some(p) => (Some(p.hash), p.height + 1),
            None => (None, 0),
        };
        self.inner.lock().unwrap().nodes.insert(
            hash,
            ChainNode {
                parent: parent_hash,
                height,
            },
        );
        BlockRef::new(hash, height)
    }

    /// Build a linear chain of `len` blocks tagged `prefix-0..len` and return
    /// the refs, genesis first. The tip is set to the last block.
    pub fn add_chain(&self, prefix: &str, len: usize) -> Vec<BlockRef> {
        let mut refs: Vec<BlockRef> = Vec::with_capacity(len);
        for i in 0..len {
            let tag = format!("{prefix}-{i}");
            let parent = refs.last().cloned();
            refs.push(self.add_block(parent.as_ref(), tag.as_bytes()));
        }
        if let Some(tip) = refs.last() {
            self.set_tip(tip);
        }
        refs
    }

    pub fn set_tip(&self, index: &BlockRef) {
        self.inner.lock().unwrap().tip = Some(index.hash);
    }

    /// Store block data for `read_block_from_disk`.
    pub fn store_block(&self, index: &BlockRef, time: i64, txs: Vec<Transaction>) {
        self.inner.lock().unwrap().block_data.insert(
            index.hash,
            Block {
                hash: index.hash,
                time,
                txs,
            },
        );
    }

    /// Record a transaction for `get_transaction`.
    pub fn index_transaction(&self, tx: Transaction, block_hash: Option<Hash>) {
        self.inner
            .lock()
            .unwrap()
            .tx_index
            .insert(tx.txid, (tx, block_hash));
    }

    /// Forget a transaction (simulates eviction by conflict).
    pub fn forget_transaction(&self, txid: &Hash) {
        self.inner.lock().unwrap().tx_index.remove(txid);
    }

    /// After the next successful activation, switch the tip here.
    pub fn set_activation_target(&self, index: &BlockRef) {
        self.inner.lock().unwrap().activation_target = Some(index.hash);
    }

    pub fn set_activation_failure(&self, fail: bool) {
        self.inner.lock().unwrap().fail_activation = fail;
    }

    /// Blocks passed to `enforce_block`, oldest first.
    pub fn enforced(&self) -> Vec<BlockRef> {
        self.inner.lock().unwrap().enforced.clone()
    }

    /// Number of `activate_best_chain` calls.
    pub fn activations(&self) -> u32 {
        self.inner.lock().unwrap().activations
    }
}

impl ChainHost for MockChain {
    fn lookup_block_index(&self, hash: &Hash) -> Option<BlockRef> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .get(hash)
            .map(|n| BlockRef::new(*hash, n.height))
    }

    fn active_tip(&self) -> Option<BlockRef> {
        let inner = self.inner.lock().unwrap();
        let tip = inner.tip?;
        inner.nodes.get(&tip).map(|n| BlockRef::new(tip, n.height))
    }

    fn ancestor(&self, index: &BlockRef, height: i32) -> Option<BlockRef> {
        if height < 0 || height > index.height {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        let mut cursor = index.hash;
        let mut cursor_height = index.height;
        while cursor_height > height {
            cursor = inner.nodes.get(&cursor)?.parent?;
            cursor_height -= 1;
        }
        Some(BlockRef::new(cursor, cursor_height))
    }

    fn enforce_block(&self, index: &BlockRef) {
        self.inner.lock().unwrap().enforced.push(index.clone());
    }

    fn activate_best_chain(&self) -> Result<(), ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_activation {
            return Err(ChainError::ActivationFailed("mock failure".into()));
        }
        inner.activations += 1;
        if let Some(target) = inner.activation_target.take() {
            inner.tip = Some(target);
        }
        Ok(())
    }

    fn read_block_from_disk(&self, index: &BlockRef) -> Option<Block> {
        self.inner.lock().unwrap().block_data.get(&index.hash).cloned()
    }

    fn get_transaction(&self, txid: &Hash) -> Option<(Transaction, Option<Hash>)> {
        self.inner.lock().unwrap().tx_index.get(txid).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Network, notifier, gates, clock
// ═══════════════════════════════════════════════════════════════════════

/// Records all outbound network activity.
#[derive(Default)]
pub struct MockNetwork {
    relayed: Mutex<Vec<Inv>>,
    erased: Mutex<Vec<(PeerId, Inv)>>,
    penalties: Mutex<Vec<(PeerId, i32)>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relayed(&self) -> Vec<Inv> {
        self.relayed.lock().unwrap().clone()
    }

    pub fn erased(&self) -> Vec<(PeerId, Inv)> {
        self.erased.lock().unwrap().clone()
    }

    pub fn penalties(&self) -> Vec<(PeerId, i32)> {
        self.penalties.lock().unwrap().clone()
    }
}

impl NetworkBridge for MockNetwork {
    fn relay_inventory(&self, inv: &Inv) {
        self.relayed.lock().unwrap().push(*inv);
    }

    fn erase_object_request(&self, peer: PeerId, inv: &Inv) {
        self.erased.lock().unwrap().push((peer, *inv));
    }

    fn punish_peer(&self, peer: PeerId, score: i32) {
        self.penalties.lock().unwrap().push((peer, score));
    }
}

/// Records lock notifications.
#[derive(Default)]
pub struct MockNotifier {
    internal: Mutex<Vec<(BlockRef, BlockLockSig)>>,
    ui: Mutex<Vec<(String, i32)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn internal(&self) -> Vec<(BlockRef, BlockLockSig)> {
        self.internal.lock().unwrap().clone()
    }

    pub fn ui(&self) -> Vec<(String, i32)> {
        self.ui.lock().unwrap().clone()
    }
}

impl LockNotifier for MockNotifier {
    fn notify_block_lock(&self, index: &BlockRef, sig: &BlockLockSig) {
        self.internal
            .lock()
            .unwrap()
            .push((index.clone(), sig.clone()));
    }

    fn notify_ui(&self, block_hash: &str, height: i32) {
        self.ui.lock().unwrap().push((block_hash.to_owned(), height));
    }
}

/// Feature gate backed by a set of active feature names.
#[derive(Default)]
pub struct TestFeatures {
    active: Mutex<HashSet<String>>,
}

impl TestFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct with the given features active.
    pub fn with_active(features: &[&str]) -> Self {
        let gate = Self::new();
        for f in features {
            gate.set_active(f, true);
        }
        gate
    }

    pub fn set_active(&self, feature: &str, active: bool) {
        let mut set = self.active.lock().unwrap();
        if active {
            set.insert(feature.to_owned());
        } else {
            set.remove(feature);
        }
    }
}

impl FeatureGate for TestFeatures {
    fn is_active(&self, feature: &str) -> bool {
        self.active.lock().unwrap().contains(feature)
    }
}

/// Instant-lock view backed by a set of locked txids.
#[derive(Default)]
pub struct TestInstantLocks {
    enabled: AtomicBool,
    locked: Mutex<HashSet<Hash>>,
}

impl TestInstantLocks {
    pub fn new(enabled: bool) -> Self {
        let locks = Self::default();
        locks.enabled.store(enabled, Ordering::Relaxed);
        locks
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn lock_tx(&self, txid: Hash) {
        self.locked.lock().unwrap().insert(txid);
    }
}

impl InstantLockView for TestInstantLocks {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn is_locked(&self, txid: &Hash) -> bool {
        self.locked.lock().unwrap().contains(txid)
    }
}

/// Sync tracker with a settable flag.
pub struct TestSync {
    synced: AtomicBool,
}

impl TestSync {
    pub fn new(synced: bool) -> Self {
        Self {
            synced: AtomicBool::new(synced),
        }
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Relaxed);
    }
}

impl SyncStatus for TestSync {
    fn is_blockchain_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }
}

/// Manually advanced clock.
pub struct ManualClock {
    ms: AtomicI64,
}

impl ManualClock {
    /// Start at a fixed, comfortably nonzero time.
    pub fn new() -> Self {
        Self::at_ms(1_700_000_000_000)
    }

    pub fn at_ms(ms: i64) -> Self {
        Self {
            ms: AtomicI64::new(ms),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        self.ms.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn advance_secs(&self, delta: i64) {
        self.advance_ms(delta * 1000);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.ms.load(Ordering::Relaxed)
    }

    fn adjusted_time_secs(&self) -> i64 {
        self.now_ms() / 1000
    }
}

/// A lockable transaction with a tagged txid.
pub fn lockable_tx(tag: &[u8]) -> Transaction {
    Transaction {
        txid: Hash::from_bytes(tag),
        coinbase: false,
        inputs: 1,
    }
}

/// A coinbase transaction with a tagged txid.
pub fn coinbase_tx(tag: &[u8]) -> Transaction {
    Transaction {
        txid: Hash::from_bytes(tag),
        coinbase: true,
        inputs: 1,
    }
}
