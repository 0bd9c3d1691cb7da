//! The block lock handler.
//!
//! Coordinates four asynchronous sources into one lock state: inbound
//! network messages, chain index notifications, recovered signatures from
//! the threshold signing service, and the periodic scheduler tick.
//!
//! # Lock discipline
//!
//! The host's chain lock is ordered before the handler's state mutex. Every
//! method here scopes its mutex acquisitions so that [`ChainHost`] calls
//! which may take the chain lock (`lookup_block_index`, `active_tip`,
//! `enforce_block`, `activate_best_chain`, block and transaction reads)
//! happen with the state mutex released. Ancestor queries are the exception
//! and are safe under the mutex (see [`ChainHost::ancestor`]).
//!
//! Heavy work (enforcement, signing attempts) never runs on a caller's
//! thread: notification entry points either mutate state briefly or enqueue
//! a task for the single-threaded scheduler.

use crate::block_txs::BlockTxIndex;
use crate::config::{
    HandlerConfig, CLEANUP_INTERVAL_MS, CLEANUP_SEEN_TIMEOUT_MS, MISBEHAVING_SCORE,
    SAFE_SIGN_DEPTH, TX_CLEANUP_CONFIRMATIONS, WAIT_FOR_ISLOCK_TIMEOUT_SECS,
};
use crate::seen::SeenLocks;
use crate::store::LockStore;
use blocklocks_core::{
    ChainHost, Clock, FeatureGate, InstantLockView, LockNotifier, NetworkBridge,
    RecoveredSigListener, SigningService, SyncStatus, Task, FEATURE_BLOCK_LOCKS,
    FEATURE_CONFLICTING_BLOCK_REJECTION,
};
use blocklocks_metrics as metrics;
use blocklocks_types::{
    block_lock_request_id, Block, BlockLockSig, BlockRef, Hash, Inv, PeerId, RecoveredSig,
    Transaction,
};
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The host services the handler is wired to.
pub struct HandlerHosts {
    pub chain: Arc<dyn ChainHost>,
    pub signer: Arc<dyn SigningService>,
    pub instant_locks: Arc<dyn InstantLockView>,
    pub features: Arc<dyn FeatureGate>,
    pub sync: Arc<dyn SyncStatus>,
    pub network: Arc<dyn NetworkBridge>,
    pub notifier: Arc<dyn LockNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// State guarded by the handler mutex.
struct HandlerState {
    store: LockStore,
    seen: SeenLocks,
    txs: BlockTxIndex,
    last_signed_height: i32,
    last_signed_request_id: Hash,
    last_signed_msg_hash: Hash,
    last_cleanup_ms: i64,
}

impl HandlerState {
    fn new() -> Self {
        Self {
            store: LockStore::new(),
            seen: SeenLocks::new(),
            txs: BlockTxIndex::new(),
            last_signed_height: -1,
            last_signed_request_id: Hash::ZERO,
            last_signed_msg_hash: Hash::ZERO,
            last_cleanup_ms: 0,
        }
    }
}

/// The block lock handler.
///
/// One instance per node, shared by reference with the network dispatcher,
/// the chain notification fan-out, the signing service (as a recovered-sig
/// listener), and the scheduler worker.
pub struct BlockLockHandler {
    chain: Arc<dyn ChainHost>,
    signer: Arc<dyn SigningService>,
    instant_locks: Arc<dyn InstantLockView>,
    features: Arc<dyn FeatureGate>,
    sync: Arc<dyn SyncStatus>,
    network: Arc<dyn NetworkBridge>,
    notifier: Arc<dyn LockNotifier>,
    clock: Arc<dyn Clock>,
    tasks: Sender<Task>,
    config: HandlerConfig,

    enabled: AtomicBool,
    enforced: AtomicBool,
    tip_check_scheduled: AtomicBool,

    state: Mutex<HandlerState>,
}

impl BlockLockHandler {
    /// Create a handler wired to its hosts. `tasks` feeds the scheduler's
    /// single consumer.
    pub fn new(hosts: HandlerHosts, config: HandlerConfig, tasks: Sender<Task>) -> Self {
        Self {
            chain: hosts.chain,
            signer: hosts.signer,
            instant_locks: hosts.instant_locks,
            features: hosts.features,
            sync: hosts.sync,
            network: hosts.network,
            notifier: hosts.notifier,
            clock: hosts.clock,
            tasks,
            config,
            enabled: AtomicBool::new(false),
            enforced: AtomicBool::new(false),
            tip_check_scheduled: AtomicBool::new(false),
            state: Mutex::new(HandlerState::new()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HandlerState> {
        self.state.lock().expect("handler state mutex poisoned")
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// Whether the feature gate currently allows block locks.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Whether locks are actively enforced against the chain.
    pub fn is_enforced(&self) -> bool {
        self.enforced.load(Ordering::Relaxed)
    }

    /// Whether an inventory object has already been observed.
    pub fn already_have(&self, wire_hash: &Hash) -> bool {
        self.state().seen.contains(wire_hash)
    }

    /// Serve a lock by wire-hash. Only the current best is ever served; old
    /// locks are deliberately forgotten so that only the latest propagates.
    pub fn get_lock_by_hash(&self, wire_hash: &Hash) -> Option<BlockLockSig> {
        let st = self.state();
        if *wire_hash != *st.store.best_hash() {
            return None;
        }
        Some(st.store.best().clone())
    }

    /// The current best lock (possibly null).
    pub fn best_lock(&self) -> BlockLockSig {
        self.state().store.best().clone()
    }

    /// Whether the block at `height`/`block_hash` lies on the locked lineage.
    pub fn has_lock(&self, height: i32, block_hash: &Hash) -> bool {
        let enforced = self.enforced.load(Ordering::Relaxed);
        self.state()
            .store
            .has_lock(&*self.chain, enforced, height, block_hash)
    }

    /// Whether the block at `height`/`block_hash` conflicts with the locked
    /// lineage.
    pub fn has_conflicting_lock(&self, height: i32, block_hash: &Hash) -> bool {
        let enforced = self.enforced.load(Ordering::Relaxed);
        self.state()
            .store
            .has_conflicting_lock(&*self.chain, enforced, height, block_hash)
    }

    /// Whether a miner may include the transaction without risking a lock
    /// conflict: true when the conflict-rejection policy or enforcement is
    /// off, when instant-send is off, when the transaction holds an instant
    /// lock, or when it has been known long enough that no lock will form.
    pub fn is_tx_safe_for_mining(&self, txid: &Hash) -> bool {
        if !self.features.is_active(FEATURE_CONFLICTING_BLOCK_REJECTION) {
            return true;
        }
        if !self.is_enabled() || !self.is_enforced() {
            return true;
        }
        if !self.instant_locks.is_enabled() {
            return true;
        }
        if self.instant_locks.is_locked(txid) {
            return true;
        }

        let now_secs = self.clock.adjusted_time_secs();
        let age = {
            let st = self.state();
            st.txs.first_seen(txid).map(|t| now_secs - t).unwrap_or(0)
        };
        age >= WAIT_FOR_ISLOCK_TIMEOUT_SECS
    }

    // ═══════════════════════════════════════════════════════════════════
    // Inbound processing
    // ═══════════════════════════════════════════════════════════════════

    /// Decode and process an inbound `BLSIG` payload from a peer.
    pub fn process_message(&self, from: PeerId, payload: &[u8]) {
        if !self.features.is_active(FEATURE_BLOCK_LOCKS) {
            return;
        }

        match BlockLockSig::from_wire(payload) {
            Ok(blsig) => {
                let wire_hash = blsig.wire_hash();
                self.process_new_lock(Some(from), blsig, wire_hash);
            }
            Err(err) => {
                warn!(peer = %from, error = %err, "undecodable block lock message");
                self.network.punish_peer(from, MISBEHAVING_SCORE);
            }
        }
    }

    /// Process a lock signature from a peer (`Some(peer)`) or from our own
    /// signing completion (`None`).
    pub fn process_new_lock(&self, from: Option<PeerId>, blsig: BlockLockSig, wire_hash: Hash) {
        self.check_active_state();

        let inv = Inv::block_lock(wire_hash);
        if let Some(peer) = from {
            self.network.erase_object_request(peer, &inv);
        }

        let now_ms = self.clock.now_ms();
        {
            let mut st = self.state();
            if !st.seen.insert(wire_hash, now_ms) {
                metrics::record_lock_rejected("duplicate");
                return;
            }

            if !st.store.best().is_null() && blsig.height <= st.store.best().height {
                // older locks are neither processed nor relayed
                metrics::record_lock_rejected("stale");
                return;
            }
        }

        let request_id = block_lock_request_id(blsig.height);
        if !self.signer.verify_recovered_sig(
            self.config.quorum,
            blsig.height,
            &request_id,
            &blsig.block_hash,
            &blsig.sig,
        ) {
            warn!(lock = %blsig, peer = ?from, "invalid block lock signature");
            metrics::record_lock_rejected("invalid_signature");
            if let Some(peer) = from {
                self.network.punish_peer(peer, MISBEHAVING_SCORE);
            }
            return;
        }

        let index = self.chain.lookup_block_index(&blsig.block_hash);

        {
            let mut st = self.state();
            st.store.adopt(wire_hash, blsig.clone());
            metrics::set_best_lock_height(blsig.height);

            if let Some(index) = index.as_ref() {
                if index.height != blsig.height {
                    // Should not happen with an honest quorum; keep the lock
                    // as best by height but do not treat the block as known,
                    // and do not relay.
                    warn!(
                        lock = %blsig,
                        index_height = index.height,
                        "block lock height does not match the block's height"
                    );
                    metrics::record_lock_rejected("height_mismatch");
                    return;
                }
                st.store.attach_index(index.clone());
            }
            // Unknown block: still relay; enforcement happens once the
            // header arrives.
        }

        self.network.relay_inventory(&inv);
        metrics::record_lock_processed();

        if index.is_some() && self.tasks.send(Task::CheckEnforce).is_err() {
            debug!("scheduler stopped; dropping enforcement task");
        }

        debug!(lock = %blsig, peer = ?from, "processed new block lock signature");
    }

    /// Handle a recovered signature delivered by the signing service for the
    /// request this node last initiated. Self-acceptance goes through
    /// [`Self::process_new_lock`] so it has the same semantics as network
    /// acceptance.
    pub fn handle_recovered_sig(&self, rec: &RecoveredSig) {
        if !self.is_enabled() {
            return;
        }

        let blsig = {
            let st = self.state();
            if rec.request_id != st.last_signed_request_id
                || rec.msg_hash != st.last_signed_msg_hash
            {
                // not what we asked to sign
                return;
            }
            if st.store.best().height >= st.last_signed_height {
                // the same or a better lock already arrived over the network
                return;
            }
            BlockLockSig {
                height: st.last_signed_height,
                block_hash: st.last_signed_msg_hash,
                sig: rec.sig,
            }
        };

        let wire_hash = blsig.wire_hash();
        self.process_new_lock(None, blsig, wire_hash);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Chain notifications
    // ═══════════════════════════════════════════════════════════════════

    /// A new header was accepted into the chain index.
    pub fn accepted_block_header(&self, index: &BlockRef) {
        let mut st = self.state();

        if index.hash == st.store.best().block_hash {
            debug!(block_hash = %index.hash, "block header for the best lock came in late");

            if st.store.best().height != index.height {
                warn!(
                    lock = %st.store.best(),
                    index_height = index.height,
                    "block lock height does not match the block's height"
                );
                return;
            }

            // Enforcement runs on the next scheduler pass; it may first
            // invalidate competitors without activating the locked chain if
            // only the header is known. Regular block processing finishes
            // the job when the block body arrives.
            st.store.attach_index(index.clone());
        }
    }

    /// The active chain tip changed. Collapses bursts into a single
    /// scheduler pass via the scheduled flag.
    pub fn updated_block_tip(&self) {
        if self
            .tip_check_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            && self.tasks.send(Task::TipCheck).is_err()
        {
            self.tip_check_scheduled.store(false, Ordering::SeqCst);
        }
    }

    /// A block was connected to the active chain.
    pub fn block_connected(&self, block: &Block, index: &BlockRef) {
        if !self.sync.is_blockchain_synced() {
            return;
        }

        let now_secs = self.clock.adjusted_time_secs();
        self.state().txs.on_block_connected(index.hash, block, now_secs);
    }

    /// A block was disconnected from the active chain.
    pub fn block_disconnected(&self, index: &BlockRef) {
        self.state().txs.remove_block(&index.hash);
    }

    /// A transaction entered the mempool.
    pub fn transaction_added_to_mempool(&self, tx: &Transaction, accept_time_secs: i64) {
        if !tx.is_lockable() {
            return;
        }
        self.state().txs.note_mempool_tx(tx.txid, accept_time_secs);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Scheduler entry points
    // ═══════════════════════════════════════════════════════════════════

    /// The periodic scheduler pass: refresh state, enforce, retry signing.
    pub fn run_tick(&self) {
        self.check_active_state();
        self.enforce_best_lock();
        self.try_sign_chain_tip();
    }

    /// Run a zero-delay task enqueued by an event.
    pub fn run_task(&self, task: Task) {
        match task {
            Task::CheckEnforce => {
                self.check_active_state();
                self.enforce_best_lock();
            }
            Task::TipCheck => {
                self.check_active_state();
                self.enforce_best_lock();
                self.try_sign_chain_tip();
                self.tip_check_scheduled.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Recompute the enabled/enforced flags. On the activation edge, clear
    /// all lock state: values left over from an earlier activation period
    /// must not be enforced.
    pub fn check_active_state(&self) {
        let past_activation = self.chain.active_tip().is_some_and(|tip| {
            tip.height > 0 && tip.height - 1 >= self.config.activation_height
        });

        let was_enforced = self.enforced.load(Ordering::Relaxed);
        let enabled = self.features.is_active(FEATURE_BLOCK_LOCKS);
        self.enabled.store(enabled, Ordering::Relaxed);
        let enforced = enabled && past_activation;
        self.enforced.store(enforced, Ordering::Relaxed);

        if !was_enforced && enforced {
            debug!("block lock enforcement activated; clearing stale lock state");
            self.state().store.reset();
        }
    }

    /// Attempt to initiate threshold signing of the current chain tip.
    ///
    /// Contending tips at the same height are accepted: the attempt may
    /// produce no lock, and the periodic retry self-heals.
    pub fn try_sign_chain_tip(&self) {
        self.cleanup();

        if !self.config.masternode {
            return;
        }
        if !self.sync.is_blockchain_synced() {
            return;
        }
        if !self.is_enabled() {
            return;
        }

        let Some(tip) = self.chain.active_tip() else {
            return;
        };
        if tip.height <= 0 {
            // genesis has no predecessor
            return;
        }

        let enforced = self.enforced.load(Ordering::Relaxed);
        {
            let st = self.state();
            if tip.height == st.last_signed_height {
                // already signed this one
                return;
            }
            if st.store.best().height >= tip.height {
                // already covered by the same or a better lock
                return;
            }
            if st
                .store
                .has_conflicting_lock(&*self.chain, enforced, tip.height, &tip.hash)
            {
                // enforcement will switch to the locked chain
                return;
            }
        }

        debug!(block_hash = %tip.hash, height = tip.height, "trying to lock chain tip");

        if self.instant_locks.is_enabled()
            && self.features.is_active(FEATURE_CONFLICTING_BLOCK_REJECTION)
            && !self.walk_is_safe_to_sign(&tip)
        {
            metrics::record_sign_deferred();
            return;
        }

        let request_id = block_lock_request_id(tip.height);
        let msg_hash = tip.hash;

        {
            let mut st = self.state();
            if st.store.best().height >= tip.height {
                // a better lock arrived while the safety walk ran
                return;
            }
            st.last_signed_height = tip.height;
            st.last_signed_request_id = request_id;
            st.last_signed_msg_hash = msg_hash;
        }

        metrics::record_sign_attempt();
        self.signer
            .sign_if_member(self.config.quorum, &request_id, &msg_hash);
    }

    /// Walk back from the tip through the blocks a lock would finalize and
    /// require every lockable transaction to be instant-locked or old
    /// enough. Stops after the tip and the `SAFE_SIGN_DEPTH` blocks below
    /// it, or at an already locked block.
    fn walk_is_safe_to_sign(&self, tip: &BlockRef) -> bool {
        let mut walk = Some(tip.clone());
        while let Some(cur) = walk {
            if tip.height - cur.height > SAFE_SIGN_DEPTH {
                debug!(
                    height = tip.height,
                    "tip and previous {} blocks all safe", SAFE_SIGN_DEPTH
                );
                break;
            }
            if self.has_lock(cur.height, &cur.hash) {
                debug!(height = cur.height, "safety walk reached a locked block");
                break;
            }

            let Some(txids) = self.block_txs_for(&cur.hash) else {
                walk = self.chain.ancestor(&cur, cur.height - 1);
                continue;
            };

            let now_secs = self.clock.adjusted_time_secs();
            for txid in txids.iter() {
                let age = {
                    let st = self.state();
                    st.txs.first_seen(txid).map(|t| now_secs - t).unwrap_or(0)
                };
                if age < WAIT_FOR_ISLOCK_TIMEOUT_SECS && !self.instant_locks.is_locked(txid) {
                    debug!(
                        block_hash = %cur.hash,
                        txid = %txid,
                        age,
                        "not signing: transaction is neither locked nor old enough"
                    );
                    return false;
                }
            }

            walk = self.chain.ancestor(&cur, cur.height - 1);
        }
        true
    }

    /// The lockable transaction set of a block, loading it from disk and
    /// backfilling the index when the block was connected before this
    /// handler started.
    fn block_txs_for(&self, block_hash: &Hash) -> Option<Arc<HashSet<Hash>>> {
        if let Some(txids) = self.state().txs.get(block_hash) {
            return Some(txids);
        }

        debug!(block_hash = %block_hash, "no recorded transaction set, reading block from disk");

        let index = self.chain.lookup_block_index(block_hash)?;
        let block = self.chain.read_block_from_disk(&index)?;

        let txids: HashSet<Hash> = block
            .txs
            .iter()
            .filter(|tx| tx.is_lockable())
            .map(|tx| tx.txid)
            .collect();
        let txids = Arc::new(txids);

        self.state()
            .txs
            .backfill(*block_hash, txids.clone(), block.time);
        Some(txids)
    }

    /// Convert the best known lock into chain state: mark competitors
    /// conflicting, activate the locked chain if needed, and notify exactly
    /// once per index entry.
    ///
    /// Must be called with neither the chain lock nor the state mutex held;
    /// in particular never from inside a chain notification callback.
    pub fn enforce_best_lock(&self) {
        let (blsig, index) = {
            let st = self.state();
            if !self.is_enforced() {
                return;
            }
            match st.store.best_known() {
                Some(pair) => pair.clone(),
                // without the header there is nothing to enforce yet
                None => return,
            }
        };

        debug!(lock = %blsig, block_hash = %index.hash, "enforcing block lock");
        self.chain.enforce_block(&index);

        let on_locked_lineage = |tip: &BlockRef| {
            self.chain
                .ancestor(tip, index.height)
                .is_some_and(|a| a == index)
        };

        let Some(tip) = self.chain.active_tip() else {
            return;
        };
        if !on_locked_lineage(&tip) {
            if let Err(err) = self.chain.activate_best_chain() {
                warn!(error = %err, "failed to activate the locked chain");
                return;
            }
            let Some(tip) = self.chain.active_tip() else {
                return;
            };
            if !on_locked_lineage(&tip) {
                // the locked block may still be missing; the next tick retries
                return;
            }
        }

        {
            let mut st = self.state();
            if !st.store.mark_notified(&index) {
                return;
            }
        }

        metrics::record_lock_enforced(index.height);
        self.notifier.notify_block_lock(&index, &blsig);
        self.notifier.notify_ui(&index.hash.to_string(), index.height);
    }

    /// Expire old seen entries and evict transaction tracking the safety
    /// walk can no longer need. Throttled to every [`CLEANUP_INTERVAL_MS`].
    fn cleanup(&self) {
        if !self.sync.is_blockchain_synced() {
            return;
        }

        let now_ms = self.clock.now_ms();
        {
            let st = self.state();
            if now_ms - st.last_cleanup_ms < CLEANUP_INTERVAL_MS {
                return;
            }
        }

        let expired = self.state().seen.expire(now_ms, CLEANUP_SEEN_TIMEOUT_MS);
        if expired > 0 {
            metrics::record_seen_expired(expired);
        }

        let enforced = self.enforced.load(Ordering::Relaxed);

        // Locked blocks drop their whole record; conflicting blocks keep the
        // first-seen times (their transactions may return in other blocks).
        let block_hashes = self.state().txs.block_hashes();
        for block_hash in block_hashes {
            let Some(index) = self.chain.lookup_block_index(&block_hash) else {
                warn!(block_hash = %block_hash, "connected block missing from the chain index");
                continue;
            };
            let mut st = self.state();
            if st
                .store
                .has_lock(&*self.chain, enforced, index.height, &index.hash)
            {
                st.txs.remove_block_and_txs(&block_hash);
            } else if st
                .store
                .has_conflicting_lock(&*self.chain, enforced, index.height, &index.hash)
            {
                st.txs.remove_block(&block_hash);
            }
        }

        let tracked = self.state().txs.tracked_txids();
        let tip = self.chain.active_tip();
        for txid in tracked {
            match self.chain.get_transaction(&txid) {
                None => {
                    // vanished, most likely conflicted away
                    self.state().txs.drop_tx(&txid);
                }
                Some((_, Some(block_hash))) => {
                    let buried = match (tip.as_ref(), self.chain.lookup_block_index(&block_hash)) {
                        (Some(tip), Some(index)) => {
                            tip.height - index.height >= TX_CLEANUP_CONFIRMATIONS
                                && self
                                    .chain
                                    .ancestor(tip, index.height)
                                    .is_some_and(|a| a == index)
                        }
                        _ => false,
                    };
                    if buried {
                        self.state().txs.drop_tx(&txid);
                    }
                }
                Some((_, None)) => {}
            }
        }

        self.state().last_cleanup_ms = now_ms;
    }
}

impl RecoveredSigListener for BlockLockHandler {
    fn on_recovered_sig(&self, sig: &RecoveredSig) {
        self.handle_recovered_sig(sig);
    }
}
