//! Capability traits the block lock handler depends on.
//!
//! The handler never touches the chain index, signing service, instant-lock
//! service, or network directly — the host node exposes each as a narrow
//! trait object. This breaks the reference cycles a concrete dependency on
//! the chain module would create, and lets tests drive the handler with
//! in-memory hosts.
//!
//! # Lock discipline
//!
//! The host's chain lock is ordered *before* the handler's state mutex.
//! Implementations of [`ChainHost`] may take the chain lock internally, so
//! the handler must not call them while holding its own mutex. The one
//! exception is [`ChainHost::ancestor`]: it walks the append-only index
//! structure and must not block on the chain lock.

use blocklocks_types::{
    Block, BlockLockSig, BlockRef, Bls12381G2Signature, Hash, Inv, PeerId, QuorumKind, RecoveredSig,
};
use std::sync::Arc;

/// Feature name for the block lock subsystem itself.
pub const FEATURE_BLOCK_LOCKS: &str = "blocklocks_enabled";

/// Feature name for the policy of rejecting blocks that conflict with
/// transaction-level locks.
pub const FEATURE_CONFLICTING_BLOCK_REJECTION: &str = "reject_conflicting_blocks";

/// Error from chain mutation primitives.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The chain module failed to activate the best chain.
    #[error("best-chain activation failed: {0}")]
    ActivationFailed(String),
}

/// The host chain module: index lookups, ancestor queries, and the two
/// mutation primitives enforcement needs.
pub trait ChainHost: Send + Sync {
    /// Look up the index entry for a block hash, if the header is known.
    fn lookup_block_index(&self, hash: &Hash) -> Option<BlockRef>;

    /// The tip of the currently active chain.
    fn active_tip(&self) -> Option<BlockRef>;

    /// The ancestor of `index` at `height`.
    ///
    /// Returns `None` if `height` is negative or above `index.height`.
    /// Must not block on the chain lock: the index is append-only and
    /// ancestor links never change once written.
    fn ancestor(&self, index: &BlockRef, height: i32) -> Option<BlockRef>;

    /// Walk from `index` toward genesis and mark every child of a main-chain
    /// ancestor that is not on the lineage to `index` as conflicting.
    fn enforce_block(&self, index: &BlockRef);

    /// Re-run best-chain selection after conflict marking.
    fn activate_best_chain(&self) -> Result<(), ChainError>;

    /// Read a full block back from storage.
    fn read_block_from_disk(&self, index: &BlockRef) -> Option<Block>;

    /// Find a transaction and the hash of its confirming block, if any.
    ///
    /// A mempool transaction is reported with a `None` block hash.
    fn get_transaction(
        &self,
        txid: &Hash,
    ) -> Option<(blocklocks_types::Transaction, Option<Hash>)>;
}

/// Listener for recovered threshold signatures.
///
/// Called on the signing service's delivery thread; implementations keep the
/// work short and re-enter their own processing paths.
pub trait RecoveredSigListener: Send + Sync {
    /// A recovered signature was produced for some earlier request.
    fn on_recovered_sig(&self, sig: &RecoveredSig);
}

/// The threshold signing service.
///
/// Share aggregation, quorum selection, and signature verification internals
/// all live behind this boundary.
pub trait SigningService: Send + Sync {
    /// Verify a recovered threshold signature against a request.
    fn verify_recovered_sig(
        &self,
        quorum: QuorumKind,
        height: i32,
        request_id: &Hash,
        msg_hash: &Hash,
        sig: &Bls12381G2Signature,
    ) -> bool;

    /// Contribute a signature share if this node sits in the responsible
    /// quorum. Asynchronous: the recovered signature, if one forms, arrives
    /// via the registered listeners.
    fn sign_if_member(&self, quorum: QuorumKind, request_id: &Hash, msg_hash: &Hash);

    /// Register a listener for recovered signatures.
    fn register_listener(&self, listener: Arc<dyn RecoveredSigListener>);

    /// Unregister a previously registered listener.
    fn unregister_listener(&self, listener: &Arc<dyn RecoveredSigListener>);
}

/// View of the transaction-level instant lock service.
pub trait InstantLockView: Send + Sync {
    /// Whether transaction-level locking is currently enabled.
    fn is_enabled(&self) -> bool;

    /// Whether the transaction holds an instant lock.
    fn is_locked(&self, txid: &Hash) -> bool;
}

/// Live on/off switches for consensus features.
pub trait FeatureGate: Send + Sync {
    /// Whether the named feature is currently active.
    fn is_active(&self, feature: &str) -> bool;
}

/// The masternode synchronization tracker.
pub trait SyncStatus: Send + Sync {
    /// Whether the blockchain is synced far enough to act on.
    fn is_blockchain_synced(&self) -> bool;
}

/// Outbound surface of the peer-to-peer layer.
pub trait NetworkBridge: Send + Sync {
    /// Relay an inventory announcement to all peers.
    fn relay_inventory(&self, inv: &Inv);

    /// Drop any outstanding request for this object from the peer's queue.
    fn erase_object_request(&self, peer: PeerId, inv: &Inv);

    /// Raise the peer's misbehavior score.
    fn punish_peer(&self, peer: PeerId, score: i32);
}

/// Sinks for lock notifications.
pub trait LockNotifier: Send + Sync {
    /// Internal signal: a new block lock is enforced at `index`.
    fn notify_block_lock(&self, index: &BlockRef, sig: &BlockLockSig);

    /// User-facing notification.
    fn notify_ui(&self, block_hash: &str, height: i32);
}

/// Time source.
///
/// `adjusted_time_secs` is the host's network-adjusted clock, used wherever
/// ages are compared against consensus timeouts.
pub trait Clock: Send + Sync {
    /// Wall-clock milliseconds.
    fn now_ms(&self) -> i64;

    /// Network-adjusted seconds.
    fn adjusted_time_secs(&self) -> i64;
}
