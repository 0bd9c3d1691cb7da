//! Current-best lock state and the ancestor-based lock queries.

use blocklocks_core::ChainHost;
use blocklocks_types::{BlockLockSig, BlockRef, Hash};

/// The handler's view of the best lock.
///
/// `best` may refer to a block not yet known locally; `best_known` carries
/// the lock together with its chain index entry once the header is known, so
/// the two can never disagree. `last_notified` keeps enforcement
/// notifications idempotent per index entry.
#[derive(Debug, Default)]
pub struct LockStore {
    best_hash: Hash,
    best: BlockLockSig,
    best_known: Option<(BlockLockSig, BlockRef)>,
    last_notified: Option<BlockRef>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The best lock by height (possibly null).
    pub fn best(&self) -> &BlockLockSig {
        &self.best
    }

    /// Wire-hash of the best lock (zero when none).
    pub fn best_hash(&self) -> &Hash {
        &self.best_hash
    }

    /// The best lock whose block is known, with its index entry.
    pub fn best_known(&self) -> Option<&(BlockLockSig, BlockRef)> {
        self.best_known.as_ref()
    }

    /// Index entry of the best known lock.
    pub fn best_index(&self) -> Option<&BlockRef> {
        self.best_known.as_ref().map(|(_, index)| index)
    }

    /// Adopt a new best lock. The caller has already established that it
    /// supersedes the previous best by strict height.
    pub fn adopt(&mut self, wire_hash: Hash, blsig: BlockLockSig) {
        self.best_hash = wire_hash;
        self.best = blsig;
    }

    /// Attach the chain index entry for the current best lock.
    pub fn attach_index(&mut self, index: BlockRef) {
        self.best_known = Some((self.best.clone(), index));
    }

    /// Clear all lock state (used when enforcement first activates, so stale
    /// locks from an earlier activation cannot carry over).
    pub fn reset(&mut self) {
        self.best_hash = Hash::ZERO;
        self.best = BlockLockSig::null();
        self.best_known = None;
        self.last_notified = None;
    }

    /// Record a notification for `index`. Returns `false` when `index` was
    /// already notified.
    pub fn mark_notified(&mut self, index: &BlockRef) -> bool {
        if self.last_notified.as_ref() == Some(index) {
            return false;
        }
        self.last_notified = Some(index.clone());
        true
    }

    /// Whether the block at `height` with `block_hash` lies on the locked
    /// lineage.
    pub fn has_lock(
        &self,
        chain: &dyn ChainHost,
        enforced: bool,
        height: i32,
        block_hash: &Hash,
    ) -> bool {
        if !enforced {
            return false;
        }
        let Some((_, best_index)) = self.best_known.as_ref() else {
            return false;
        };
        if height > best_index.height {
            return false;
        }
        if height == best_index.height {
            return *block_hash == best_index.hash;
        }
        chain
            .ancestor(best_index, height)
            .is_some_and(|a| a.hash == *block_hash)
    }

    /// Whether the block at `height` with `block_hash` conflicts with the
    /// locked lineage.
    pub fn has_conflicting_lock(
        &self,
        chain: &dyn ChainHost,
        enforced: bool,
        height: i32,
        block_hash: &Hash,
    ) -> bool {
        if !enforced {
            return false;
        }
        let Some((_, best_index)) = self.best_known.as_ref() else {
            return false;
        };
        if height > best_index.height {
            return false;
        }
        if height == best_index.height {
            return *block_hash != best_index.hash;
        }
        let ancestor = chain
            .ancestor(best_index, height)
            .expect("ancestor below the best-known lock height must exist");
        ancestor.hash != *block_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocklocks_test_helpers::MockChain;
    use blocklocks_types::zero_bls_signature;

    fn lock_for(index: &BlockRef) -> BlockLockSig {
        BlockLockSig {
            height: index.height,
            block_hash: index.hash,
            sig: zero_bls_signature(),
        }
    }

    fn store_with_best(index: &BlockRef) -> LockStore {
        let mut store = LockStore::new();
        let blsig = lock_for(index);
        store.adopt(blsig.wire_hash(), blsig);
        store.attach_index(index.clone());
        store
    }

    #[test]
    fn test_adopt_and_attach() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 3);
        let store = store_with_best(&refs[2]);

        assert_eq!(store.best().height, 2);
        assert_eq!(store.best_index(), Some(&refs[2]));
        let (blsig, index) = store.best_known().unwrap();
        assert_eq!(blsig.block_hash, index.hash);
    }

    #[test]
    fn test_has_lock_on_lineage() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 5);
        let store = store_with_best(&refs[4]);

        assert!(store.has_lock(&chain, true, 4, &refs[4].hash));
        assert!(store.has_lock(&chain, true, 2, &refs[2].hash));
        assert!(!store.has_lock(&chain, true, 2, &Hash::from_bytes(b"other")));
        // Above the locked height nothing is locked.
        assert!(!store.has_lock(&chain, true, 5, &Hash::from_bytes(b"next")));
    }

    #[test]
    fn test_queries_require_enforcement() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 3);
        let store = store_with_best(&refs[2]);

        assert!(!store.has_lock(&chain, false, 2, &refs[2].hash));
        assert!(!store.has_conflicting_lock(&chain, false, 2, &Hash::from_bytes(b"z")));
    }

    #[test]
    fn test_conflicting_complements_lock_below_best_height() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 5);
        let fork = chain.add_block(Some(&refs[1]), b"fork-2");
        let store = store_with_best(&refs[4]);

        assert!(store.has_conflicting_lock(&chain, true, fork.height, &fork.hash));
        assert!(!store.has_conflicting_lock(&chain, true, 2, &refs[2].hash));
        // At the locked height itself.
        assert!(store.has_conflicting_lock(&chain, true, 4, &Hash::from_bytes(b"rival")));
        // Above it, nothing conflicts.
        assert!(!store.has_conflicting_lock(&chain, true, 9, &Hash::from_bytes(b"rival")));
    }

    #[test]
    fn test_no_index_means_no_answers() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 2);
        let mut store = LockStore::new();
        let blsig = lock_for(&refs[1]);
        store.adopt(blsig.wire_hash(), blsig);

        assert!(!store.has_lock(&chain, true, 1, &refs[1].hash));
        assert!(!store.has_conflicting_lock(&chain, true, 1, &Hash::from_bytes(b"z")));
    }

    #[test]
    fn test_reset_clears_everything() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 3);
        let mut store = store_with_best(&refs[2]);
        assert!(store.mark_notified(&refs[2]));

        store.reset();
        assert!(store.best().is_null());
        assert!(store.best_hash().is_zero());
        assert!(store.best_known().is_none());
        // After reset the same index notifies again.
        assert!(store.mark_notified(&refs[2]));
    }

    #[test]
    fn test_mark_notified_once_per_index() {
        let chain = MockChain::new();
        let refs = chain.add_chain("main", 3);
        let mut store = store_with_best(&refs[2]);

        assert!(store.mark_notified(&refs[2]));
        assert!(!store.mark_notified(&refs[2]));
        assert!(store.mark_notified(&refs[1]));
    }
}
