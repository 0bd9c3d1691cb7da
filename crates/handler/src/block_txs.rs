//! Per-block transaction tracking for the signing safety checks.
//!
//! The handler refuses to sign a tip whose recent blocks carry transactions
//! that are neither instant-locked nor old enough. That requires knowing,
//! per recent block, which lockable transactions it contains, and per
//! transaction, when it was first witnessed (mempool acceptance or block
//! connection, whichever came first).

use blocklocks_types::{Block, Hash};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Transaction-id sets of recently connected blocks plus first-seen times.
///
/// Sets are shared (`Arc`) so the safety walk can iterate a snapshot without
/// holding the handler's state mutex.
#[derive(Debug, Default)]
pub struct BlockTxIndex {
    block_txs: HashMap<Hash, Arc<HashSet<Hash>>>,
    tx_first_seen: HashMap<Hash, i64>,
}

impl BlockTxIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly connected block.
    ///
    /// An entry is created even when the block holds no lockable
    /// transactions, so the safety walk can tell "known block, nothing to
    /// check" apart from "block never seen".
    pub fn on_block_connected(&mut self, block_hash: Hash, block: &Block, now_secs: i64) {
        let entry = self.block_txs.entry(block_hash).or_default();
        let txids = Arc::make_mut(entry);
        for tx in block.txs.iter().filter(|tx| tx.is_lockable()) {
            txids.insert(tx.txid);
            self.tx_first_seen.entry(tx.txid).or_insert(now_secs);
        }
    }

    /// Drop the record of a disconnected block.
    pub fn remove_block(&mut self, block_hash: &Hash) {
        self.block_txs.remove(block_hash);
    }

    /// Drop a block record together with its transactions' first-seen times.
    pub fn remove_block_and_txs(&mut self, block_hash: &Hash) {
        if let Some(txids) = self.block_txs.remove(block_hash) {
            for txid in txids.iter() {
                self.tx_first_seen.remove(txid);
            }
        }
    }

    /// Record a mempool acceptance. An earlier witnessed time wins.
    pub fn note_mempool_tx(&mut self, txid: Hash, accept_time_secs: i64) {
        self.tx_first_seen.entry(txid).or_insert(accept_time_secs);
    }

    /// The transaction set of a block, if recorded.
    pub fn get(&self, block_hash: &Hash) -> Option<Arc<HashSet<Hash>>> {
        self.block_txs.get(block_hash).cloned()
    }

    /// Install a transaction set recovered from disk.
    ///
    /// A set recorded concurrently wins; first-seen times are seeded from the
    /// block timestamp, the best witness available for an unseen block.
    pub fn backfill(&mut self, block_hash: Hash, txids: Arc<HashSet<Hash>>, block_time_secs: i64) {
        for txid in txids.iter() {
            self.tx_first_seen.entry(*txid).or_insert(block_time_secs);
        }
        self.block_txs.entry(block_hash).or_insert(txids);
    }

    /// When the transaction was first witnessed.
    pub fn first_seen(&self, txid: &Hash) -> Option<i64> {
        self.tx_first_seen.get(txid).copied()
    }

    /// Forget a transaction's first-seen time.
    pub fn drop_tx(&mut self, txid: &Hash) {
        self.tx_first_seen.remove(txid);
    }

    /// Hashes of all recorded blocks.
    pub fn block_hashes(&self) -> Vec<Hash> {
        self.block_txs.keys().copied().collect()
    }

    /// All transaction ids with a first-seen time.
    pub fn tracked_txids(&self) -> Vec<Hash> {
        self.tx_first_seen.keys().copied().collect()
    }

    pub fn block_count(&self) -> usize {
        self.block_txs.len()
    }

    pub fn tx_count(&self) -> usize {
        self.tx_first_seen.len()
    }
}
