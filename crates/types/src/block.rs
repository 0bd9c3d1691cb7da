//! Host-side value types: chain index entries, blocks, transactions, peers.
//!
//! The chain index and block storage live in the host node; the block lock
//! subsystem only sees these lightweight views of them.

use crate::crypto::Bls12381G2Signature;
use crate::hash::Hash;
use std::fmt;

/// Identity of a peer connection, assigned by the host's network layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which signing quorum a request is addressed to.
///
/// Quorum composition and selection are the signing service's business; the
/// handler only carries the configured kind through to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuorumKind(pub u8);

/// A chain index entry: the host's handle for a known block header.
///
/// Ancestor and tip queries resolve these through the host's `ChainHost`
/// capability set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRef {
    /// Block hash.
    pub hash: Hash,
    /// Height in the chain the block belongs to.
    pub height: i32,
}

impl BlockRef {
    /// Create a new index entry.
    pub fn new(hash: Hash, height: i32) -> Self {
        Self { hash, height }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.height)
    }
}

/// A transaction as seen by the block lock subsystem.
///
/// Only the identity and the lockability classification matter here; script
/// and amount data stay in the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction id.
    pub txid: Hash,
    /// Whether this is the block reward transaction.
    pub coinbase: bool,
    /// Number of inputs.
    pub inputs: u32,
}

impl Transaction {
    /// Whether the transaction-level lock service could lock this transaction.
    ///
    /// Coinbase and input-less transactions are never instant-locked and are
    /// excluded from the signing safety checks.
    pub fn is_lockable(&self) -> bool {
        !self.coinbase && self.inputs > 0
    }
}

/// A block read back from the host's block storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block hash.
    pub hash: Hash,
    /// Block timestamp (consensus time, seconds).
    pub time: i64,
    /// Transactions in the block, coinbase first.
    pub txs: Vec<Transaction>,
}

/// Inventory object kinds announced by this subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvKind {
    /// A block lock signature, identified by its wire-hash.
    BlockLockSig,
}

/// An inventory announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Inv {
    /// Object kind.
    pub kind: InvKind,
    /// Object identity (wire-hash).
    pub hash: Hash,
}

impl Inv {
    /// Inventory entry for a block lock signature.
    pub fn block_lock(hash: Hash) -> Self {
        Self {
            kind: InvKind::BlockLockSig,
            hash,
        }
    }
}

/// A recovered threshold signature delivered by the signing service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredSig {
    /// The request id the quorum signed under.
    pub request_id: Hash,
    /// The message hash that was signed.
    pub msg_hash: Hash,
    /// The recovered signature.
    pub sig: Bls12381G2Signature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockable_classification() {
        let normal = Transaction {
            txid: Hash::from_bytes(b"tx"),
            coinbase: false,
            inputs: 2,
        };
        let coinbase = Transaction {
            txid: Hash::from_bytes(b"cb"),
            coinbase: true,
            inputs: 1,
        };
        let inputless = Transaction {
            txid: Hash::from_bytes(b"none"),
            coinbase: false,
            inputs: 0,
        };

        assert!(normal.is_lockable());
        assert!(!coinbase.is_lockable());
        assert!(!inputless.is_lockable());
    }

    #[test]
    fn test_block_ref_display() {
        let r = BlockRef::new(Hash::from_bytes(b"b"), 7);
        assert!(r.to_string().ends_with("@7"));
    }
}
