//! The signed block lock record and its canonical wire codec.
//!
//! A [`BlockLockSig`] asserts quorum agreement that the block at a given
//! height is final. Its wire identity (the hash announced in inventory
//! messages) is the double-SHA256 of the canonical serialization:
//! little-endian `i32` height, 32-byte block hash, 96-byte BLS signature.

use crate::crypto::{zero_bls_signature, Bls12381G2Signature};
use crate::hash::Hash;
use std::fmt;

/// Size of a serialized BLS signature on the wire.
pub const BLS_SIGNATURE_BYTES: usize = 96;

/// Size of a serialized [`BlockLockSig`] on the wire.
pub const BLOCK_LOCK_SIG_BYTES: usize = 4 + Hash::BYTES + BLS_SIGNATURE_BYTES;

/// A signed block lock: quorum agreement that `block_hash` at `height` is final.
///
/// The null record (height -1, zero hash) is the initial "no lock" state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLockSig {
    /// Locked height; -1 means null.
    pub height: i32,
    /// Hash of the locked block.
    pub block_hash: Hash,
    /// Recovered threshold signature over `block_hash`.
    pub sig: Bls12381G2Signature,
}

impl Default for BlockLockSig {
    fn default() -> Self {
        Self::null()
    }
}

impl BlockLockSig {
    /// The null lock: no block locked yet.
    pub fn null() -> Self {
        Self {
            height: -1,
            block_hash: Hash::ZERO,
            sig: zero_bls_signature(),
        }
    }

    /// Whether this is the null lock.
    pub fn is_null(&self) -> bool {
        self.height == -1 && self.block_hash.is_zero()
    }

    /// Canonical wire serialization.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_LOCK_SIG_BYTES);
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(self.block_hash.as_bytes());
        out.extend_from_slice(&self.sig.0);
        out
    }

    /// Decode from the canonical wire serialization.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < BLOCK_LOCK_SIG_BYTES {
            return Err(WireError::Truncated {
                expected: BLOCK_LOCK_SIG_BYTES,
                actual: bytes.len(),
            });
        }
        if bytes.len() > BLOCK_LOCK_SIG_BYTES {
            return Err(WireError::TrailingBytes {
                extra: bytes.len() - BLOCK_LOCK_SIG_BYTES,
            });
        }

        let height = i32::from_le_bytes(bytes[0..4].try_into().expect("4 bytes"));
        let block_hash = Hash::from_hash_bytes(&bytes[4..4 + Hash::BYTES]);
        let mut sig_bytes = [0u8; BLS_SIGNATURE_BYTES];
        sig_bytes.copy_from_slice(&bytes[4 + Hash::BYTES..]);

        Ok(Self {
            height,
            block_hash,
            sig: Bls12381G2Signature(sig_bytes),
        })
    }

    /// The wire identity: double-SHA256 of the canonical serialization.
    pub fn wire_hash(&self) -> Hash {
        Hash::from_bytes(&self.to_wire())
    }
}

impl fmt::Display for BlockLockSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlockLockSig(height={}, block_hash={})",
            self.height, self.block_hash
        )
    }
}

/// Errors that can occur when decoding a wire message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The message is shorter than the fixed wire size.
    #[error("Truncated message: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// The message carries bytes beyond the fixed wire size.
    #[error("Trailing bytes after message: {extra}")]
    TrailingBytes {
        /// Number of excess bytes.
        extra: usize,
    },
}
