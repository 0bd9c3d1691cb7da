//! Value types for the block lock subsystem.
//!
//! - [`Hash`]: double-SHA256 wire identities
//! - BLS crypto re-exports from `radix_common`
//! - [`BlockLockSig`]: the signed finality record and its canonical codec
//! - [`block_lock_request_id`]: deterministic signing request ids
//! - Host-side views: [`BlockRef`], [`Block`], [`Transaction`], [`PeerId`],
//!   [`Inv`], [`RecoveredSig`]

mod block;
mod crypto;
mod hash;
mod lock;
mod signing;

pub use block::{Block, BlockRef, Inv, InvKind, PeerId, QuorumKind, RecoveredSig, Transaction};
pub use crypto::{
    bls_keypair_from_seed, generate_bls_keypair, verify_bls12381_v1, zero_bls_signature,
    Bls12381G1PrivateKey, Bls12381G1PublicKey, Bls12381G2Signature,
};
pub use hash::{Hash, HexError};
pub use lock::{BlockLockSig, WireError, BLOCK_LOCK_SIG_BYTES, BLS_SIGNATURE_BYTES};
pub use signing::{block_lock_request_id, BLSIG_REQUEST_PREFIX};
