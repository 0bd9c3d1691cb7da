//! Request id derivation for threshold signing.
//!
//! Every quorum member must pose the signing service the same question for a
//! given height, so the request id is derived deterministically: the hash of
//! the `"blsig"` domain prefix followed by the little-endian height. The
//! prefix keeps block lock requests from colliding with other request-id
//! spaces served by the same signing infrastructure.

use crate::hash::Hash;

/// Domain prefix for block lock signing requests.
pub const BLSIG_REQUEST_PREFIX: &[u8] = b"blsig";

/// Build the signing request id for a block lock at `height`.
///
/// Format: `H("blsig" || height_le)` where `H` is double-SHA256.
pub fn block_lock_request_id(height: i32) -> Hash {
    Hash::from_parts(&[BLSIG_REQUEST_PREFIX, &height.to_le_bytes()])
}
