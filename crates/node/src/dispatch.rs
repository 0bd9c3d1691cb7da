//! Inbound message dispatch and inventory serving.
//!
//! The host's network layer routes raw commands here; this subsystem owns a
//! single message type (`blsig`) and one inventory kind. Outbound relay
//! happens inside the handler on acceptance.

use blocklocks_handler::BlockLockHandler;
use blocklocks_types::{Inv, InvKind, PeerId};
use tracing::trace;

/// Wire command for a block lock signature message.
pub const MSG_BLSIG: &str = "blsig";

/// Route an inbound network message to the handler.
pub fn dispatch_message(handler: &BlockLockHandler, from: PeerId, command: &str, payload: &[u8]) {
    match command {
        MSG_BLSIG => handler.process_message(from, payload),
        _ => trace!(peer = %from, command, "ignoring message for another subsystem"),
    }
}

/// Whether an announced inventory object is still wanted.
pub fn wants_inventory(handler: &BlockLockHandler, inv: &Inv) -> bool {
    match inv.kind {
        InvKind::BlockLockSig => !handler.already_have(&inv.hash),
    }
}

/// Serve a `getdata` request for an inventory object, if we can.
///
/// Only the current best lock is ever served; superseded locks are gone.
pub fn serve_inventory(handler: &BlockLockHandler, inv: &Inv) -> Option<Vec<u8>> {
    match inv.kind {
        InvKind::BlockLockSig => handler.get_lock_by_hash(&inv.hash).map(|l| l.to_wire()),
    }
}
