//! The block lock handler.
//!
//! Produces and enforces threshold-signed block locks: once a quorum signs a
//! block at some height, every competing chain diverging at or below that
//! height is marked conflicting and the locked chain is activated.
//!
//! The handler mediates between the network (lock messages), the chain index
//! (header/block/tip notifications), the threshold signing service
//! (recovered signatures), and a single-threaded scheduler (periodic
//! enforcement and signing retries). See [`BlockLockHandler`].

mod block_txs;
mod config;
mod handler;
mod seen;
mod store;

pub use block_txs::BlockTxIndex;
pub use config::{
    HandlerConfig, CLEANUP_INTERVAL_MS, CLEANUP_SEEN_TIMEOUT_MS, MISBEHAVING_SCORE,
    SAFE_SIGN_DEPTH, SCHED_TICK, TX_CLEANUP_CONFIRMATIONS, WAIT_FOR_ISLOCK_TIMEOUT_SECS,
};
pub use handler::{BlockLockHandler, HandlerHosts};
pub use seen::SeenLocks;
pub use store::LockStore;
