//! Handler configuration and tunable constants.

use blocklocks_types::QuorumKind;
use std::time::Duration;

/// Interval of the periodic scheduler tick driving state checks,
/// enforcement, and signing retries.
pub const SCHED_TICK: Duration = Duration::from_secs(5);

/// Minimum spacing between cleanup passes.
pub const CLEANUP_INTERVAL_MS: i64 = 30 * 1000;

/// Retention of observed lock wire-hashes.
pub const CLEANUP_SEEN_TIMEOUT_MS: i64 = 24 * 60 * 60 * 1000;

/// How long to wait for a transaction-level lock before a transaction is
/// considered safe to cover with a block lock anyway.
pub const WAIT_FOR_ISLOCK_TIMEOUT_SECS: i64 = 10 * 60;

/// How many blocks below the tip the signing safety walk still inspects.
/// Six confirmations deep, transactions no longer receive instant locks.
pub const SAFE_SIGN_DEPTH: i32 = 5;

/// Misbehavior score for peers sending undecodable or unverifiable locks.
pub const MISBEHAVING_SCORE: i32 = 10;

/// Confirmations after which a tracked transaction's first-seen time is
/// no longer needed.
pub const TX_CLEANUP_CONFIRMATIONS: i32 = 6;

/// Static configuration of the block lock handler.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Whether this node operates as a masternode (only masternodes attempt
    /// to sign chain tips).
    pub masternode: bool,

    /// Height at which block lock enforcement activates. Enforcement requires
    /// the tip's predecessor to have reached this height.
    pub activation_height: i32,

    /// The signing quorum kind configured for block locks.
    pub quorum: QuorumKind,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            masternode: false,
            activation_height: 0,
            quorum: QuorumKind(2),
        }
    }
}
