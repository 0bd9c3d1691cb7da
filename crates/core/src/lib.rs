//! Core abstractions for the block lock subsystem.
//!
//! This crate defines the capability traits the handler needs from its host
//! ([`ChainHost`], [`SigningService`], [`InstantLockView`], [`FeatureGate`],
//! [`SyncStatus`], [`NetworkBridge`], [`LockNotifier`], [`Clock`]) and the
//! [`Task`] vocabulary the handler uses to defer work onto its scheduler.

mod traits;

pub use traits::{
    ChainError, ChainHost, Clock, FeatureGate, InstantLockView, LockNotifier, NetworkBridge,
    RecoveredSigListener, SigningService, SyncStatus, FEATURE_BLOCK_LOCKS,
    FEATURE_CONFLICTING_BLOCK_REJECTION,
};

/// Work the handler defers onto its single-threaded scheduler.
///
/// Tasks are enqueued with zero delay and run on the scheduler worker, which
/// also drives the periodic tick. Funneling all self-driven work through one
/// consumer keeps enforcement and signing from ever running reentrantly or
/// on a caller's thread that may hold the chain lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Refresh active state and enforce the best lock.
    ///
    /// Enqueued after accepting a lock whose block is locally known.
    CheckEnforce,

    /// Refresh active state, enforce, then try to sign the chain tip.
    ///
    /// Enqueued on tip updates; bursts collapse into a single task via the
    /// handler's scheduled flag.
    TipCheck,
}
