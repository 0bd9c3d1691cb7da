//! Test helpers for the block lock subsystem.
//!
//! Provides a deterministic signing quorum producing real BLS signatures
//! ([`TestQuorum`]) and in-memory host implementations ([`MockChain`],
//! [`MockNetwork`], [`MockNotifier`], [`TestFeatures`], [`TestInstantLocks`],
//! [`TestSync`], [`ManualClock`]) so handler tests exercise the actual
//! verification and enforcement paths instead of bypassing them.

mod hosts;
mod quorum;

pub use hosts::{
    coinbase_tx, lockable_tx, ManualClock, MockChain, MockNetwork, MockNotifier, TestFeatures,
    TestInstantLocks, TestSync,
};
pub use quorum::TestQuorum;
