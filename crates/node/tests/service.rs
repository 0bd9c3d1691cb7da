//! Service-level tests: the real scheduler thread driving the handler.

use blocklocks_core::{FEATURE_BLOCK_LOCKS, FEATURE_CONFLICTING_BLOCK_REJECTION};
use blocklocks_handler::{HandlerConfig, HandlerHosts, MISBEHAVING_SCORE};
use blocklocks_node::{dispatch, BlockLockService};
use blocklocks_test_helpers::{
    ManualClock, MockChain, MockNetwork, MockNotifier, TestFeatures, TestInstantLocks, TestQuorum,
    TestSync,
};
use blocklocks_types::{BlockRef, Inv, PeerId, QuorumKind};
use std::sync::Arc;
use std::time::{Duration, Instant};

const QUORUM: QuorumKind = QuorumKind(2);
const TICK: Duration = Duration::from_millis(10);

struct Fixture {
    service: BlockLockService,
    chain: Arc<MockChain>,
    quorum: Arc<TestQuorum>,
    network: Arc<MockNetwork>,
    notifier: Arc<MockNotifier>,
    tip: BlockRef,
}

fn fixture(masternode: bool, chain_len: usize) -> Fixture {
    let chain = Arc::new(MockChain::new());
    let refs = chain.add_chain("main", chain_len);
    let tip = refs.last().expect("chain must not be empty").clone();

    let quorum = Arc::new(TestQuorum::new(QUORUM, 11));
    let network = Arc::new(MockNetwork::new());
    let notifier = Arc::new(MockNotifier::new());

    let service = BlockLockService::new(
        HandlerHosts {
            chain: chain.clone(),
            signer: quorum.clone(),
            instant_locks: Arc::new(TestInstantLocks::new(true)),
            features: Arc::new(TestFeatures::with_active(&[
                FEATURE_BLOCK_LOCKS,
                FEATURE_CONFLICTING_BLOCK_REJECTION,
            ])),
            sync: Arc::new(TestSync::new(true)),
            network: network.clone(),
            notifier: notifier.clone(),
            clock: Arc::new(ManualClock::new()),
        },
        HandlerConfig {
            masternode,
            activation_height: 0,
            quorum: QUORUM,
        },
    );

    Fixture {
        service,
        chain,
        quorum,
        network,
        notifier,
        tip,
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn masternode_signs_and_locks_the_tip_end_to_end() {
    let mut f = fixture(true, 11);
    f.service.start_with_tick(TICK);

    // The periodic tick attempts to sign the tip.
    let quorum = f.quorum.clone();
    wait_until("signing request", || !quorum.requests().is_empty());

    // The quorum recovers the signature; the handler adopts its own lock.
    f.quorum.complete_last_request();
    assert_eq!(f.service.handler().best_lock().height, f.tip.height);
    assert_eq!(f.service.handler().best_lock().block_hash, f.tip.hash);

    // The next tick enforces and notifies exactly once.
    let notifier = f.notifier.clone();
    wait_until("lock notification", || !notifier.ui().is_empty());
    std::thread::sleep(5 * TICK);
    assert_eq!(f.notifier.ui(), vec![(f.tip.hash.to_string(), f.tip.height)]);
    assert_eq!(f.chain.activations(), 0);

    f.service.stop();
}

#[test]
fn listener_registration_follows_the_lifecycle() {
    let mut f = fixture(false, 5);
    assert_eq!(f.quorum.listener_count(), 0);

    f.service.start_with_tick(TICK);
    assert_eq!(f.quorum.listener_count(), 1);

    f.service.stop();
    assert_eq!(f.quorum.listener_count(), 0);

    // A service runs once; restarting is a no-op.
    f.service.start_with_tick(TICK);
    assert_eq!(f.quorum.listener_count(), 0);
}

#[test]
fn inbound_message_is_accepted_relayed_and_served() {
    let mut f = fixture(false, 11);
    f.service.start_with_tick(TICK);
    let handler = f.service.handler().clone();

    let blsig = f.quorum.signed_lock(f.tip.height, f.tip.hash);
    let inv = Inv::block_lock(blsig.wire_hash());
    assert!(dispatch::wants_inventory(&handler, &inv));

    dispatch::dispatch_message(&handler, PeerId(3), dispatch::MSG_BLSIG, &blsig.to_wire());

    assert_eq!(handler.best_lock(), blsig);
    assert_eq!(f.network.relayed(), vec![inv]);
    assert!(!dispatch::wants_inventory(&handler, &inv));
    assert_eq!(dispatch::serve_inventory(&handler, &inv), Some(blsig.to_wire()));

    let notifier = f.notifier.clone();
    wait_until("lock notification", || !notifier.ui().is_empty());

    f.service.stop();
}

#[test]
fn undecodable_payload_is_penalized() {
    let mut f = fixture(false, 5);
    f.service.start_with_tick(TICK);
    let handler = f.service.handler().clone();

    dispatch::dispatch_message(&handler, PeerId(9), dispatch::MSG_BLSIG, b"not a lock");
    assert_eq!(f.network.penalties(), vec![(PeerId(9), MISBEHAVING_SCORE)]);

    // Commands for other subsystems are ignored entirely.
    dispatch::dispatch_message(&handler, PeerId(9), "tx", b"whatever");
    assert_eq!(f.network.penalties().len(), 1);

    f.service.stop();
}
