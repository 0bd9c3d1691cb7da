//! A deterministic single-key signing quorum for tests.

use blocklocks_core::{RecoveredSigListener, SigningService};
use blocklocks_types::{
    block_lock_request_id, bls_keypair_from_seed, verify_bls12381_v1, BlockLockSig,
    Bls12381G1PrivateKey, Bls12381G1PublicKey, Bls12381G2Signature, Hash, QuorumKind, RecoveredSig,
};
use std::sync::{Arc, Mutex};

/// A test quorum backed by one deterministic BLS key.
///
/// Real deployments recover a threshold signature from many shares; for the
/// handler that distinction is invisible, so one key standing in for the whole
/// quorum exercises the same verification paths with real signatures.
///
/// `sign_if_member` only records the request — tests decide when (and
/// whether) the recovered signature is produced and delivered, which is
/// exactly the asynchronous contract the handler is written against.
pub struct TestQuorum {
    kind: QuorumKind,
    key: Bls12381G1PrivateKey,
    public_key: Bls12381G1PublicKey,
    listeners: Mutex<Vec<Arc<dyn RecoveredSigListener>>>,
    requests: Mutex<Vec<(QuorumKind, Hash, Hash)>>,
}

impl TestQuorum {
    /// Create a quorum with a key derived from `seed`.
    pub fn new(kind: QuorumKind, seed: u64) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
        seed_bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        let key = bls_keypair_from_seed(&seed_bytes);
        let public_key = key.public_key();
        Self {
            kind,
            key,
            public_key,
            listeners: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The quorum kind this instance answers for.
    pub fn kind(&self) -> QuorumKind {
        self.kind
    }

    /// The quorum public key.
    pub fn public_key(&self) -> &Bls12381G1PublicKey {
        &self.public_key
    }

    fn signing_message(request_id: &Hash, msg_hash: &Hash) -> Vec<u8> {
        let mut msg = Vec::with_capacity(64);
        msg.extend_from_slice(request_id.as_bytes());
        msg.extend_from_slice(msg_hash.as_bytes());
        msg
    }

    /// Produce the recovered signature for an arbitrary request.
    pub fn recover(&self, request_id: Hash, msg_hash: Hash) -> RecoveredSig {
        let sig = self.key.sign_v1(&Self::signing_message(&request_id, &msg_hash));
        RecoveredSig {
            request_id,
            msg_hash,
            sig,
        }
    }

    /// A fully signed block lock for `block_hash` at `height`.
    pub fn signed_lock(&self, height: i32, block_hash: Hash) -> BlockLockSig {
        let rec = self.recover(block_lock_request_id(height), block_hash);
        BlockLockSig {
            height,
            block_hash,
            sig: rec.sig,
        }
    }

    /// Requests recorded by `sign_if_member`, oldest first.
    pub fn requests(&self) -> Vec<(QuorumKind, Hash, Hash)> {
        self.requests.lock().unwrap().clone()
    }

    /// Deliver a recovered signature to every registered listener.
    pub fn deliver(&self, rec: &RecoveredSig) {
        let listeners: Vec<_> = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_recovered_sig(rec);
        }
    }

    /// Recover and deliver the signature for the most recent request.
    pub fn complete_last_request(&self) -> Option<RecoveredSig> {
        let (_, request_id, msg_hash) = self.requests.lock().unwrap().last()?.clone();
        let rec = self.recover(request_id, msg_hash);
        self.deliver(&rec);
        Some(rec)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl SigningService for TestQuorum {
    fn verify_recovered_sig(
        &self,
        quorum: QuorumKind,
        _height: i32,
        request_id: &Hash,
        msg_hash: &Hash,
        sig: &Bls12381G2Signature,
    ) -> bool {
        if quorum != self.kind {
            return false;
        }
        verify_bls12381_v1(
            &Self::signing_message(request_id, msg_hash),
            &self.public_key,
            sig,
        )
    }

    fn sign_if_member(&self, quorum: QuorumKind, request_id: &Hash, msg_hash: &Hash) {
        self.requests
            .lock()
            .unwrap()
            .push((quorum, *request_id, *msg_hash));
    }

    fn register_listener(&self, listener: Arc<dyn RecoveredSigListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn unregister_listener(&self, listener: &Arc<dyn RecoveredSigListener>) {
        // Compare data pointers only; vtable addresses are not stable.
        let target = Arc::as_ptr(listener) as *const ();
        self.listeners
            .lock()
            .unwrap()
            .retain(|l| Arc::as_ptr(l) as *const () != target);
    }
}
