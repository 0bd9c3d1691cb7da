//! Cryptographic types and helpers.
//!
//! Re-exports the BLS12-381 types from `radix_common::crypto` and provides
//! helper functions for key generation and testing. Block lock signatures are
//! threshold signatures produced by a signing quorum; this subsystem only ever
//! treats them as opaque 96-byte values and delegates verification to the
//! signing service.

// Re-export vendor crypto types
pub use radix_common::crypto::{Bls12381G1PrivateKey, Bls12381G1PublicKey, Bls12381G2Signature};

// Re-export verification function
pub use radix_common::crypto::verify_bls12381_v1;

/// Generate a new random BLS12-381 keypair.
///
/// Uses a random 32-byte seed with blst's key_gen for proper key derivation.
pub fn generate_bls_keypair() -> Bls12381G1PrivateKey {
    let mut ikm = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut ikm);
    bls_keypair_from_seed(&ikm)
}

/// Generate a BLS12-381 keypair from a seed (deterministic, for testing).
///
/// Uses blst's key_gen which hashes the full seed to derive a valid BLS scalar.
pub fn bls_keypair_from_seed(seed: &[u8; 32]) -> Bls12381G1PrivateKey {
    let blst_sk = blst::min_pk::SecretKey::key_gen(seed, &[]).expect("key_gen should not fail");

    // blst secret key is a 32-byte scalar in big-endian format
    let sk_bytes = blst_sk.to_bytes();
    Bls12381G1PrivateKey::from_bytes(&sk_bytes).expect("valid BLS scalar bytes")
}

/// Create a zero/placeholder BLS signature for testing.
pub fn zero_bls_signature() -> Bls12381G2Signature {
    Bls12381G2Signature([0u8; 96])
}
