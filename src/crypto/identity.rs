//! C1: identity keypairs, per-peer shared-secret derivation, and the
//! authenticated sealed-box construction (`seal`/`open`).
//!
//! The box is a NaCl-equivalent construction: XChaCha20-Poly1305 with a fresh
//! random 24-byte nonce per call and a 16-byte authentication tag, keyed on a
//! 32-byte secret derived once per peer via X25519 + a BLAKE2s KDF.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use super::blake2s;
use super::x25519;
use crate::error::CryptoError;

/// Length of a public or secret key.
pub const KEY_LEN: usize = 32;
/// Length of the seal/open nonce.
pub const NONCE_LEN: usize = 24;
/// Length of the authentication tag.
pub const MAC_LEN: usize = 16;

/// Long-term process identity: `(public_key, secret_key)`. Not persisted across runs.
#[derive(Clone)]
pub struct Identity {
    pub public_key: [u8; KEY_LEN],
    pub secret_key: [u8; KEY_LEN],
}

/// A per-peer precomputed shared secret. Immutable once derived; zeroised on drop
/// is the responsibility of whoever owns the `PeerRecord` holding it (see `peers.rs`).
pub type SharedSecret = [u8; KEY_LEN];

/// Generate a fresh process identity.
pub fn generate_identity() -> Identity {
    let (secret_key, public_key) = x25519::generate_keypair();
    Identity {
        public_key,
        secret_key,
    }
}

/// Derive the shared secret for one peer. Computed once per peer at connection
/// start; on failure the caller drops the peer from the table and proceeds with
/// the rest (`KeyDerivationFailed` is per-peer, not fatal to the connection).
pub fn derive_shared(
    peer_public_key: &[u8; KEY_LEN],
    self_secret_key: &[u8; KEY_LEN],
) -> Result<SharedSecret, CryptoError> {
    let dh_output = x25519::dh(self_secret_key, peer_public_key);
    // x25519-dalek already rejects low-order points during `diffie_hellman`, but a
    // contributory-behavior all-zero output is still possible from a malicious
    // peer key; reject it rather than deriving a secret from a degenerate point.
    if dh_output.iter().all(|&b| b == 0) {
        return Err(CryptoError::KeyDerivationFailed);
    }
    Ok(blake2s::kdf1(&dh_output, b"minnowvpn shared secret"))
}

/// Seal `plaintext` under `secret`, returning `nonce[24] || mac[16] || ciphertext`.
pub fn seal(secret: &SharedSecret, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let mac_and_ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + mac_and_ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&mac_and_ciphertext);
    Ok(out)
}

/// Open a `nonce[24] || mac[16] || ciphertext` box sealed under `secret`.
/// MAC failure is the only failure mode; callers must treat it as a silent drop,
/// never as a panic or unwind into user-visible failure (spec §7 `AuthFailure`).
pub fn open(secret: &SharedSecret, nonce_mac_ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce_mac_ciphertext.len() < NONCE_LEN + MAC_LEN {
        return Err(CryptoError::AuthFailure);
    }
    let (nonce_bytes, mac_and_ciphertext) = nonce_mac_ciphertext.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret));
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, mac_and_ciphertext)
        .map_err(|_| CryptoError::AuthFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_shared_agrees_both_directions() {
        let alice = generate_identity();
        let bob = generate_identity();

        let alice_secret = derive_shared(&bob.public_key, &alice.secret_key).unwrap();
        let bob_secret = derive_shared(&alice.public_key, &bob.secret_key).unwrap();

        assert_eq!(alice_secret, bob_secret);
    }

    #[test]
    fn seal_open_round_trip() {
        let alice = generate_identity();
        let bob = generate_identity();
        let secret = derive_shared(&bob.public_key, &alice.secret_key).unwrap();

        let plaintext = b"an IPv4 datagram masquerading as plaintext";
        let boxed = seal(&secret, plaintext).unwrap();
        assert_eq!(boxed.len(), NONCE_LEN + MAC_LEN + plaintext.len());

        let opened = open(&secret, &boxed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn seal_nonce_is_fresh_each_call() {
        let secret = [3u8; KEY_LEN];
        let a = seal(&secret, b"same plaintext").unwrap();
        let b = seal(&secret, b"same plaintext").unwrap();
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let secret = [9u8; KEY_LEN];
        let mut boxed = seal(&secret, b"hello").unwrap();
        let last = boxed.len() - 1;
        boxed[last] ^= 0xFF;
        assert!(open(&secret, &boxed).is_err());
    }

    #[test]
    fn open_rejects_wrong_secret() {
        let secret = [1u8; KEY_LEN];
        let wrong = [2u8; KEY_LEN];
        let boxed = seal(&secret, b"hello").unwrap();
        assert!(open(&wrong, &boxed).is_err());
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let secret = [5u8; KEY_LEN];
        let boxed = seal(&secret, &[]).unwrap();
        assert_eq!(boxed.len(), NONCE_LEN + MAC_LEN);
        assert_eq!(open(&secret, &boxed).unwrap(), Vec::<u8>::new());
    }
}
