//! BLAKE2s-based key derivation.
//!
//! Single-output HMAC-based KDF (WireGuard's `KDF1` construction), reused here to
//! turn a raw X25519 Diffie-Hellman output into a uniformly-distributed 32-byte
//! shared secret.

use blake2::{digest::FixedOutput, Blake2s256};
use hmac::SimpleHmac;

type HmacBlake2s = SimpleHmac<Blake2s256>;

/// Length of a BLAKE2s-256 output.
pub const HASH_LEN: usize = 32;

fn hmac(key: &[u8], data: &[u8]) -> [u8; HASH_LEN] {
    use hmac::Mac;
    let mut mac = HmacBlake2s::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize_fixed().into()
}

/// KDF1: single-output key derivation. Returns one 32-byte key.
pub fn kdf1(key: &[u8; HASH_LEN], input: &[u8]) -> [u8; HASH_LEN] {
    let temp = hmac(key, input);
    hmac(&temp, &[0x01])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf1_is_deterministic() {
        let key = [7u8; 32];
        let input = b"some dh output";
        assert_eq!(kdf1(&key, input), kdf1(&key, input));
    }

    #[test]
    fn kdf1_distinguishes_inputs() {
        let key = [7u8; 32];
        assert_ne!(kdf1(&key, b"a"), kdf1(&key, b"b"));
    }
}
