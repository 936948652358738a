//! Crypto primitives (C1): identity keypairs, shared-secret derivation, and the
//! authenticated sealed-box construction used for every wire payload.

mod blake2s;
mod identity;
mod x25519;

pub use identity::{derive_shared, generate_identity, open, seal, Identity, SharedSecret};
