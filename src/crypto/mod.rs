//! Cryptography module - double SHA-256 and BLAKE3 hashing, secp256k1 keys, Merkle trees

mod hash;
mod keys;
mod merkle;

pub use hash::*;
pub use keys::*;
pub use merkle::*;
