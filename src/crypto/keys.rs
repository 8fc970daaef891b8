//! secp256k1 keys and ECDSA signatures
//!
//! Signet challenges commit to compressed public keys; block solutions carry
//! DER encoded ECDSA signatures.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::Hash;

/// Length of a SEC1 compressed public key
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Key errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected 33 bytes, got {0}")]
    InvalidLength(usize),
    #[error("not a valid secp256k1 point")]
    InvalidPoint,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("signing failed")]
    SigningFailed,
}

/// A fully validated 33-byte compressed public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPubKey([u8; COMPRESSED_PUBKEY_SIZE]);

impl CompressedPubKey {
    /// Parse a compressed key, checking both the length and that the bytes
    /// encode a point on the curve
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != COMPRESSED_PUBKEY_SIZE {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        // from_sec1_bytes would also accept an uncompressed encoding, the
        // length check above rules that out
        VerifyingKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidPoint)?;
        let mut arr = [0u8; COMPRESSED_PUBKEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(CompressedPubKey(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidHex(s.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; COMPRESSED_PUBKEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a DER signature over a 32-byte message hash
    pub fn verify(&self, message: &Hash, der_signature: &[u8]) -> bool {
        let verifying_key = match VerifyingKey::from_sec1_bytes(&self.0) {
            Ok(vk) => vk,
            Err(_) => return false,
        };
        let sig = match Signature::from_der(der_signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        verifying_key.verify_prehash(&message.0, &sig).is_ok()
    }
}

impl FromStr for CompressedPubKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for CompressedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedPubKey({})", self.to_hex())
    }
}

impl fmt::Display for CompressedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CompressedPubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CompressedPubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CompressedPubKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Create from 32 bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidHex(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_bytes(&arr)
    }

    /// Get the corresponding compressed public key
    pub fn public_key(&self) -> CompressedPubKey {
        let point = self.0.verifying_key().to_encoded_point(true);
        let mut arr = [0u8; COMPRESSED_PUBKEY_SIZE];
        arr.copy_from_slice(point.as_bytes());
        CompressedPubKey(arr)
    }

    /// Sign a 32-byte message hash, returning a DER encoded (low-S) signature
    pub fn sign(&self, message: &Hash) -> Result<Vec<u8>, KeyError> {
        let signature: Signature = self
            .0
            .sign_prehash(&message.0)
            .map_err(|_| KeyError::SigningFailed)?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Export to bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }
}
