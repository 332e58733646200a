//! Cryptographic primitives for the billing core.
//!
//! Receipts are signed by the backend with RSA (PKCS#1 v1.5 over SHA-1). The
//! application ships the backend's public key as base64 of its X.509
//! SubjectPublicKeyInfo DER encoding.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::codec::{base64_decode, base64_encode};
use crate::error::{CoreError, Result};

/// Number of random bytes in a developer payload.
pub const DEVELOPER_PAYLOAD_LEN: usize = 16;

/// An RSA public key used to verify backend signatures.
#[derive(Clone)]
pub struct PublicKey {
    key: VerifyingKey<Sha1>,
    der: Vec<u8>,
}

impl PublicKey {
    /// Parse a base64-encoded X.509 SubjectPublicKeyInfo key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let der = base64_decode(encoded.trim())
            .map_err(|e| CoreError::InvalidKey(format!("key is not base64: {}", e)))?;
        Self::from_der(&der)
    }

    /// Parse a DER-encoded X.509 SubjectPublicKeyInfo key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key: VerifyingKey::new(key),
            der: der.to_vec(),
        })
    }

    /// Verify a base64 signature over `signed_data`.
    ///
    /// Returns `false` for a signature that is not valid base64, has the wrong
    /// length, or does not match.
    pub fn verify(&self, signed_data: &[u8], signature: &str) -> bool {
        let Ok(raw) = base64_decode(signature) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };
        self.key.verify(signed_data, &signature).is_ok()
    }

    /// The DER encoding this key was parsed from.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 of the DER encoding.
    pub fn to_base64(&self) -> String {
        base64_encode(&self.der)
    }

    /// Short hex fingerprint (SHA-1 of the DER encoding), for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha1::digest(&self.der)[..8])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaPub({})", self.fingerprint())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PublicKey {}

/// Verifies signed purchase data against the configured public key.
///
/// A verifier built from an empty key rejects every signature.
#[derive(Debug, Clone)]
pub struct PurchaseVerifier {
    key: Option<PublicKey>,
}

impl PurchaseVerifier {
    /// Build a verifier from a base64 key. An empty string is accepted and
    /// produces a verifier that rejects everything; malformed key material is
    /// an error.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        if encoded.trim().is_empty() {
            return Ok(Self { key: None });
        }
        Ok(Self {
            key: Some(PublicKey::from_base64(encoded)?),
        })
    }

    /// Build a verifier from an already parsed key.
    pub fn new(key: PublicKey) -> Self {
        Self { key: Some(key) }
    }

    /// The key, if one is configured.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.key.as_ref()
    }

    /// Check `signature` over `signed_data`.
    ///
    /// Empty data or an empty signature never verifies.
    pub fn verify(&self, signed_data: &str, signature: &str) -> bool {
        if signed_data.is_empty() || signature.is_empty() {
            return false;
        }
        match &self.key {
            Some(key) => key.verify(signed_data.as_bytes(), signature),
            None => false,
        }
    }
}

/// Verify `signature` over `signed_data` with a base64-encoded public key.
///
/// Any empty argument short-circuits to `Ok(false)` without decoding. Only
/// malformed key material is an error.
pub fn verify_signature(public_key: &str, signed_data: &str, signature: &str) -> Result<bool> {
    if signed_data.is_empty() || public_key.is_empty() || signature.is_empty() {
        return Ok(false);
    }
    let key = PublicKey::from_base64(public_key)?;
    Ok(key.verify(signed_data.as_bytes(), signature))
}

/// The anti-tamper token sent with a buy request and echoed back in the
/// purchase data.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeveloperPayload(String);

impl DeveloperPayload {
    /// Generate a fresh payload from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; DEVELOPER_PAYLOAD_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(base64_encode(bytes))
    }

    /// Wrap an existing payload string.
    pub fn from_string(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// The payload as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against an echoed payload.
    pub fn matches(&self, echoed: &str) -> bool {
        let a = self.0.as_bytes();
        let b = echoed.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Debug for DeveloperPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeveloperPayload({})", self.0)
    }
}

impl fmt::Display for DeveloperPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeveloperPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
