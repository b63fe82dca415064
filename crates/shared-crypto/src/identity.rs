//! # ECDSA Identity (P-384, SHA-512)
//!
//! Asymmetric key pairs used for both the ephemeral per-session keys and the
//! persistent device identity.
//!
//! ## Encodings
//!
//! - Public keys travel as DER `SubjectPublicKeyInfo` bytes.
//! - Private keys are exported as DER PKCS#8 bytes wrapped in `Zeroizing`.
//! - Signatures are fixed-size `r || s` (96 bytes).
//!
//! ## Digest
//!
//! Messages are hashed with SHA-512 and the digest is signed as a prehash.
//! ECDSA truncates the digest to the 384-bit field, matching what WebCrypto
//! does for `{ name: "ECDSA", hash: "SHA-512" }` on P-384.

use crate::CryptoError;
use p384::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use p384::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

/// Length of an encoded signature (`r || s`).
pub const SIGNATURE_LEN: usize = 96;

/// P-384 verification key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Import from DER `SubjectPublicKeyInfo` bytes.
    pub fn from_spki(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key =
            VerifyingKey::from_public_key_der(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key })
    }

    /// Export as DER `SubjectPublicKeyInfo` bytes.
    pub fn to_spki(&self) -> Result<Vec<u8>, CryptoError> {
        self.verifying_key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::ExportFailed(e.to_string()))
    }

    /// Verify a signature over `message`.
    ///
    /// Returns `false` for a mismatching or malformed signature; never errors.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        let digest = Sha512::digest(message);
        self.verifying_key.verify_prehash(&digest, &sig).is_ok()
    }

    /// Short hex fingerprint (first 8 bytes of SHA-256 over the SEC1 point).
    ///
    /// Only meant for log correlation.
    pub fn fingerprint(&self) -> String {
        let point = self.verifying_key.to_encoded_point(true);
        let hash = Sha256::digest(point.as_bytes());
        hex::encode(&hash[..8])
    }
}

/// P-384 signing key pair.
///
/// The secret scalar is zeroized when the pair is dropped.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Import from DER PKCS#8 bytes.
    pub fn from_pkcs8(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_pkcs8_der(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Export the private key as DER PKCS#8 bytes.
    pub fn to_pkcs8(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let doc = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::ExportFailed(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Get the public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: *self.signing_key.verifying_key(),
        }
    }

    /// Sign a message (SHA-512 prehash, deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = Sha512::digest(message);
        let sig: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|_| CryptoError::SigningFailed)?;
        Ok(sig.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key().fingerprint())
            .finish_non_exhaustive()
    }
}
