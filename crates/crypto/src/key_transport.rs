//! RSA-OAEP session key transport
//!
//! The responder generates an ephemeral RSA key pair per connection and sends
//! the public half; the initiator wraps a fresh [`SessionKey`] under it with
//! OAEP (SHA-256) and the responder unwraps it.

use crate::aes::SessionKey;
use pixelpost_protocol::PublicKeyMessage;
use rand::rngs::OsRng;
use rsa::{traits::PublicKeyParts, BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Smallest modulus either side accepts
pub const MIN_MODULUS_BITS: usize = 3072;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Deliberately opaque: padding and length failures look the same
    #[error("Session key decryption failed")]
    Decryption,

    #[error("Session key encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Ephemeral RSA key pair held by the responder
pub struct RsaKeyPair {
    private: RsaPrivateKey,
}

impl RsaKeyPair {
    /// Generate a new key pair from the OS RNG
    ///
    /// This is CPU heavy; async callers should run it on a blocking thread.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_MODULUS_BITS {
            return Err(KeyError::KeyGeneration(format!(
                "{} bit modulus is below the {} bit minimum",
                bits, MIN_MODULUS_BITS
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| KeyError::KeyGeneration(e.to_string()))?;
        Ok(Self { private })
    }

    pub fn modulus_bits(&self) -> usize {
        self.private.n().bits()
    }

    /// Public half, as the initiator will see it
    pub fn public_key(&self) -> RsaPeerKey {
        RsaPeerKey {
            public: self.private.to_public_key(),
        }
    }

    /// Encode the public key for transmission
    pub fn export_public(&self) -> Result<Vec<u8>, KeyError> {
        self.public_key().export()
    }

    /// Recover the session key from OAEP ciphertext
    pub fn unwrap_session_key(&self, ciphertext: &[u8]) -> Result<SessionKey, KeyError> {
        let plaintext = self
            .private
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| KeyError::Decryption)?;

        SessionKey::from_slice(&plaintext).ok_or(KeyError::Decryption)
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

/// Peer's RSA public key as imported by the initiator
#[derive(Debug, Clone)]
pub struct RsaPeerKey {
    public: RsaPublicKey,
}

impl RsaPeerKey {
    /// Decode a received public key, rejecting weak moduli
    pub fn import(bytes: &[u8]) -> Result<Self, KeyError> {
        let msg = PublicKeyMessage::from_bytes(bytes)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;

        let n = BigUint::from_bytes_be(&msg.modulus);
        let e = BigUint::from_bytes_be(&msg.exponent);
        let public =
            RsaPublicKey::new(n, e).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;

        let bits = public.n().bits();
        if bits < MIN_MODULUS_BITS {
            return Err(KeyError::InvalidPublicKey(format!(
                "{} bit modulus is below the {} bit minimum",
                bits, MIN_MODULUS_BITS
            )));
        }

        Ok(Self { public })
    }

    pub fn export(&self) -> Result<Vec<u8>, KeyError> {
        PublicKeyMessage {
            modulus: self.public.n().to_bytes_be(),
            exponent: self.public.e().to_bytes_be(),
        }
        .to_bytes()
        .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    }

    pub fn modulus_bits(&self) -> usize {
        self.public.n().bits()
    }

    /// OAEP-encrypt `key` under this public key
    pub fn wrap_session_key(&self, key: &SessionKey) -> Result<Vec<u8>, KeyError> {
        self.public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|e| KeyError::Encryption(e.to_string()))
    }

    /// Hex SHA-256 over modulus and exponent, for logs
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.public.n().to_bytes_be());
        hasher.update(self.public.e().to_bytes_be());
        hex::encode(hasher.finalize())
    }
}
