//! AES-256-GCM session encryption

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Session key length in bytes (AES-256)
pub const SESSION_KEY_LEN: usize = 32;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM tag length
pub const TAG_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Message failed integrity check")]
    IntegrityFailed,
}

/// Symmetric key shared by both ends of one connection
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Generate a fresh key from the OS RNG
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns `None` unless `bytes` is exactly [`SESSION_KEY_LEN`] long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; SESSION_KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Which end of the connection a cipher belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    fn label(self) -> &'static [u8] {
        match self {
            Role::Initiator => b"pixelpost initiator",
            Role::Responder => b"pixelpost responder",
        }
    }

    pub fn peer(self) -> Self {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

/// Per-connection AES-256-GCM cipher
///
/// Output layout: nonce (12 bytes) || ciphertext || tag (16 bytes).
///
/// The associated data of every message is the sender's role label followed
/// by the sender's message counter, so a frame only authenticates in the
/// direction and position it was sent in.
pub struct SessionCipher {
    cipher: Aes256Gcm,
    role: Role,
    send_seq: u64,
    recv_seq: u64,
}

impl SessionCipher {
    pub fn new(key: &SessionKey, role: Role) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self {
            cipher,
            role,
            send_seq: 0,
            recv_seq: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Encrypt the next outgoing message
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let seq = self.send_seq;
        let next = seq.checked_add(1).ok_or(CipherError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let aad = associated_data(self.role, seq);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::EncryptionFailed)?;

        self.send_seq = next;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypt the next incoming message (expects nonce || ciphertext || tag)
    pub fn decrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::IntegrityFailed);
        }

        let seq = self.recv_seq;
        let next = seq.checked_add(1).ok_or(CipherError::IntegrityFailed)?;

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let aad = associated_data(self.role.peer(), seq);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::IntegrityFailed)?;

        self.recv_seq = next;
        Ok(plaintext)
    }
}

fn associated_data(sender: Role, seq: u64) -> Vec<u8> {
    let label = sender.label();
    let mut aad = Vec::with_capacity(label.len() + 8);
    aad.extend_from_slice(label);
    aad.extend_from_slice(&seq.to_be_bytes());
    aad
}
