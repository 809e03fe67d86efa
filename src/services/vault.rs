use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

/// AES-256-GCM nonce length in bytes.
const IV_LEN: usize = 12;
/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Output of a single encryption call: ciphertext plus the components
/// needed to verify and reverse it. Stored as three separate columns.
#[derive(Debug, Clone)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}

/// AES-256-GCM vault for provider API keys at rest.
///
/// The key is process-wide configuration, handed in once at startup.
/// There is no in-process key rotation: rotating the key invalidates every
/// previously stored credential.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Create from a 64-character hex-encoded 32-byte key.
    pub fn new(key_hex: &str) -> Result<Self, VaultError> {
        let key_bytes = decode_key_hex(key_hex).ok_or(VaultError::InvalidKey)?;

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|_| VaultError::InvalidKey)?;

        Ok(Self { cipher })
    }

    /// Encrypt a plaintext key, generating a fresh random IV.
    ///
    /// IV reuse under the same key breaks GCM confidentiality, so freshness
    /// per call is an invariant, not an optimization.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedSecret, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::EncryptFailed)?;

        // aes-gcm appends the 16-byte tag to the ciphertext; split it back
        // out so the three components can be stored separately.
        let auth_tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(SealedSecret {
            ciphertext: sealed,
            iv: nonce.to_vec(),
            auth_tag,
        })
    }

    /// Decrypt a stored credential. Fails if the tag does not verify
    /// (tampering, wrong key, corrupted storage) or any component is
    /// malformed; never returns garbage plaintext.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
        auth_tag: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        if iv.len() != IV_LEN || auth_tag.len() != TAG_LEN {
            return Err(VaultError::DecryptFailed);
        }

        let nonce = Nonce::from_slice(iv);
        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(auth_tag);

        self.cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| VaultError::DecryptFailed)
    }
}

/// Parses a 64-character hex string into raw 32 bytes.
///
/// Returns `None` if the length or any character is off.
fn decode_key_hex(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let raw = s.as_bytes();
    let mut bytes = [0u8; 32];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let hi = hex_char_to_nibble(raw[i * 2])?;
        let lo = hex_char_to_nibble(raw[i * 2 + 1])?;
        *byte = (hi << 4) | lo;
    }
    Some(bytes)
}

const fn hex_char_to_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid encryption key (must be 32 bytes, hex-encoded)")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptFailed,

    #[error("Decryption failed")]
    DecryptFailed,
}
