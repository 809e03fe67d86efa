use uuid::Uuid;

/// Encrypted speech-provider API key, one row per user.
///
/// All three components are opaque byte sequences produced by the
/// credential vault; the plaintext key only ever exists in worker memory.
#[derive(Debug, Clone)]
pub struct EncryptedCredential {
    pub user_id: Uuid,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}
