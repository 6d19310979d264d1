//! AES-256-CBC encryption for quarantined content.
//!
//! On-disk layout is `[16-byte IV][PKCS#7-padded ciphertext]`. The key
//! never touches disk except as the dedicated `encryption.key` file
//! managed by [`crate::KeyFile`].

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::{QuarantineError, Result};

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Generates 32 cryptographically random bytes for a new quarantine key.
#[must_use]
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Encrypts `plaintext` under `key`, prefixing a fresh random IV.
#[must_use]
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob
}

/// Decrypts a `[IV][ciphertext]` blob produced by [`encrypt`].
///
/// # Errors
///
/// [`QuarantineError::CorruptBlob`]-shaped callers should check length
/// themselves; this function returns [`QuarantineError::DecryptionFailed`]
/// for anything shorter than the IV, an empty ciphertext remainder, a
/// key mismatch, or invalid padding.
pub fn decrypt(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() <= IV_LEN {
        return Err(QuarantineError::DecryptionFailed);
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| QuarantineError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let key = generate_key();
        let plaintext = b"quarantined file contents";
        let blob = encrypt(&key, plaintext);
        let recovered = decrypt(&key, &blob).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let key = generate_key();
        let other_key = generate_key();
        let blob = encrypt(&key, b"secret bytes");
        assert!(decrypt(&other_key, &blob).is_err());
    }

    #[test]
    fn decrypt_rejects_blob_shorter_than_iv() {
        let key = generate_key();
        assert!(decrypt(&key, &[0u8; 4]).is_err());
    }

    #[test]
    fn decrypt_rejects_empty_ciphertext_remainder() {
        let key = generate_key();
        assert!(decrypt(&key, &[0u8; IV_LEN]).is_err());
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = generate_key();
        let blob = encrypt(&key, b"");
        assert_eq!(decrypt(&key, &blob).unwrap(), b"");
    }
}
