//! AES-GCM with detached tags, sized by the suite's content key.
//!
//! Every legacy suite uses a 96-bit IV and a 128-bit tag; only the key size
//! (128/192/256 bits) varies.
//!
//! **Decrypt only.** Production code never seals; [`BodyCipher::seal_in_place`]
//! exists for test fixtures.

use aes_gcm::{
    aead::{
        consts::{U12, U16},
        AeadInPlace, KeyInit,
    },
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce, Tag,
};
use thiserror::Error;

use super::suite::{IV_LEN, TAG_LEN};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The content key is not 16, 24 or 32 bytes.
    #[error("invalid content key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// The authentication tag did not verify.
    #[error("aead operation failed")]
    AeadFailure,
}

/// AES-GCM keyed with a derived content key.
pub enum BodyCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl BodyCipher {
    /// Verify `tag` over `aad` and `buffer`, decrypting `buffer` in place.
    ///
    /// On failure `buffer` contents are unspecified and must be discarded.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] if authentication fails.
    pub fn open_in_place(
        &self,
        iv: &[u8; IV_LEN],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<(), CipherError> {
        let nonce = Nonce::<U12>::from_slice(iv);
        let tag = Tag::<U16>::from_slice(tag);
        let result = match self {
            BodyCipher::Aes128(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
            BodyCipher::Aes192(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
            BodyCipher::Aes256(c) => c.decrypt_in_place_detached(nonce, aad, buffer, tag),
        };
        result.map_err(|_| CipherError::AeadFailure)
    }

    #[cfg(test)]
    pub fn seal_in_place(&self, iv: &[u8; IV_LEN], aad: &[u8], buffer: &mut [u8]) -> [u8; TAG_LEN] {
        let nonce = Nonce::<U12>::from_slice(iv);
        let tag = match self {
            BodyCipher::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
            BodyCipher::Aes192(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
            BodyCipher::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buffer),
        }
        .expect("aes-gcm seal");
        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&tag);
        out
    }
}

impl std::fmt::Debug for BodyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self {
            BodyCipher::Aes128(_) => 128,
            BodyCipher::Aes192(_) => 192,
            BodyCipher::Aes256(_) => 256,
        };
        write!(f, "BodyCipher(AES-{bits}-GCM)")
    }
}

/// Build the cipher matching the length of `key`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] unless `key` is 16, 24 or 32 bytes.
pub fn build_cipher(key: &[u8]) -> Result<BodyCipher, CipherError> {
    let invalid = |_| CipherError::InvalidKeyLength(key.len());
    match key.len() {
        16 => Aes128Gcm::new_from_slice(key).map(BodyCipher::Aes128).map_err(invalid),
        24 => Aes192Gcm::new_from_slice(key).map(BodyCipher::Aes192).map_err(invalid),
        32 => Aes256Gcm::new_from_slice(key).map(BodyCipher::Aes256).map_err(invalid),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}
