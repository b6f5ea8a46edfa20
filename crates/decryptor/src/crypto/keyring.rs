//! Raw RSA keyring: unwraps the per-message data key with RSA-OAEP.
//!
//! The keyring is identified by `(namespace, key_name)`. Only encrypted data
//! keys whose provider id and provider info match both are ever tried.

use aes_gcm::aead::OsRng;
use common::FailureKind;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha512;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::header::MessageHeader;

#[derive(Debug, Error)]
pub enum KeyringError {
    /// The retrieved PEM is neither PKCS#8 nor PKCS#1 RSA.
    #[error("private key material could not be parsed")]
    InvalidPrivateKey,

    #[error("envelope has no data key wrapped for {namespace}/{key_name}")]
    NoMatchingDataKey { namespace: String, key_name: String },

    #[error("no matching data key could be unwrapped")]
    Unwrap,
}

impl KeyringError {
    pub fn kind(&self) -> FailureKind {
        match self {
            KeyringError::NoMatchingDataKey { .. } => FailureKind::KeyMismatch,
            KeyringError::InvalidPrivateKey | KeyringError::Unwrap => FailureKind::UnwrapFailure,
        }
    }
}

/// Unwrapped data key. Overwritten on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: Vec<u8>,
}

impl DataKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataKey([REDACTED; {}])", self.bytes.len())
    }
}

/// Fail with [`KeyringError::NoMatchingDataKey`] unless `header` carries at
/// least one data key wrapped for `(namespace, key_name)`.
///
/// Needs no key material, so it can run before the private key is fetched.
pub fn ensure_wrapped_for(
    header: &MessageHeader,
    namespace: &str,
    key_name: &str,
) -> Result<(), KeyringError> {
    if header.data_keys_for(namespace, key_name).next().is_none() {
        return Err(KeyringError::NoMatchingDataKey {
            namespace: namespace.to_owned(),
            key_name: key_name.to_owned(),
        });
    }
    Ok(())
}

pub struct RawRsaKeyring {
    namespace: String,
    key_name: String,
    // Zeroizes its own limbs on drop.
    private_key: RsaPrivateKey,
}

impl RawRsaKeyring {
    /// Parse a PKCS#8 PEM private key, falling back to PKCS#1.
    pub fn from_pem(
        namespace: impl Into<String>,
        key_name: impl Into<String>,
        pem: &str,
    ) -> Result<Self, KeyringError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|_| KeyringError::InvalidPrivateKey)?;
        Ok(Self {
            namespace: namespace.into(),
            key_name: key_name.into(),
            private_key,
        })
    }

    /// Try every matching data key in order; the first that unwraps to the
    /// suite's data key length wins.
    pub fn unwrap_data_key(&self, header: &MessageHeader) -> Result<DataKey, KeyringError> {
        ensure_wrapped_for(header, &self.namespace, &self.key_name)?;
        let expected_len = header.suite.data_key_len();
        for edk in header.data_keys_for(&self.namespace, &self.key_name) {
            let Ok(bytes) =
                self.private_key
                    .decrypt_blinded(&mut OsRng, Oaep::new::<Sha512>(), &edk.ciphertext)
            else {
                continue;
            };
            let bytes = Zeroizing::new(bytes);
            if bytes.len() == expected_len {
                return Ok(DataKey::new(bytes.to_vec()));
            }
        }
        Err(KeyringError::Unwrap)
    }
}

impl std::fmt::Debug for RawRsaKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRsaKeyring")
            .field("namespace", &self.namespace)
            .field("key_name", &self.key_name)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}
