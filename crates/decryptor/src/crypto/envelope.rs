//! Envelope codec: structural decode and authenticated decrypt.
//!
//! [`EnvelopeCodec::decode`] needs no key material. It validates the whole
//! container, enforces the suite allow-list and the data-key limit, and
//! resolves the footer verification key. [`EnvelopeCodec::decrypt`] runs
//! only after the keyring has produced a [`DataKey`].

use common::FailureKind;
use hkdf::Hkdf;
use sha2::{Sha256, Sha384};
use thiserror::Error;
use zeroize::Zeroizing;

use super::body::{parse_body, Frame};
use super::cipher::{build_cipher, CipherError};
use super::header::{HeaderAuth, MessageHeader, MESSAGE_ID_LEN, PUBLIC_KEY_CONTEXT_KEY};
use super::keyring::DataKey;
use super::reader::Reader;
use super::signature::MessageVerifier;
use super::suite::{AlgorithmSuite, Kdf, SuiteAllowList, SuiteError};

/// Errors produced while decoding or decrypting an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("envelope truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unsupported message format version 0x{0:02X}")]
    UnsupportedVersion(u8),

    #[error("unsupported message type 0x{0:02X}")]
    UnsupportedType(u8),

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error("malformed envelope: {0}")]
    Invalid(String),

    #[error("envelope carries {count} encrypted data keys, limit is {max}")]
    TooManyDataKeys { count: usize, max: usize },

    #[error("{0} unexpected bytes after the envelope")]
    TrailingBytes(usize),

    #[error("signed suite without a verification key in the encryption context")]
    MissingPublicKey,

    #[error("verification key in the encryption context is not a valid point")]
    InvalidPublicKey,

    #[error("header authentication failed")]
    HeaderAuthentication,

    #[error("body authentication failed at frame {sequence_number}")]
    BodyAuthentication { sequence_number: u32 },

    #[error("message signature did not verify")]
    Signature,

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("content key derivation failed: {0}")]
    KeyDerivation(&'static str),
}

impl EnvelopeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EnvelopeError::Suite(_) => FailureKind::UnsupportedAlgorithm,
            EnvelopeError::HeaderAuthentication
            | EnvelopeError::BodyAuthentication { .. }
            | EnvelopeError::Signature => FailureKind::AuthenticationFailure,
            EnvelopeError::Cipher(_) | EnvelopeError::KeyDerivation(_) => {
                FailureKind::InternalError
            }
            _ => FailureKind::MalformedEnvelope,
        }
    }
}

/// Footer of a signed message.
#[derive(Debug, Clone)]
pub struct Footer {
    verifier: MessageVerifier,
    /// Header, header authentication and body, exactly as received.
    signed: Vec<u8>,
    signature: Vec<u8>,
}

/// A structurally valid envelope, not yet authenticated.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub header: MessageHeader,
    pub header_auth: HeaderAuth,
    pub frames: Vec<Frame>,
    pub footer: Option<Footer>,
}

impl Envelope {
    pub fn suite(&self) -> AlgorithmSuite {
        self.header.suite
    }
}

/// Decoder and decrypter for the legacy message format.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    allow_list: SuiteAllowList,
    max_encrypted_data_keys: usize,
    max_envelope_bytes: usize,
}

impl EnvelopeCodec {
    pub fn new(
        allow_list: SuiteAllowList,
        max_encrypted_data_keys: usize,
        max_envelope_bytes: usize,
    ) -> Self {
        Self {
            allow_list,
            max_encrypted_data_keys,
            max_envelope_bytes,
        }
    }

    pub fn allow_list(&self) -> &SuiteAllowList {
        &self.allow_list
    }

    pub fn max_envelope_bytes(&self) -> usize {
        self.max_envelope_bytes
    }

    /// Parse and validate `bytes` without touching any key material.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Suite`] when the suite is not on the allow-list; every
    /// other decode error is structural.
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
        if bytes.len() > self.max_envelope_bytes {
            return Err(EnvelopeError::TooLarge {
                size: bytes.len(),
                max: self.max_envelope_bytes,
            });
        }

        let mut r = Reader::new(bytes);
        let (header, header_auth) =
            MessageHeader::parse(&mut r, &self.allow_list, self.max_encrypted_data_keys)?;

        let verifier = match header.suite.signature() {
            Some(algorithm) => {
                let encoded = header
                    .encryption_context
                    .get(PUBLIC_KEY_CONTEXT_KEY)
                    .ok_or(EnvelopeError::MissingPublicKey)?;
                Some(MessageVerifier::from_context_value(algorithm, encoded)?)
            }
            None => None,
        };

        let frames = parse_body(&mut r, header.content_type, header.frame_length)?;

        let footer = match verifier {
            Some(verifier) => {
                let signed = r.consumed_since(0).to_vec();
                let signature = r.u16_prefixed("signature")?.to_vec();
                Some(Footer {
                    verifier,
                    signed,
                    signature,
                })
            }
            None => None,
        };

        if r.remaining() != 0 {
            return Err(EnvelopeError::TrailingBytes(r.remaining()));
        }

        Ok(Envelope {
            header,
            header_auth,
            frames,
            footer,
        })
    }

    /// Authenticate and decrypt `envelope` with the unwrapped `data_key`.
    ///
    /// Checks run in order: header tag, each frame tag, footer signature. No
    /// plaintext is returned unless all of them pass.
    pub fn decrypt(
        &self,
        envelope: &Envelope,
        data_key: &DataKey,
    ) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
        let header = &envelope.header;
        let content_key = derive_content_key(header.suite, &header.message_id, data_key.as_bytes())?;
        let cipher = build_cipher(&content_key)?;

        let auth = &envelope.header_auth;
        cipher
            .open_in_place(&auth.iv, &header.raw, &mut [], &auth.tag)
            .map_err(|_| EnvelopeError::HeaderAuthentication)?;

        let total: usize = envelope.frames.iter().map(|f| f.ciphertext.len()).sum();
        let mut plaintext = Zeroizing::new(Vec::<u8>::with_capacity(total));
        for frame in &envelope.frames {
            let mut buf = Zeroizing::new(frame.ciphertext.clone());
            cipher
                .open_in_place(&frame.iv, &frame.aad(&header.message_id), &mut buf, &frame.tag)
                .map_err(|_| EnvelopeError::BodyAuthentication {
                    sequence_number: frame.sequence_number,
                })?;
            plaintext.extend_from_slice(&buf);
        }

        if let Some(footer) = &envelope.footer {
            footer.verifier.verify(&footer.signed, &footer.signature)?;
        }

        Ok(plaintext)
    }
}

/// Derive the content key for `suite` from the unwrapped data key.
pub(crate) fn derive_content_key(
    suite: AlgorithmSuite,
    message_id: &[u8; MESSAGE_ID_LEN],
    data_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    if data_key.len() != suite.data_key_len() {
        return Err(EnvelopeError::KeyDerivation("data key length does not match suite"));
    }

    let mut info = Vec::with_capacity(2 + MESSAGE_ID_LEN);
    info.extend_from_slice(&suite.id().to_be_bytes());
    info.extend_from_slice(message_id);

    let mut okm = Zeroizing::new(vec![0u8; suite.data_key_len()]);
    match suite.kdf() {
        Kdf::Identity => okm.copy_from_slice(data_key),
        Kdf::HkdfSha256 => Hkdf::<Sha256>::new(None, data_key)
            .expand(&info, &mut okm)
            .map_err(|_| EnvelopeError::KeyDerivation("hkdf-sha256 expand"))?,
        Kdf::HkdfSha384 => Hkdf::<Sha384>::new(None, data_key)
            .expand(&info, &mut okm)
            .map_err(|_| EnvelopeError::KeyDerivation("hkdf-sha384 expand"))?,
        Kdf::HkdfSha512 => {
            return Err(EnvelopeError::KeyDerivation("committing suites are not decryptable"))
        }
    }
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keyring::RawRsaKeyring;
    use crate::crypto::testing::{
        fixture_pem, MessageBuilder, FRAMED_0378_VECTOR, SINGLE_BLOCK_0178_VECTOR,
        VECTOR_PLAINTEXT,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const PLAINTEXT: &[u8] = b"4111-1111-1111-1111 exp 09/29";

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new(SuiteAllowList::legacy_default(), 8, 65536)
    }

    fn sealed(builder: &MessageBuilder) -> (Vec<u8>, DataKey) {
        let data_key = builder.random_data_key();
        let bytes = builder.build_with_data_key(&data_key, vec![0x5A; 256], PLAINTEXT);
        (bytes, data_key)
    }

    #[test]
    fn every_legacy_suite_round_trips() {
        for suite in SuiteAllowList::legacy_default().iter() {
            for frame_length in [0, 7, 4096] {
                let builder = MessageBuilder::new(suite).frame_length(frame_length);
                let (bytes, key) = sealed(&builder);
                let envelope = codec().decode(&bytes).unwrap();
                assert_eq!(envelope.footer.is_some(), suite.signature().is_some());
                let plaintext = codec().decrypt(&envelope, &key).unwrap();
                assert_eq!(plaintext.as_slice(), PLAINTEXT, "suite {suite} frame {frame_length}");
            }
        }
    }

    #[test]
    fn exact_multiple_of_frame_length_ends_with_empty_final_frame() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256)
            .frame_length(PLAINTEXT.len() as u32);
        let (bytes, key) = sealed(&builder);
        let envelope = codec().decode(&bytes).unwrap();
        assert_eq!(envelope.frames.len(), 2);
        assert!(envelope.frames[1].ciphertext.is_empty());
        assert_eq!(codec().decrypt(&envelope, &key).unwrap().as_slice(), PLAINTEXT);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384);
        let key = builder.random_data_key();
        let bytes = builder.build_with_data_key(&key, vec![1; 8], b"");
        let envelope = codec().decode(&bytes).unwrap();
        assert!(codec().decrypt(&envelope, &key).unwrap().is_empty());
    }

    #[test]
    fn flipping_any_body_bit_fails_authentication() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256).frame_length(8);
        let (bytes, key) = sealed(&builder);
        let body_start = codec().decode(&bytes).unwrap().header.raw.len() + 28;
        for at in body_start..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[at] ^= 0x01;
            // Flips in length or sequence fields are caught structurally instead.
            if let Ok(envelope) = codec().decode(&tampered) {
                let err = codec().decrypt(&envelope, &key).unwrap_err();
                assert_eq!(err.kind(), FailureKind::AuthenticationFailure, "offset {at}");
            }
        }
    }

    #[test]
    fn tampered_header_fails_header_auth() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256)
            .context("purpose", "contact-flow");
        let (mut bytes, key) = sealed(&builder);
        // Last byte of the message id.
        bytes[4 + MESSAGE_ID_LEN - 1] ^= 0x80;
        let envelope = codec().decode(&bytes).unwrap();
        assert!(matches!(
            codec().decrypt(&envelope, &key),
            Err(EnvelopeError::HeaderAuthentication)
        ));
    }

    #[test]
    fn wrong_data_key_fails_authentication() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16NoKdf);
        let (bytes, _) = sealed(&builder);
        let other = builder.random_data_key();
        let envelope = codec().decode(&bytes).unwrap();
        let err = codec().decrypt(&envelope, &other).unwrap_err();
        assert_eq!(err.kind(), FailureKind::AuthenticationFailure);
    }

    #[test]
    fn corrupted_signature_fails_authentication() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256EcdsaP256);
        let (mut bytes, key) = sealed(&builder);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        match codec().decode(&bytes) {
            Ok(envelope) => {
                let err = codec().decrypt(&envelope, &key).unwrap_err();
                assert_eq!(err.kind(), FailureKind::AuthenticationFailure);
            }
            Err(e) => panic!("footer damage should not be structural: {e}"),
        }
    }

    #[test]
    fn signed_suite_without_public_key_is_malformed() {
        let builder = MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384)
            .without_public_key();
        let (bytes, _) = sealed(&builder);
        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingPublicKey));
        assert_eq!(err.kind(), FailureKind::MalformedEnvelope);
    }

    #[test]
    fn narrowed_allow_list_rejects_other_suites() {
        let codec = EnvelopeCodec::new(SuiteAllowList::parse("0x0378").unwrap(), 8, 65536);
        let (bytes, _) = sealed(&MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16NoKdf));
        let err = codec.decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnsupportedAlgorithm);
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let (mut bytes, _) = sealed(&MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256));
        bytes.push(0);
        assert!(matches!(codec().decode(&bytes), Err(EnvelopeError::TrailingBytes(1))));
    }

    #[test]
    fn truncation_anywhere_is_malformed() {
        let (bytes, _) = sealed(&MessageBuilder::new(AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384));
        for len in [0, 1, 3, 20, bytes.len() / 2, bytes.len() - 1] {
            let err = codec().decode(&bytes[..len]).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedEnvelope, "length {len}");
        }
    }

    #[test]
    fn oversized_envelope_is_rejected_before_parsing() {
        let codec = EnvelopeCodec::new(SuiteAllowList::legacy_default(), 8, 16);
        assert!(matches!(
            codec.decode(&[0u8; 17]),
            Err(EnvelopeError::TooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn hkdf_output_depends_on_message_id() {
        let suite = AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256;
        let a = derive_content_key(suite, &[1; MESSAGE_ID_LEN], &[9; 32]).unwrap();
        let b = derive_content_key(suite, &[2; MESSAGE_ID_LEN], &[9; 32]).unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
        let identity =
            derive_content_key(AlgorithmSuite::Aes256GcmIv12Tag16NoKdf, &[1; MESSAGE_ID_LEN], &[9; 32])
                .unwrap();
        assert_eq!(identity.as_slice(), &[9; 32]);
    }

    #[test]
    fn data_key_length_mismatch_is_internal() {
        let err = derive_content_key(
            AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256,
            &[0; MESSAGE_ID_LEN],
            &[0; 16],
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InternalError);
    }

    #[test]
    fn independently_generated_vectors_decrypt() {
        let keyring = RawRsaKeyring::from_pem("upstream-platform", "key-a", fixture_pem("a")).unwrap();
        for (vector, frames) in [(FRAMED_0378_VECTOR, 2), (SINGLE_BLOCK_0178_VECTOR, 1)] {
            let bytes = STANDARD.decode(vector.trim()).unwrap();
            let envelope = codec().decode(&bytes).unwrap();
            assert_eq!(envelope.frames.len(), frames);
            let data_key = keyring.unwrap_data_key(&envelope.header).unwrap();
            let plaintext = codec().decrypt(&envelope, &data_key).unwrap();
            assert_eq!(plaintext.as_slice(), VECTOR_PLAINTEXT.as_bytes());
        }
    }
}
