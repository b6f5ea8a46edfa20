//! ECDSA footer verification for signed suites.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p256::ecdsa::signature::Verifier;

use super::envelope::EnvelopeError;
use super::suite::SignatureAlgorithm;

/// Verification key taken from the envelope's encryption context.
#[derive(Debug, Clone)]
pub enum MessageVerifier {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl MessageVerifier {
    /// Decode a base64 compressed SEC1 point for `algorithm`.
    pub fn from_context_value(
        algorithm: SignatureAlgorithm,
        encoded: &str,
    ) -> Result<Self, EnvelopeError> {
        let point = STANDARD
            .decode(encoded)
            .map_err(|_| EnvelopeError::InvalidPublicKey)?;
        match algorithm {
            SignatureAlgorithm::EcdsaP256Sha256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map(MessageVerifier::P256)
                .map_err(|_| EnvelopeError::InvalidPublicKey),
            SignatureAlgorithm::EcdsaP384Sha384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map(MessageVerifier::P384)
                .map_err(|_| EnvelopeError::InvalidPublicKey),
        }
    }

    /// Verify a DER signature over `message`, hashing with the curve's digest.
    pub fn verify(&self, message: &[u8], der: &[u8]) -> Result<(), EnvelopeError> {
        match self {
            MessageVerifier::P256(key) => {
                let sig = p256::ecdsa::Signature::from_der(der)
                    .map_err(|_| EnvelopeError::Signature)?;
                key.verify(message, &sig).map_err(|_| EnvelopeError::Signature)
            }
            MessageVerifier::P384(key) => {
                let sig = p384::ecdsa::Signature::from_der(der)
                    .map_err(|_| EnvelopeError::Signature)?;
                key.verify(message, &sig).map_err(|_| EnvelopeError::Signature)
            }
        }
    }
}
