//! Test fixtures: PEM keys, cross-implementation vectors and a message builder.

use std::collections::BTreeMap;

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;

use super::body::{Frame, FrameKind, FINAL_FRAME_MARKER};
use super::cipher::build_cipher;
use super::envelope::derive_content_key;
use super::header::{
    CUSTOMER_AE_DATA, MESSAGE_FORMAT_V1, MESSAGE_ID_LEN, PUBLIC_KEY_CONTEXT_KEY,
};
use super::keyring::DataKey;
use super::suite::{AlgorithmSuite, SignatureAlgorithm, IV_LEN, TAG_LEN};

const RSA_A: &str = include_str!("../../testdata/rsa-a.pem");
const RSA_A_PKCS1: &str = include_str!("../../testdata/rsa-a.pkcs1.pem");
const RSA_B: &str = include_str!("../../testdata/rsa-b.pem");

/// Suite 0x0378, 16-byte frames, wrapped for `upstream-platform`/`key-a`.
pub const FRAMED_0378_VECTOR: &str = include_str!("../../testdata/framed-0378.b64");
/// Suite 0x0178, single block, wrapped for `upstream-platform`/`key-a`.
pub const SINGLE_BLOCK_0178_VECTOR: &str = include_str!("../../testdata/single-block-0178.b64");
/// Plaintext of both vectors.
pub const VECTOR_PLAINTEXT: &str = "4111-1111-1111-1111 exp 09/29";

/// Fixture private key PEM: `"a"`, `"a.pkcs1"` or `"b"`.
pub fn fixture_pem(name: &str) -> &'static str {
    match name {
        "a" => RSA_A,
        "a.pkcs1" => RSA_A_PKCS1,
        "b" => RSA_B,
        other => panic!("no fixture key {other:?}"),
    }
}

pub fn public_key_of(pem: &str) -> RsaPublicKey {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .expect("fixture pem")
        .to_public_key()
}

enum TestSigner {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl TestSigner {
    fn random(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::EcdsaP256Sha256 => {
                TestSigner::P256(p256::ecdsa::SigningKey::random(&mut OsRng))
            }
            SignatureAlgorithm::EcdsaP384Sha384 => {
                TestSigner::P384(p384::ecdsa::SigningKey::random(&mut OsRng))
            }
        }
    }

    fn public_key_b64(&self) -> String {
        let point = match self {
            TestSigner::P256(k) => k.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            TestSigner::P384(k) => k.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        };
        STANDARD.encode(point)
    }

    fn sign_der(&self, message: &[u8]) -> Vec<u8> {
        use p256::ecdsa::signature::Signer;
        match self {
            TestSigner::P256(k) => {
                let sig: p256::ecdsa::Signature = k.sign(message);
                sig.to_der().as_bytes().to_vec()
            }
            TestSigner::P384(k) => {
                let sig: p384::ecdsa::Signature = k.sign(message);
                sig.to_der().as_bytes().to_vec()
            }
        }
    }
}

/// Produces legacy-format messages for tests. Production code never encrypts.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    suite: AlgorithmSuite,
    frame_length: u32,
    namespace: String,
    key_name: String,
    context: BTreeMap<String, String>,
    embed_public_key: bool,
}

impl MessageBuilder {
    pub fn new(suite: AlgorithmSuite) -> Self {
        Self {
            suite,
            frame_length: 4096,
            namespace: "upstream-platform".into(),
            key_name: "key-a".into(),
            context: BTreeMap::new(),
            embed_public_key: true,
        }
    }

    /// `0` selects single-block content.
    pub fn frame_length(mut self, frame_length: u32) -> Self {
        self.frame_length = frame_length;
        self
    }

    pub fn key(mut self, namespace: &str, key_name: &str) -> Self {
        self.namespace = namespace.into();
        self.key_name = key_name.into();
        self
    }

    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Leave the verification key out of the context of a signed suite.
    pub fn without_public_key(mut self) -> Self {
        self.embed_public_key = false;
        self
    }

    pub fn random_data_key(&self) -> DataKey {
        let mut bytes = vec![0u8; self.suite.data_key_len()];
        OsRng.fill_bytes(&mut bytes);
        DataKey::new(bytes)
    }

    /// Wrap a fresh data key to `public_key` with RSA-OAEP-SHA512 and encrypt.
    pub fn build(&self, public_key: &RsaPublicKey, plaintext: &[u8]) -> Vec<u8> {
        let data_key = self.random_data_key();
        let wrapped = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha512>(), data_key.as_bytes())
            .expect("rsa-oaep wrap");
        self.build_with_data_key(&data_key, wrapped, plaintext)
    }

    /// Encrypt under `data_key`, carrying `wrapped` as the only data key.
    pub fn build_with_data_key(&self, data_key: &DataKey, wrapped: Vec<u8>, plaintext: &[u8]) -> Vec<u8> {
        let signer = self.suite.signature().map(TestSigner::random);
        let mut context = self.context.clone();
        if let Some(signer) = signer.as_ref().filter(|_| self.embed_public_key) {
            context.insert(PUBLIC_KEY_CONTEXT_KEY.into(), signer.public_key_b64());
        }

        let mut message_id = [0u8; MESSAGE_ID_LEN];
        OsRng.fill_bytes(&mut message_id);

        let mut out = vec![MESSAGE_FORMAT_V1, CUSTOMER_AE_DATA];
        out.extend_from_slice(&self.suite.id().to_be_bytes());
        out.extend_from_slice(&message_id);
        let mut aad = Vec::new();
        if !context.is_empty() {
            aad.extend_from_slice(&(context.len() as u16).to_be_bytes());
            for (k, v) in &context {
                put_u16_prefixed(&mut aad, k.as_bytes());
                put_u16_prefixed(&mut aad, v.as_bytes());
            }
        }
        put_u16_prefixed(&mut out, &aad);
        out.extend_from_slice(&1u16.to_be_bytes());
        put_u16_prefixed(&mut out, self.namespace.as_bytes());
        put_u16_prefixed(&mut out, self.key_name.as_bytes());
        put_u16_prefixed(&mut out, &wrapped);
        out.push(if self.frame_length == 0 { 0x01 } else { 0x02 });
        out.extend_from_slice(&[0; 4]);
        out.push(IV_LEN as u8);
        out.extend_from_slice(&self.frame_length.to_be_bytes());

        let content_key = derive_content_key(self.suite, &message_id, data_key.as_bytes())
            .expect("content key");
        let cipher = build_cipher(&content_key).expect("cipher");

        let header_iv = random_iv();
        let header_tag = cipher.seal_in_place(&header_iv, &out, &mut []);
        out.extend_from_slice(&header_iv);
        out.extend_from_slice(&header_tag);

        for mut frame in self.frames(plaintext) {
            let aad = frame.aad(&message_id);
            frame.tag = cipher.seal_in_place(&frame.iv, &aad, &mut frame.ciphertext);
            match frame.kind {
                FrameKind::SingleBlock => {
                    out.extend_from_slice(&frame.iv);
                    out.extend_from_slice(&(frame.ciphertext.len() as u64).to_be_bytes());
                }
                FrameKind::Regular => {
                    out.extend_from_slice(&frame.sequence_number.to_be_bytes());
                    out.extend_from_slice(&frame.iv);
                }
                FrameKind::Final => {
                    out.extend_from_slice(&FINAL_FRAME_MARKER.to_be_bytes());
                    out.extend_from_slice(&frame.sequence_number.to_be_bytes());
                    out.extend_from_slice(&frame.iv);
                    out.extend_from_slice(&(frame.ciphertext.len() as u32).to_be_bytes());
                }
            }
            out.extend_from_slice(&frame.ciphertext);
            out.extend_from_slice(&frame.tag);
        }

        if let Some(signer) = signer {
            let der = signer.sign_der(&out);
            put_u16_prefixed(&mut out, &der);
        }
        out
    }

    /// Same as [`MessageBuilder::build`], base64-encoded.
    pub fn build_b64(&self, public_key: &RsaPublicKey, plaintext: &[u8]) -> String {
        STANDARD.encode(self.build(public_key, plaintext))
    }

    /// Unsealed frames; `ciphertext` holds plaintext until sealed.
    fn frames(&self, plaintext: &[u8]) -> Vec<Frame> {
        let frame = |kind, sequence_number, content: &[u8]| Frame {
            kind,
            sequence_number,
            iv: random_iv(),
            ciphertext: content.to_vec(),
            tag: [0; TAG_LEN],
        };
        if self.frame_length == 0 {
            return vec![frame(FrameKind::SingleBlock, 1, plaintext)];
        }
        let frame_length = self.frame_length as usize;
        let mut frames = Vec::new();
        let mut rest = plaintext;
        let mut seq = 1;
        while rest.len() >= frame_length {
            let (chunk, tail) = rest.split_at(frame_length);
            frames.push(frame(FrameKind::Regular, seq, chunk));
            rest = tail;
            seq += 1;
        }
        frames.push(frame(FrameKind::Final, seq, rest));
        frames
    }
}

fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

fn put_u16_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}
