//! Message header of the legacy (version 1) envelope format.

use std::collections::BTreeMap;

use super::envelope::EnvelopeError;
use super::reader::Reader;
use super::suite::{AlgorithmSuite, SuiteAllowList, IV_LEN, TAG_LEN};

pub const MESSAGE_FORMAT_V1: u8 = 0x01;
pub const MESSAGE_FORMAT_V2: u8 = 0x02;
pub const CUSTOMER_AE_DATA: u8 = 0x80;
pub const MESSAGE_ID_LEN: usize = 16;

/// Context key under which signed suites carry the verification key.
pub const PUBLIC_KEY_CONTEXT_KEY: &str = "aws-crypto-public-key";

/// One wrapped copy of the data key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDataKey {
    /// Keyring namespace the key was wrapped under.
    pub provider_id: String,
    /// Keyring-specific metadata; the key name for raw RSA keyrings.
    pub provider_info: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    SingleBlock,
    Framed,
}

/// Authentication tag over the serialized header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderAuth {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Parsed header, plus the exact bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    pub suite: AlgorithmSuite,
    pub message_id: [u8; MESSAGE_ID_LEN],
    pub encryption_context: BTreeMap<String, String>,
    pub encrypted_data_keys: Vec<EncryptedDataKey>,
    pub content_type: ContentType,
    pub frame_length: u32,
    /// Serialized header (version through frame length); the AAD of [`HeaderAuth`].
    pub raw: Vec<u8>,
}

impl MessageHeader {
    /// Parse the header and its authentication block.
    ///
    /// The suite is checked against `allow_list` as soon as its id is read, so
    /// a disallowed suite is reported even if the rest of the header is damaged.
    pub fn parse(
        r: &mut Reader<'_>,
        allow_list: &SuiteAllowList,
        max_encrypted_data_keys: usize,
    ) -> Result<(Self, HeaderAuth), EnvelopeError> {
        let start = r.position();

        let version = r.u8("version")?;
        if version == MESSAGE_FORMAT_V2 {
            // v2 puts the suite id right after the version; surface it so a
            // committing suite is reported as such.
            let id = r.u16("algorithm suite id")?;
            allow_list.check(id)?;
            return Err(EnvelopeError::UnsupportedVersion(version));
        }
        if version != MESSAGE_FORMAT_V1 {
            return Err(EnvelopeError::UnsupportedVersion(version));
        }
        let message_type = r.u8("message type")?;
        if message_type != CUSTOMER_AE_DATA {
            return Err(EnvelopeError::UnsupportedType(message_type));
        }

        let suite = allow_list.check(r.u16("algorithm suite id")?)?;
        let message_id = r.array::<MESSAGE_ID_LEN>("message id")?;
        let encryption_context = parse_encryption_context(r)?;
        let encrypted_data_keys = parse_encrypted_data_keys(r, max_encrypted_data_keys)?;

        let content_type = match r.u8("content type")? {
            0x01 => ContentType::SingleBlock,
            0x02 => ContentType::Framed,
            other => return Err(EnvelopeError::Invalid(format!("content type 0x{other:02X}"))),
        };
        if r.bytes(4, "reserved")? != [0u8; 4] {
            return Err(EnvelopeError::Invalid("reserved field is not zero".into()));
        }
        let iv_len = r.u8("iv length")?;
        if usize::from(iv_len) != IV_LEN {
            return Err(EnvelopeError::Invalid(format!("iv length {iv_len}")));
        }
        let frame_length = r.u32("frame length")?;
        match (content_type, frame_length) {
            (ContentType::SingleBlock, 0) => {}
            (ContentType::Framed, n) if n > 0 => {}
            _ => {
                return Err(EnvelopeError::Invalid(format!(
                    "frame length {frame_length} does not match content type"
                )))
            }
        }

        let raw = r.consumed_since(start).to_vec();
        let auth = HeaderAuth {
            iv: r.array::<IV_LEN>("header iv")?,
            tag: r.array::<TAG_LEN>("header tag")?,
        };

        Ok((
            Self {
                suite,
                message_id,
                encryption_context,
                encrypted_data_keys,
                content_type,
                frame_length,
                raw,
            },
            auth,
        ))
    }

    /// Data keys wrapped for the keyring `(namespace, key_name)`.
    pub fn data_keys_for<'a>(
        &'a self,
        namespace: &'a str,
        key_name: &'a str,
    ) -> impl Iterator<Item = &'a EncryptedDataKey> + 'a {
        self.encrypted_data_keys.iter().filter(move |edk| {
            edk.provider_id == namespace && edk.provider_info == key_name.as_bytes()
        })
    }
}

fn parse_encryption_context(r: &mut Reader<'_>) -> Result<BTreeMap<String, String>, EnvelopeError> {
    let section = r.u16_prefixed("encryption context")?;
    let mut context = BTreeMap::new();
    if section.is_empty() {
        return Ok(context);
    }

    let mut ec = Reader::new(section);
    let count = ec.u16("encryption context count")?;
    if count == 0 {
        return Err(EnvelopeError::Invalid(
            "non-empty encryption context section with zero entries".into(),
        ));
    }
    for _ in 0..count {
        let key = utf8(ec.u16_prefixed("encryption context key")?, "encryption context key")?;
        let value = utf8(
            ec.u16_prefixed("encryption context value")?,
            "encryption context value",
        )?;
        if context.insert(key, value).is_some() {
            return Err(EnvelopeError::Invalid("duplicate encryption context key".into()));
        }
    }
    if ec.remaining() != 0 {
        return Err(EnvelopeError::Invalid(
            "encryption context length does not match its entries".into(),
        ));
    }
    Ok(context)
}

fn parse_encrypted_data_keys(
    r: &mut Reader<'_>,
    max: usize,
) -> Result<Vec<EncryptedDataKey>, EnvelopeError> {
    let count = usize::from(r.u16("encrypted data key count")?);
    if count == 0 {
        return Err(EnvelopeError::Invalid("no encrypted data keys".into()));
    }
    if count > max {
        return Err(EnvelopeError::TooManyDataKeys { count, max });
    }
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(EncryptedDataKey {
            provider_id: utf8(r.u16_prefixed("key provider id")?, "key provider id")?,
            provider_info: r.u16_prefixed("key provider info")?.to_vec(),
            ciphertext: r.u16_prefixed("encrypted data key")?.to_vec(),
        });
    }
    Ok(keys)
}

fn utf8(bytes: &[u8], what: &'static str) -> Result<String, EnvelopeError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| EnvelopeError::Invalid(format!("{what} is not valid UTF-8")))
}
