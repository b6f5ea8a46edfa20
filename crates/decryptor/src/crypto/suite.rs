//! Algorithm suites of the legacy message format and the decrypt allow-list.
//!
//! Only suites on the [`SuiteAllowList`] are decrypted. The default list is the
//! nine non-committing suites the platform may still emit. Committing suites are
//! recognised so that errors can name them, but they live in message format v2
//! and are never accepted here.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Length of every AES-GCM IV used by the supported suites.
pub const IV_LEN: usize = 12;

/// Length of every AES-GCM authentication tag used by the supported suites.
pub const TAG_LEN: usize = 16;

/// Key derivation applied to the unwrapped data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    /// The data key is used as the content key.
    Identity,
    HkdfSha256,
    HkdfSha384,
    HkdfSha512,
}

/// Message signature carried in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    EcdsaP256Sha256,
    EcdsaP384Sha384,
}

/// Every suite id the decoder recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum AlgorithmSuite {
    Aes128GcmIv12Tag16NoKdf = 0x0014,
    Aes192GcmIv12Tag16NoKdf = 0x0046,
    Aes256GcmIv12Tag16NoKdf = 0x0078,
    Aes128GcmIv12Tag16HkdfSha256 = 0x0114,
    Aes192GcmIv12Tag16HkdfSha256 = 0x0146,
    Aes256GcmIv12Tag16HkdfSha256 = 0x0178,
    Aes128GcmIv12Tag16HkdfSha256EcdsaP256 = 0x0214,
    Aes192GcmIv12Tag16HkdfSha384EcdsaP384 = 0x0346,
    Aes256GcmIv12Tag16HkdfSha384EcdsaP384 = 0x0378,
    Aes256GcmHkdfSha512CommitKey = 0x0478,
    Aes256GcmHkdfSha512CommitKeyEcdsaP384 = 0x0578,
}

impl AlgorithmSuite {
    /// All recognised suites, in id order.
    pub const ALL: [AlgorithmSuite; 11] = [
        AlgorithmSuite::Aes128GcmIv12Tag16NoKdf,
        AlgorithmSuite::Aes192GcmIv12Tag16NoKdf,
        AlgorithmSuite::Aes256GcmIv12Tag16NoKdf,
        AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256,
        AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha256,
        AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256,
        AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256EcdsaP256,
        AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha384EcdsaP384,
        AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384,
        AlgorithmSuite::Aes256GcmHkdfSha512CommitKey,
        AlgorithmSuite::Aes256GcmHkdfSha512CommitKeyEcdsaP384,
    ];

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    /// Length of the data key, and of the derived content key.
    pub fn data_key_len(self) -> usize {
        match self {
            AlgorithmSuite::Aes128GcmIv12Tag16NoKdf
            | AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256
            | AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256EcdsaP256 => 16,
            AlgorithmSuite::Aes192GcmIv12Tag16NoKdf
            | AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha256
            | AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha384EcdsaP384 => 24,
            _ => 32,
        }
    }

    pub fn kdf(self) -> Kdf {
        match self {
            AlgorithmSuite::Aes128GcmIv12Tag16NoKdf
            | AlgorithmSuite::Aes192GcmIv12Tag16NoKdf
            | AlgorithmSuite::Aes256GcmIv12Tag16NoKdf => Kdf::Identity,
            AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256
            | AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha256
            | AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha256
            | AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256EcdsaP256 => Kdf::HkdfSha256,
            AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha384EcdsaP384
            | AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384 => Kdf::HkdfSha384,
            AlgorithmSuite::Aes256GcmHkdfSha512CommitKey
            | AlgorithmSuite::Aes256GcmHkdfSha512CommitKeyEcdsaP384 => Kdf::HkdfSha512,
        }
    }

    pub fn signature(self) -> Option<SignatureAlgorithm> {
        match self {
            AlgorithmSuite::Aes128GcmIv12Tag16HkdfSha256EcdsaP256 => {
                Some(SignatureAlgorithm::EcdsaP256Sha256)
            }
            AlgorithmSuite::Aes192GcmIv12Tag16HkdfSha384EcdsaP384
            | AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384
            | AlgorithmSuite::Aes256GcmHkdfSha512CommitKeyEcdsaP384 => {
                Some(SignatureAlgorithm::EcdsaP384Sha384)
            }
            _ => None,
        }
    }

    /// Whether the suite binds the ciphertext to a single data key.
    pub fn is_committing(self) -> bool {
        matches!(
            self,
            AlgorithmSuite::Aes256GcmHkdfSha512CommitKey
                | AlgorithmSuite::Aes256GcmHkdfSha512CommitKeyEcdsaP384
        )
    }
}

impl fmt::Display for AlgorithmSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.id())
    }
}

/// Errors produced while checking or configuring suites.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// The envelope names a suite that is unknown or not allowed.
    #[error("algorithm suite 0x{0:04X} is not accepted for decryption")]
    NotAllowed(u16),

    /// A configured entry is not a recognised suite id.
    #[error("unrecognised algorithm suite id {0:?}")]
    InvalidId(String),

    /// A configured entry names a suite this decrypt path cannot read.
    #[error("algorithm suite {0} requires message format v2 and cannot be allowed")]
    NotDecryptable(AlgorithmSuite),
}

/// The explicit set of suite ids accepted for decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteAllowList {
    suites: BTreeSet<AlgorithmSuite>,
}

impl SuiteAllowList {
    /// Every non-committing suite of message format v1.
    pub fn legacy_default() -> Self {
        Self {
            suites: AlgorithmSuite::ALL
                .into_iter()
                .filter(|s| !s.is_committing())
                .collect(),
        }
    }

    /// Parse a comma-separated list of hex ids (`0x0378,0178`).
    ///
    /// An empty or blank string yields [`SuiteAllowList::legacy_default`].
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::InvalidId`] for an unparsable or unknown id and
    /// [`SuiteError::NotDecryptable`] for a committing suite.
    pub fn parse(raw: &str) -> Result<Self, SuiteError> {
        if raw.trim().is_empty() {
            return Ok(Self::legacy_default());
        }
        let mut suites = BTreeSet::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let digits = entry
                .strip_prefix("0x")
                .or_else(|| entry.strip_prefix("0X"))
                .unwrap_or(entry);
            let suite = u16::from_str_radix(digits, 16)
                .ok()
                .and_then(AlgorithmSuite::from_id)
                .ok_or_else(|| SuiteError::InvalidId(entry.to_owned()))?;
            if suite.is_committing() {
                return Err(SuiteError::NotDecryptable(suite));
            }
            suites.insert(suite);
        }
        if suites.is_empty() {
            return Err(SuiteError::InvalidId(raw.to_owned()));
        }
        Ok(Self { suites })
    }

    /// Resolve an id read from an envelope header.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::NotAllowed`] if the id is unknown or not on the list.
    pub fn check(&self, id: u16) -> Result<AlgorithmSuite, SuiteError> {
        AlgorithmSuite::from_id(id)
            .filter(|s| self.suites.contains(s))
            .ok_or(SuiteError::NotAllowed(id))
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = AlgorithmSuite> + '_ {
        self.suites.iter().copied()
    }
}

impl Default for SuiteAllowList {
    fn default() -> Self {
        Self::legacy_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_is_the_nine_legacy_suites() {
        let list = SuiteAllowList::legacy_default();
        assert_eq!(list.len(), 9);
        assert!(list.iter().all(|s| !s.is_committing()));
        assert!(list.check(0x0378).is_ok());
        assert!(list.check(0x0014).is_ok());
    }

    #[test]
    fn committing_and_unknown_ids_are_rejected() {
        let list = SuiteAllowList::legacy_default();
        assert!(matches!(list.check(0x0478), Err(SuiteError::NotAllowed(0x0478))));
        assert!(matches!(list.check(0x0578), Err(SuiteError::NotAllowed(_))));
        assert!(matches!(list.check(0x1234), Err(SuiteError::NotAllowed(_))));
    }

    #[test]
    fn narrowed_list_excludes_others() {
        let list = SuiteAllowList::parse("0x0378").unwrap();
        assert!(list.check(0x0378).is_ok());
        assert!(list.check(0x0178).is_err());
    }

    #[test]
    fn parse_accepts_bare_and_prefixed_hex() {
        let list = SuiteAllowList::parse(" 0178 ,0X0214,").unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.check(0x0214).is_ok());
    }

    #[test]
    fn parse_blank_is_default() {
        assert_eq!(SuiteAllowList::parse("  ").unwrap(), SuiteAllowList::legacy_default());
    }

    #[test]
    fn parse_rejects_committing_suite() {
        assert!(matches!(
            SuiteAllowList::parse("0x0478"),
            Err(SuiteError::NotDecryptable(_))
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(SuiteAllowList::parse("aes256").is_err());
        assert!(SuiteAllowList::parse(",,").is_err());
    }

    #[test]
    fn suite_properties() {
        let s = AlgorithmSuite::Aes256GcmIv12Tag16HkdfSha384EcdsaP384;
        assert_eq!(s.data_key_len(), 32);
        assert_eq!(s.kdf(), Kdf::HkdfSha384);
        assert_eq!(s.signature(), Some(SignatureAlgorithm::EcdsaP384Sha384));
        assert_eq!(s.to_string(), "0x0378");

        let s = AlgorithmSuite::Aes192GcmIv12Tag16NoKdf;
        assert_eq!(s.data_key_len(), 24);
        assert_eq!(s.kdf(), Kdf::Identity);
        assert_eq!(s.signature(), None);
    }
}
