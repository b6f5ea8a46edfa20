//! Decrypt-only implementation of the legacy (version 1) envelope format.
//!
//! This module is free of AWS and HTTP dependencies. Decryption is two-stage:
//!
//! 1. [`keyring::RawRsaKeyring`] unwraps the per-message data key with
//!    RSA-OAEP (SHA-512 hash and MGF1).
//! 2. [`envelope::EnvelopeCodec`] derives the content key, verifies the header
//!    tag, decrypts every frame and checks the footer signature.
//!
//! # Layout
//!
//! ```text
//! header | header iv + tag | body (single block or frames) | footer (signed suites)
//! ```
//!
//! Which suites are accepted is decided by [`suite::SuiteAllowList`] alone.

pub mod body;
pub mod cipher;
pub mod envelope;
pub mod header;
pub mod keyring;
pub mod reader;
pub mod signature;
pub mod suite;

#[cfg(test)]
pub mod testing;

pub use envelope::{Envelope, EnvelopeCodec, EnvelopeError};
pub use keyring::{DataKey, KeyringError, RawRsaKeyring};
pub use suite::{AlgorithmSuite, SuiteAllowList};
