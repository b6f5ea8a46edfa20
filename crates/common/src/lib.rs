//! Failure taxonomy and platform wire types shared across the decryption service crates.

pub mod error;
pub mod protocol;

pub use error::{DecryptionFailure, FailureKind};
