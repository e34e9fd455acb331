//! # Wallet error types
//!
//! This module defines [`WalletError`], the closed set of error kinds the
//! pure-function layers (crypto, codec, merge) raise, plus small context
//! structs that keep enough structure for logging and for serialization over
//! the wire. Display strings are human-readable; callers that need
//! programmatic matching should match on the enum variants, not the message.
//!
//! Orchestration layers (sync engine, identity controller) wrap these in
//! `anyhow::Error` at their own public boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Context for a backup/codec detection failure (which format, why).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FormatError {
    format: String,
    reason: String,
}

impl FormatError {
    pub fn new(format: impl Into<String>, reason: impl Into<String>) -> Self {
        FormatError {
            format: format.into(),
            reason: reason.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Context for a failed external-collaborator call (which provider, why).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProviderError {
    provider: String,
    reason: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        ProviderError {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error for the wallet core.
///
/// Variants mirror the closed set of error kinds in the design document
/// (§7): each is raised by exactly one layer and propagates unchanged out of
/// pure functions (crypto, codec, merge). Orchestration layers may recover
/// from some of these locally (e.g. a nametag re-sync failure is logged, not
/// fatal) rather than propagating them.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WalletError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("unknown derivation path: {0}")]
    UnknownPath(String),

    #[error("wallet already exists")]
    WalletExists,

    #[error("wallet is missing")]
    WalletMissing,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("password required for encrypted wallet")]
    NeedsPassword,

    #[error("unknown wallet file format: {0:?}")]
    UnknownFileFormat(FormatError),

    #[error("invalid nametag: {0}")]
    InvalidNametag(String),

    #[error("nametag already taken: {0}")]
    NametagTaken(String),

    #[error("core not initialised")]
    NotInitialised,

    #[error("provider unavailable: {0:?}")]
    ProviderUnavailable(ProviderError),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl WalletError {
    pub fn invalid_mnemonic(reason: impl Into<String>) -> Self {
        Self::InvalidMnemonic(reason.into())
    }

    pub fn invalid_key_material(reason: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(reason.into())
    }

    pub fn unknown_path(path: impl Into<String>) -> Self {
        Self::UnknownPath(path.into())
    }

    pub fn decryption_failed(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed(reason.into())
    }

    pub fn unknown_file_format(reason: impl Into<String>) -> Self {
        Self::UnknownFileFormat(FormatError::new("unknown", reason))
    }

    pub fn invalid_nametag(name: impl Into<String>) -> Self {
        Self::InvalidNametag(name.into())
    }

    pub fn provider_unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable(ProviderError::new(provider, reason))
    }

    pub fn integrity_violation(reason: impl Into<String>) -> Self {
        Self::IntegrityViolation(reason.into())
    }
}
