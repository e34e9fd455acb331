//! # BIP39 mnemonic ↔ seed ↔ entropy
//!
//! Thin wrapper over the `bip39` crate: mnemonic generation, validation,
//! and seed/entropy conversion in one place.

use bip39::{Language, Mnemonic};

use crate::errors::WalletError;

/// Generate a fresh mnemonic from a cryptographically secure RNG.
///
/// `strength` must be 128 (12 words) or 256 (24 words) bits of entropy.
pub fn generate_mnemonic(strength: usize) -> Result<String, WalletError> {
    let word_count = match strength {
        128 => 12,
        256 => 24,
        other => {
            return Err(WalletError::invalid_mnemonic(format!(
                "unsupported entropy strength: {other} (expected 128 or 256)"
            )))
        }
    };

    let mnemonic = Mnemonic::generate_in(Language::English, word_count)
        .map_err(|e| WalletError::invalid_mnemonic(e.to_string()))?;

    Ok(mnemonic.to_string())
}

/// Validate wordlist membership and the BIP39 checksum for `phrase`.
pub fn validate_mnemonic(phrase: &str) -> bool {
    let word_count = phrase.split_whitespace().count();
    if word_count != 12 && word_count != 24 {
        return false;
    }

    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive the 64-byte BIP39 seed via PBKDF2-HMAC-SHA512, 2048 iterations,
/// salt = `"mnemonic" + passphrase` (delegated to the `bip39` crate).
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<[u8; 64], WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::invalid_mnemonic(e.to_string()))?;

    Ok(mnemonic.to_seed(passphrase))
}

/// Recover the raw entropy bytes backing a mnemonic.
pub fn mnemonic_to_entropy(phrase: &str) -> Result<Vec<u8>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::invalid_mnemonic(e.to_string()))?;

    Ok(mnemonic.to_entropy())
}

/// Reconstruct the mnemonic phrase for a given entropy buffer (16 or 32 bytes).
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<String, WalletError> {
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| WalletError::invalid_mnemonic(e.to_string()))?;

    Ok(mnemonic.to_string())
}
