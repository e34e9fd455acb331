//! # Hashing and address encoding
//!
//! `sha256`/`ripemd160`/`hash160`/`double_sha256` wrap the `sha2`/`ripemd`
//! crates. `public_key_to_address` bech32-encodes `hash160(pubkey)` behind a
//! witness version byte via `bech32::encode(hrp, data.to_base32(),
//! Variant::Bech32)`.

use bech32::{ToBase32, Variant};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::errors::WalletError;

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 applied twice (Bitcoin-style double hash).
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 digest of `data`.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `ripemd160(sha256(data))`, the standard public-key-to-pubkey-hash chain.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Encode `hash160(public_key)` as a bech32 address under `prefix`, with an
/// explicit witness version of 0 (spec.md §3.1 "Derived address").
pub fn public_key_to_address(public_key: &[u8], prefix: &str) -> Result<String, WalletError> {
    let program = hash160(public_key);

    let mut data = vec![bech32::u5::try_from_u8(0)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?];
    data.extend(program.to_base32());

    bech32::encode(prefix, data, Variant::Bech32)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let digest = sha256(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash160_is_ripemd_of_sha256() {
        let data = b"hello world";
        let expected = ripemd160(&sha256(data));
        assert_eq!(hash160(data), expected);
    }

    #[test]
    fn address_has_expected_prefix() {
        let pubkey = [2u8; 33];
        let addr = public_key_to_address(&pubkey, "alpha").unwrap();
        assert!(addr.starts_with("alpha1"));
    }
}
