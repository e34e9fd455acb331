//! # `.txt` backup envelope (UNICITY WALLET DETAILS)
//!
//! A line-oriented legacy format: each field is a line of the form
//! `LABEL: value`, matched by exact prefix (spec.md §4.6, §6.2). The
//! encrypted variant layers PBKDF2-HMAC-SHA1 with a fixed salt over AES,
//! separate from the structured envelope in [`crate::vault`] (that one is
//! PBKDF2-HMAC-SHA256 with a random salt) — this format predates it and is
//! read-only here, never written.

use base64::Engine;
use openssl::pkcs5::pbkdf2_hmac;
use openssl::symm::{Cipher, Crypter, Mode};
use serde::{Deserialize, Serialize};

use crate::constants::{TEXT_BACKUP_DEFAULT_PATH, TEXT_BACKUP_ITERATIONS, TEXT_BACKUP_SALT};
use crate::errors::WalletError;

const MARKER: &str = "UNICITY WALLET DETAILS";
const MASTER_KEY_LABEL: &str = "MASTER PRIVATE KEY (keep secret!)";
const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED MASTER KEY (password protected)";
const CHAIN_CODE_LABEL: &str = "MASTER CHAIN CODE";
const DESCRIPTOR_PATH_LABEL: &str = "DESCRIPTOR PATH";

/// Parsed `.txt` backup contents, before any password is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextBackup {
    pub master_key_hex: Option<String>,
    pub encrypted_master_key_b64: Option<String>,
    pub chain_code_hex: Option<String>,
    pub descriptor_path: String,
}

/// The fields recovered once a `.txt` backup's encryption (if any) has been
/// removed: `derivationMode` is `bip32` iff a chain code is present,
/// otherwise `wif_hmac` (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedTextBackup {
    pub master_key: Vec<u8>,
    pub chain_code: Option<Vec<u8>>,
    pub descriptor_path: String,
    pub derivation_mode: String,
}

/// True if `content` includes the `UNICITY WALLET DETAILS` marker and one
/// of the two key lines (spec.md §4.6 detection rule).
pub fn looks_like_text_backup(content: &str) -> bool {
    content.contains(MARKER)
        && (content.contains(MASTER_KEY_LABEL) || content.contains(ENCRYPTED_KEY_LABEL))
}

fn field(content: &str, label: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (prefix, value) = line.split_once(':')?;
        if prefix.trim() == label {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Parse the line-oriented envelope without touching encrypted key material.
pub fn parse(content: &str) -> Result<TextBackup, WalletError> {
    if !looks_like_text_backup(content) {
        return Err(WalletError::unknown_file_format("missing UNICITY WALLET DETAILS marker"));
    }

    let master_key_hex = field(content, MASTER_KEY_LABEL);
    let encrypted_master_key_b64 = field(content, ENCRYPTED_KEY_LABEL);
    if master_key_hex.is_none() && encrypted_master_key_b64.is_none() {
        return Err(WalletError::unknown_file_format("no master key line found"));
    }

    let chain_code_hex = field(content, CHAIN_CODE_LABEL);
    let descriptor_path = field(content, DESCRIPTOR_PATH_LABEL)
        .unwrap_or_else(|| TEXT_BACKUP_DEFAULT_PATH.to_string());

    Ok(TextBackup {
        master_key_hex,
        encrypted_master_key_b64,
        chain_code_hex,
        descriptor_path,
    })
}

fn derivation_mode(chain_code: &Option<Vec<u8>>) -> String {
    if chain_code.is_some() {
        "bip32".to_string()
    } else {
        "wif_hmac".to_string()
    }
}

/// Resolve a parsed backup into raw key material, decrypting the encrypted
/// variant with `password` when present.
///
/// Returns [`WalletError::NeedsPassword`] when the backup is encrypted and
/// no password was supplied.
pub fn resolve(backup: &TextBackup, password: Option<&str>) -> Result<ResolvedTextBackup, WalletError> {
    let chain_code = backup
        .chain_code_hex
        .as_deref()
        .map(hex::decode)
        .transpose()
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    let master_key = if let Some(hex_key) = &backup.master_key_hex {
        hex::decode(hex_key).map_err(|e| WalletError::decryption_failed(e.to_string()))?
    } else {
        let Some(b64) = &backup.encrypted_master_key_b64 else {
            return Err(WalletError::unknown_file_format("no master key present"));
        };
        let Some(password) = password else {
            return Err(WalletError::NeedsPassword);
        };
        decrypt_legacy(b64, password)?
    };

    Ok(ResolvedTextBackup {
        master_key,
        derivation_mode: derivation_mode(&chain_code),
        chain_code,
        descriptor_path: backup.descriptor_path.clone(),
    })
}

fn decrypt_legacy(base64_ciphertext: &str, password: &str) -> Result<Vec<u8>, WalletError> {
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(base64_ciphertext)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    let mut key = vec![0u8; 32];
    pbkdf2_hmac(
        password.as_bytes(),
        TEXT_BACKUP_SALT.as_bytes(),
        TEXT_BACKUP_ITERATIONS as usize,
        openssl::hash::MessageDigest::sha1(),
        &mut key,
    )
    .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    // No separate IV is stored for this legacy format; it uses a
    // zero IV, matching the source's fixed-salt/no-IV scheme.
    let iv = [0u8; 16];
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, Mode::Decrypt, &key, Some(&iv))
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    let mut out = vec![0u8; ciphertext.len() + cipher.block_size()];
    let mut count = crypter
        .update(&ciphertext, &mut out)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    count += crypter
        .finalize(&mut out[count..])
        .map_err(|_| WalletError::decryption_failed("incorrect password"))?;
    out.truncate(count);
    Ok(out)
}

/// Encrypt `master_key` the same way an exported `.txt` backup would, for
/// tests and for any caller that needs to produce one (spec.md §8 S4).
pub fn encrypt_legacy(master_key: &[u8], password: &str) -> Result<String, WalletError> {
    let mut key = vec![0u8; 32];
    pbkdf2_hmac(
        password.as_bytes(),
        TEXT_BACKUP_SALT.as_bytes(),
        TEXT_BACKUP_ITERATIONS as usize,
        openssl::hash::MessageDigest::sha1(),
        &mut key,
    )
    .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;

    let iv = [0u8; 16];
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, Mode::Encrypt, &key, Some(&iv))
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;

    let mut out = vec![0u8; master_key.len() + cipher.block_size()];
    let mut count = crypter
        .update(master_key, &mut out)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    count += crypter
        .finalize(&mut out[count..])
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    out.truncate(count);

    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_KEY_HEX: &str = "1122334455667788990011223344556677889900112233445566778899aabb";

    fn plaintext_backup() -> String {
        format!(
            "UNICITY WALLET DETAILS\n{MASTER_KEY_LABEL}: {MASTER_KEY_HEX}\n{CHAIN_CODE_LABEL}: {}\n",
            "00".repeat(32)
        )
    }

    #[test]
    fn detects_marker_and_plaintext_key() {
        let content = plaintext_backup();
        assert!(looks_like_text_backup(&content));
        let parsed = parse(&content).unwrap();
        assert_eq!(parsed.master_key_hex.as_deref(), Some(MASTER_KEY_HEX));
    }

    #[test]
    fn resolves_plaintext_with_bip32_mode() {
        let parsed = parse(&plaintext_backup()).unwrap();
        let resolved = resolve(&parsed, None).unwrap();
        assert_eq!(hex::encode(&resolved.master_key), MASTER_KEY_HEX);
        assert_eq!(resolved.derivation_mode, "bip32");
    }

    #[test]
    fn defaults_descriptor_path_when_absent() {
        let parsed = parse(&plaintext_backup()).unwrap();
        assert_eq!(parsed.descriptor_path, TEXT_BACKUP_DEFAULT_PATH);
    }

    #[test]
    fn missing_chain_code_is_wif_hmac_mode() {
        let content = format!("UNICITY WALLET DETAILS\n{MASTER_KEY_LABEL}: {MASTER_KEY_HEX}\n");
        let parsed = parse(&content).unwrap();
        let resolved = resolve(&parsed, None).unwrap();
        assert!(resolved.chain_code.is_none());
        assert_eq!(resolved.derivation_mode, "wif_hmac");
    }

    /// spec.md §8 S4: export with "secret", wrong password fails, correct
    /// password recovers the original master key.
    #[test]
    fn s4_encrypted_round_trip_and_wrong_password() {
        let master_key = hex::decode(MASTER_KEY_HEX).unwrap();
        let ciphertext_b64 = encrypt_legacy(&master_key, "secret").unwrap();
        let content = format!("UNICITY WALLET DETAILS\n{ENCRYPTED_KEY_LABEL}: {ciphertext_b64}\n");

        let parsed = parse(&content).unwrap();
        assert!(matches!(resolve(&parsed, None), Err(WalletError::NeedsPassword)));

        match resolve(&parsed, Some("nope")) {
            Err(_) => {}
            Ok(resolved) => assert_ne!(resolved.master_key, master_key),
        }

        let resolved = resolve(&parsed, Some("secret")).unwrap();
        assert_eq!(resolved.master_key, master_key);
    }

    #[test]
    fn rejects_content_without_marker() {
        assert!(!looks_like_text_backup("just some random text"));
        assert!(parse("just some random text").is_err());
    }
}
