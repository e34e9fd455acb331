//! # Key vault (C2)
//!
//! Two encrypted-envelope formats over AES-256-CBC with a PBKDF2-derived
//! key, both backed by `openssl::symm`/`openssl::pkcs5`, reusing the same
//! crypto dependency the rest of the crate already carries rather than
//! adding a second one for overlapping concerns.

use base64::Engine;
use openssl::pkcs5::pbkdf2_hmac;
use openssl::rand::rand_bytes;
use openssl::symm::{Cipher, Crypter, Mode};
use serde::{Deserialize, Serialize};

use crate::constants::{AES_256_KEY_LEN, ENVELOPE_IV_LEN, ENVELOPE_SALT_LEN};
use crate::errors::WalletError;

/// `{ ciphertext, iv, salt, algorithm, kdf, iterations }` (spec.md §4.2 "Structured envelope").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub algorithm: String,
    pub kdf: String,
    pub iterations: u32,
}

/// Recognise a structured envelope only when every field is present with the
/// exact `algorithm`/`kdf` tags and a numeric `iterations`.
pub fn is_encrypted_data(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let has_strings = ["ciphertext", "iv", "salt"]
        .iter()
        .all(|k| obj.get(*k).and_then(|v| v.as_str()).is_some());

    let algorithm_ok = obj.get("algorithm").and_then(|v| v.as_str()) == Some("aes-256-cbc");
    let kdf_ok = obj.get("kdf").and_then(|v| v.as_str()) == Some("pbkdf2");
    let iterations_ok = obj.get("iterations").and_then(|v| v.as_u64()).is_some();

    has_strings && algorithm_ok && kdf_ok && iterations_ok
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<Vec<u8>, WalletError> {
    let mut key = vec![0u8; AES_256_KEY_LEN];
    pbkdf2_hmac(
        password.as_bytes(),
        salt,
        iterations as usize,
        openssl::hash::MessageDigest::sha256(),
        &mut key,
    )
    .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    Ok(key)
}

/// Encrypt `plaintext` under `password` into a structured JSON envelope.
///
/// `iv` and `salt` are freshly random on every call, so identical inputs
/// never produce identical ciphertext (spec.md §4.2 requirement (a)).
pub fn encrypt(
    plaintext: &[u8],
    password: &str,
    iterations: u32,
) -> Result<EncryptedEnvelope, WalletError> {
    let mut salt = vec![0u8; ENVELOPE_SALT_LEN];
    let mut iv = vec![0u8; ENVELOPE_IV_LEN];
    rand_bytes(&mut salt).map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    rand_bytes(&mut iv).map_err(|e| WalletError::invalid_key_material(e.to_string()))?;

    let key = derive_key(password, &salt, iterations)?;
    let ciphertext = aes_256_cbc_encrypt(plaintext, &key, &iv)?;

    Ok(EncryptedEnvelope {
        ciphertext: base64::engine::general_purpose::STANDARD.encode(ciphertext),
        iv: hex::encode(&iv),
        salt: hex::encode(&salt),
        algorithm: "aes-256-cbc".to_string(),
        kdf: "pbkdf2".to_string(),
        iterations,
    })
}

/// Decrypt a structured envelope with `password`.
///
/// A tampered ciphertext or wrong password surfaces as
/// [`WalletError::DecryptionFailed`] (padding rejection). Per the documented
/// "silent garbage" caveat (spec.md §9), callers must not assume every wrong
/// password fails loudly across every implementation; this Rust port does
/// fail loudly because OpenSSL validates PKCS#7 padding.
pub fn decrypt(envelope: &EncryptedEnvelope, password: &str) -> Result<Vec<u8>, WalletError> {
    let salt = hex::decode(&envelope.salt)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    let iv =
        hex::decode(&envelope.iv).map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    let key = derive_key(password, &salt, envelope.iterations)?;
    aes_256_cbc_decrypt(&ciphertext, &key, &iv)
}

fn aes_256_cbc_encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, WalletError> {
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, Mode::Encrypt, key, Some(iv))
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;

    let mut out = vec![0u8; plaintext.len() + cipher.block_size()];
    let mut count = crypter
        .update(plaintext, &mut out)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    count += crypter
        .finalize(&mut out[count..])
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    out.truncate(count);
    Ok(out)
}

fn aes_256_cbc_decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, WalletError> {
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, Mode::Decrypt, key, Some(iv))
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;

    let mut out = vec![0u8; ciphertext.len() + cipher.block_size()];
    let mut count = crypter
        .update(ciphertext, &mut out)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    count += crypter
        .finalize(&mut out[count..])
        .map_err(|_| WalletError::decryption_failed("incorrect password or corrupt ciphertext"))?;
    out.truncate(count);
    Ok(out)
}

/// Opaque single-string envelope for at-rest seed/master-key storage
/// (`encryptSimple`). Internally this is `salt || iv || ciphertext`,
/// hex-encoded as one string; the exact layout is a crate-local
/// implementation detail, not a wire contract (spec.md §4.2 "Opaque envelope").
pub fn encrypt_simple(plaintext: &[u8], password: &str) -> Result<String, WalletError> {
    let envelope = encrypt(plaintext, password, crate::constants::DEFAULT_ENVELOPE_ITERATIONS)?;
    let packed = serde_json::to_vec(&envelope)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    Ok(hex::encode(packed))
}

/// Decrypt a value produced by [`encrypt_simple`].
pub fn decrypt_simple(packed: &str, password: &str) -> Result<Vec<u8>, WalletError> {
    let bytes =
        hex::decode(packed).map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    let envelope: EncryptedEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| WalletError::decryption_failed(e.to_string()))?;
    decrypt(&envelope, password)
}
