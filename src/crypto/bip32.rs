//! # BIP32 master/child key derivation
//!
//! HMAC-SHA512 master-key split and child derivation are hand-rolled over
//! `hmac` + `sha2` plus `libsecp256k1` for the scalar tweak-add; no
//! ready-made BIP32 crate is pulled in, so this is the one primitive built
//! from smaller parts rather than a single crate (see DESIGN.md).

use hmac::{Hmac, Mac};
use libsecp256k1::{PublicKey, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::WalletError;

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

/// `{ privateKey: 32B, chainCode: 32B }` (spec.md §3.1 "Master key").
///
/// `Drop` zeroizes the private key; `Debug` never prints key material.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey {
    private_key: [u8; 32],
    #[zeroize(skip)]
    chain_code: [u8; 32],
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("private_key", &"<redacted>")
            .field("chain_code", &hex::encode(self.chain_code))
            .finish()
    }
}

impl MasterKey {
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Construct from raw bytes, validating the scalar is a member of the
    /// secp256k1 group (non-zero, below curve order).
    pub fn from_parts(private_key: [u8; 32], chain_code: [u8; 32]) -> Result<Self, WalletError> {
        SecretKey::parse(&private_key)
            .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
        Ok(MasterKey {
            private_key,
            chain_code,
        })
    }

    fn secret_key(&self) -> Result<SecretKey, WalletError> {
        SecretKey::parse(&self.private_key)
            .map_err(|e| WalletError::invalid_key_material(e.to_string()))
    }

    pub fn public_key(&self) -> Result<[u8; 33], WalletError> {
        let sk = self.secret_key()?;
        Ok(PublicKey::from_secret_key(&sk).serialize_compressed())
    }
}

/// `{ privateKey, publicKey, address, path, index }` (spec.md §3.1 "Derived address").
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedAddress {
    private_key: [u8; 32],
    #[zeroize(skip)]
    public_key: [u8; 33],
    #[zeroize(skip)]
    pub address: String,
    #[zeroize(skip)]
    pub path: String,
    #[zeroize(skip)]
    pub index: u32,
}

impl std::fmt::Debug for DerivedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedAddress")
            .field("private_key", &"<redacted>")
            .field("public_key", &hex::encode(self.public_key))
            .field("address", &self.address)
            .field("path", &self.path)
            .field("index", &self.index)
            .finish()
    }
}

impl DerivedAddress {
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }
}

/// Produce the master key from a seed via HMAC-SHA512 with key `"Bitcoin seed"`.
pub fn master_from_seed(seed: &[u8]) -> Result<MasterKey, WalletError> {
    let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
        .expect("HMAC accepts keys of any length");
    mac.update(seed);
    let result = mac.finalize().into_bytes();

    let mut private_key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    private_key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);

    let master = MasterKey::from_parts(private_key, chain_code);
    private_key.zeroize();
    master
}

/// Standard BIP32 child derivation, hardened (`index >= 2^31`) or non-hardened.
pub fn derive_child(parent: &MasterKey, index: u32) -> Result<MasterKey, WalletError> {
    let hardened = index >= HARDENED_OFFSET;

    let mut mac = HmacSha512::new_from_slice(&parent.chain_code)
        .expect("HMAC accepts keys of any length");

    if hardened {
        mac.update(&[0u8]);
        mac.update(&parent.private_key);
    } else {
        mac.update(&parent.public_key()?);
    }
    mac.update(&index.to_be_bytes());

    let result = mac.finalize().into_bytes();
    let (il, ir) = result.split_at(32);

    let tweak = SecretKey::parse_slice(il)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    let mut child_secret = parent.secret_key()?;
    child_secret
        .tweak_add_assign(&tweak)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;

    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(ir);

    MasterKey::from_parts(child_secret.serialize(), child_chain_code)
}

/// `getPublicKey(privateKey, compressed=true) -> 33B or 65B` (spec.md §4.1).
/// Standalone form over a raw scalar, independent of a [`MasterKey`], for
/// callers that only hold key bytes (e.g. a recovered wallet-file import).
pub fn get_public_key(private_key: &[u8; 32], compressed: bool) -> Result<Vec<u8>, WalletError> {
    let sk = SecretKey::parse(private_key)
        .map_err(|e| WalletError::invalid_key_material(e.to_string()))?;
    let pk = PublicKey::from_secret_key(&sk);
    Ok(if compressed {
        pk.serialize_compressed().to_vec()
    } else {
        pk.serialize().to_vec()
    })
}

/// Parse a path of the form `m/(a|a')(/b|/b')*`. Apostrophe and `h` are
/// equivalent hardened markers; the `m/` root is case-insensitive.
fn parse_path(path: &str) -> Result<Vec<u32>, WalletError> {
    let trimmed = path.trim();
    let rest = trimmed
        .strip_prefix("m/")
        .or_else(|| trimmed.strip_prefix("M/"))
        .ok_or_else(|| WalletError::unknown_path(path))?;

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    rest.split('/')
        .map(|segment| {
            let (digits, hardened) = if let Some(d) = segment.strip_suffix('\'') {
                (d, true)
            } else if let Some(d) = segment.strip_suffix(['h', 'H']) {
                (d, true)
            } else {
                (segment, false)
            };

            let n: u32 = digits
                .parse()
                .map_err(|_| WalletError::unknown_path(path))?;

            if n >= HARDENED_OFFSET {
                return Err(WalletError::unknown_path(path));
            }

            Ok(if hardened { n + HARDENED_OFFSET } else { n })
        })
        .collect()
}

/// Derive the key at `path` from `root`, left-to-right.
///
/// `derive_at_path(derive_at_path(root, p), q) = derive_at_path(root, p·q)`
/// for any concatenable paths `p`, `q` (spec.md §8 invariant 2).
pub fn derive_at_path(root: &MasterKey, path: &str) -> Result<MasterKey, WalletError> {
    let indices = parse_path(path)?;
    indices
        .into_iter()
        .try_fold(root.clone(), |key, index| derive_child(&key, index))
}

/// Derive the address at `base_path/{0=receiving|1=change}/index`.
///
/// `path` on the returned [`DerivedAddress`] is the full path, e.g.
/// `m/44'/0'/0'/0/7`.
pub fn derive_address(
    root: &MasterKey,
    base_path: &str,
    is_change: bool,
    index: u32,
    address_prefix: &str,
) -> Result<DerivedAddress, WalletError> {
    let chain = if is_change { 1 } else { 0 };
    let full_path = format!("{base_path}/{chain}/{index}");

    let key = derive_at_path(root, &full_path)?;
    let public_key = key.public_key()?;
    let address = crate::crypto::address::public_key_to_address(&public_key, address_prefix)?;

    Ok(DerivedAddress {
        private_key: *key.private_key(),
        public_key,
        address,
        path: full_path,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::mnemonic::mnemonic_to_seed;

    const TREZOR_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn path_homomorphism() {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();

        let direct = derive_at_path(&root, "m/44'/0'/0'/0/7").unwrap();

        let step1 = derive_at_path(&root, "m/44'/0'/0'").unwrap();
        let stepwise = derive_at_path(&step1, "m/0/7").unwrap();

        assert_eq!(direct.private_key(), stepwise.private_key());
        assert_eq!(direct.chain_code(), stepwise.chain_code());
    }

    #[test]
    fn hardened_apostrophe_and_h_are_equivalent() {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();

        let apostrophe = derive_at_path(&root, "m/44'/0'/0'").unwrap();
        let h_marker = derive_at_path(&root, "m/44h/0h/0h").unwrap();

        assert_eq!(apostrophe.private_key(), h_marker.private_key());
    }

    #[test]
    fn rejects_malformed_path() {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();

        assert!(derive_at_path(&root, "44'/0'/0'").is_err());
        assert!(derive_at_path(&root, "m/abc").is_err());
    }

    #[test]
    fn s1_derivation_round_trip() {
        // spec.md §8 S1: default receiving address at index 0 starts with "alpha1".
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();
        let addr = derive_address(&root, "m/44'/0'/0'", false, 0, "alpha").unwrap();
        assert_eq!(addr.path, "m/44'/0'/0'/0/0");
        assert!(addr.address.starts_with("alpha1"));
    }

    #[test]
    fn empty_path_returns_root() {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();
        let same = derive_at_path(&root, "m/").unwrap();
        assert_eq!(root.private_key(), same.private_key());
    }

    #[test]
    fn get_public_key_compressed_and_uncompressed_agree() {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();

        let compressed = get_public_key(root.private_key(), true).unwrap();
        let uncompressed = get_public_key(root.private_key(), false).unwrap();

        assert_eq!(compressed.len(), 33);
        assert_eq!(uncompressed.len(), 65);
        assert_eq!(compressed, root.public_key().unwrap());
    }
}
