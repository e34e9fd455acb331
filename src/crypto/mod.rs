//! # Crypto primitives (C1)
//!
//! BIP39 mnemonic/seed handling, BIP32 master/child key derivation, and
//! address encoding. Every operation here is a pure function over its
//! arguments: no I/O, no shared state, deterministic given the same inputs
//! (spec.md §3.3 invariant 7 "derivation totality").

pub mod address;
pub mod bip32;
pub mod mnemonic;

pub use address::{double_sha256, hash160, public_key_to_address, ripemd160, sha256};
pub use bip32::{
    derive_address, derive_at_path, derive_child, get_public_key, master_from_seed,
    DerivedAddress, MasterKey,
};
pub use mnemonic::{
    entropy_to_mnemonic, generate_mnemonic, mnemonic_to_entropy, mnemonic_to_seed,
    validate_mnemonic,
};
