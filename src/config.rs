//! # Wallet configuration
//!
//! A small, typed configuration wrapper with a safe [`Default`] — callers
//! override only the knobs they care about rather than threading scattered
//! constants through every call site. Values that are fixed by protocol
//! (not meant to be tuned by a caller) live in [`crate::constants`] instead.

use std::time::Duration;

use crate::constants::{
    DEFAULT_ADDRESS_PREFIX, DEFAULT_BASE_PATH, DEFAULT_CONCURRENCY, DEFAULT_ENVELOPE_ITERATIONS,
    DEFAULT_SYNC_DEBOUNCE_MS,
};

/// Tunable parameters for a wallet instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Bech32 human-readable prefix used when encoding addresses.
    pub address_prefix: String,
    /// Base BIP32 path new addresses are derived under (e.g. `m/44'/0'/0'`).
    pub base_path: String,
    /// PBKDF2-HMAC-SHA256 iteration count for the structured JSON envelope (§4.2).
    pub envelope_iterations: u32,
    /// Debounce window the sync engine waits before flushing a dirty store.
    pub sync_debounce: Duration,
    /// Cap on concurrent in-flight operations (remote syncs, outbox submissions).
    pub concurrency_limit: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            address_prefix: DEFAULT_ADDRESS_PREFIX.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            envelope_iterations: DEFAULT_ENVELOPE_ITERATIONS,
            sync_debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            concurrency_limit: DEFAULT_CONCURRENCY,
        }
    }
}

impl WalletConfig {
    pub fn with_address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.address_prefix = prefix.into();
        self
    }

    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_sync_debounce(mut self, debounce: Duration) -> Self {
        self.sync_debounce = debounce;
        self
    }
}
