//! # sphere_wallet
//!
//! Client-side token-inventory wallet core: TXF data model, content-addressed
//! multi-device merge with tombstones, HD key derivation, wallet-file codecs,
//! and the sync/identity orchestration that ties them together.
//!
//! The crate is organised by subsystem: crypto primitives, key vault, TXF model/codec,
//! token store, wallet-file codec, multi-device merge, sync engine, and
//! identity controller, plus the collaborator contracts external callers
//! implement (local storage, remote store, transport, oracle).
//!
//! Pure-function layers (`crypto`, `txf`, `merge`, `vault`, `walletfile`)
//! return `Result<T, WalletError>` directly. Orchestration layers (`sync`,
//! `identity`) are constructed around those and are expected to be wrapped
//! in `anyhow::Result` at a caller's own public boundary.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod errors;
pub mod events;
pub mod identity;
pub mod merge;
pub mod providers;
pub mod store;
pub mod sync;
pub mod txf;
pub mod vault;
pub mod walletfile;

pub use config::WalletConfig;
pub use errors::WalletError;
pub use events::{EventBus, WalletEvent};
pub use identity::{Identity, IdentityController};
pub use merge::MergeOutcome;
pub use store::TokenStore;
pub use sync::{SyncEngine, SyncState};

use crypto::{master_from_seed, mnemonic_to_seed, validate_mnemonic, MasterKey};
use std::time::Duration;

/// Top-level handle over a single wallet instance: the derived root key,
/// the token store, the sync engine, and the identity controller.
///
/// Per spec.md §9 ("Process-wide singleton identity"), this is an owned
/// handle rather than a process-wide singleton; dropping it (or calling
/// [`Wallet::clear`]) is the equivalent of the source's `clear()` tearing
/// down the shared instance.
pub struct Wallet {
    identity: IdentityController,
    sync: SyncEngine,
}

impl Wallet {
    /// Initialise a wallet from a BIP39 mnemonic (spec.md §4.1, §4.9).
    pub fn from_mnemonic(
        mnemonic: &str,
        passphrase: &str,
        config: WalletConfig,
        store_address: String,
        ipns_name: String,
    ) -> Result<Self, WalletError> {
        if !validate_mnemonic(mnemonic) {
            return Err(WalletError::invalid_mnemonic("failed wordlist/checksum validation"));
        }
        let seed = mnemonic_to_seed(mnemonic, passphrase)?;
        let root = master_from_seed(&seed)?;
        Self::from_master_key(root, config, store_address, ipns_name)
    }

    /// Initialise a wallet directly from a derived [`MasterKey`] (e.g.
    /// recovered from a wallet-file import).
    pub fn from_master_key(
        root: MasterKey,
        config: WalletConfig,
        store_address: String,
        ipns_name: String,
    ) -> Result<Self, WalletError> {
        let events = EventBus::new();
        let identity = IdentityController::new(root, config.clone(), events)?;

        let meta = store::StoreMeta {
            version: 1,
            address: store_address,
            ipns_name,
            format_version: constants::STORE_FORMAT_VERSION.to_string(),
            last_cid: None,
            device_id: None,
        };
        let store = TokenStore::new(meta);
        let sync = SyncEngine::new(store, config.sync_debounce);

        Ok(Wallet { identity, sync })
    }

    pub fn identity(&self) -> &Identity {
        self.identity.identity()
    }

    pub fn identity_controller(&mut self) -> &mut IdentityController {
        &mut self.identity
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    /// Switch the active derivation index, per spec.md §4.9.
    pub fn switch_address(&mut self, index: u32) -> Result<(), WalletError> {
        self.identity.switch_address(index)
    }

    /// Synchronise against one registered remote with the given timeout.
    pub async fn sync(&self, remote_index: usize, timeout: Duration) -> Result<MergeOutcome, WalletError> {
        self.sync.sync(remote_index, timeout).await
    }

    /// Tear down this handle. A consuming method rather than a call into
    /// shared global state (spec.md §9's ownership-oriented resolution of
    /// the source's process-wide singleton).
    pub fn clear(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREZOR_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn from_mnemonic_derives_s1_address() {
        let wallet = Wallet::from_mnemonic(
            TREZOR_MNEMONIC,
            "TREZOR",
            WalletConfig::default(),
            "alpha1abc".into(),
            "12D3KooWabc".into(),
        )
        .unwrap();
        assert!(wallet.identity().address.address.starts_with("alpha1"));
    }

    #[test]
    fn from_mnemonic_rejects_invalid_phrase() {
        let result = Wallet::from_mnemonic(
            "not a real mnemonic at all",
            "",
            WalletConfig::default(),
            "alpha1abc".into(),
            "12D3KooWabc".into(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn switch_address_updates_identity() {
        let mut wallet = Wallet::from_mnemonic(
            TREZOR_MNEMONIC,
            "TREZOR",
            WalletConfig::default(),
            "alpha1abc".into(),
            "12D3KooWabc".into(),
        )
        .unwrap();
        let original = wallet.identity().address.address.clone();
        wallet.switch_address(1).unwrap();
        assert_ne!(wallet.identity().address.address, original);
    }
}
