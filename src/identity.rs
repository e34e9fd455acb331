//! # Identity controller (C9)
//!
//! Derives the active address at a chosen index, manages the
//! address→nametags mapping, and notifies observers of identity changes
//! (spec.md §4.9). Per spec.md §9's "Process-wide singleton identity" note,
//! this port exposes the identity as an owned `IdentityController` handle
//! rather than a process-wide singleton; `clear()` is a consuming method
//! instead of tearing down shared global state.

use std::collections::BTreeMap;

use crate::config::WalletConfig;
use crate::crypto::{derive_address, sha256, DerivedAddress, MasterKey};
use crate::errors::WalletError;
use crate::events::{EventBus, WalletEvent};
use crate::providers::TransportProvider;

/// `addressId → (nametagIndex → nametag)` (spec.md §3.1 "Nametag map").
/// Index 0 is always the primary nametag.
#[derive(Debug, Clone, Default)]
pub struct NametagMap {
    inner: BTreeMap<String, BTreeMap<u32, String>>,
}

impl NametagMap {
    pub fn new() -> Self {
        NametagMap::default()
    }

    pub fn primary(&self, address_id: &str) -> Option<&String> {
        self.inner.get(address_id).and_then(|m| m.get(&0))
    }

    pub fn set(&mut self, address_id: &str, index: u32, name: String) {
        self.inner
            .entry(address_id.to_string())
            .or_default()
            .insert(index, name);
    }

    /// The lowest index not yet assigned for `address_id` — used by
    /// `recoverNametag` to insert at "the next free index" (spec.md §4.9).
    pub fn next_free_index(&self, address_id: &str) -> u32 {
        match self.inner.get(address_id) {
            Some(map) => (0..).find(|i| !map.contains_key(i)).unwrap_or(0),
            None => 0,
        }
    }
}

/// `{ privateKey, chainPubkey, l1Address, directAddress, ipnsName, nametag? }`
/// (spec.md §3.1 "Identity").
pub struct Identity {
    pub address: DerivedAddress,
    pub direct_address: String,
    pub ipns_name: String,
    pub nametag: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("l1_address", &self.address.address)
            .field("direct_address", &self.direct_address)
            .field("ipns_name", &self.ipns_name)
            .field("nametag", &self.nametag)
            .finish()
    }
}

/// `directAddress`: `DIRECT://<hex>` derived from the predicate-reference
/// hashing over `(tokenType, publicKey)` (spec.md §3.1). The real hashing
/// primitive belongs to the network layer and is out of scope (spec.md
/// §1); this is a concrete, deterministic stand-in so the core remains
/// runnable standalone, recorded as an Open-Question resolution in
/// DESIGN.md.
fn derive_direct_address(token_type: &[u8], public_key: &[u8]) -> String {
    let mut buf = Vec::with_capacity(token_type.len() + public_key.len());
    buf.extend_from_slice(token_type);
    buf.extend_from_slice(public_key);
    format!("DIRECT://{}", hex::encode(sha256(&buf)))
}

/// `ipnsName`: `"12D3KooW" + sha256(publicKey)[0..40]` (first 40 hex chars,
/// spec.md GLOSSARY "IPNS name").
fn derive_ipns_name(public_key: &[u8]) -> String {
    let digest = sha256(public_key);
    format!("12D3KooW{}", &hex::encode(digest)[..40])
}

const GENESIS_TOKEN_TYPE_PLACEHOLDER: &[u8] = b"identity-direct-address";

fn build_identity(
    address: DerivedAddress,
    nametags: &NametagMap,
) -> Identity {
    let direct_address = derive_direct_address(GENESIS_TOKEN_TYPE_PLACEHOLDER, address.public_key());
    let ipns_name = derive_ipns_name(address.public_key());
    let nametag = nametags.primary(&direct_address).cloned();

    Identity {
        address,
        direct_address,
        ipns_name,
        nametag,
    }
}

/// Validate `^[A-Za-z0-9_-]{3,20}$` without pulling in a regex dependency
/// for a single fixed-character-class check.
fn is_valid_nametag(name: &str) -> bool {
    let len = name.chars().count();
    (3..=20).contains(&len)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Owned handle over the active HD identity (spec.md §4.9). Not a
/// process-wide singleton (see module docs).
pub struct IdentityController {
    root: MasterKey,
    config: WalletConfig,
    current_index: u32,
    nametags: NametagMap,
    events: EventBus,
    identity: Identity,
}

impl IdentityController {
    /// Construct from a root key, deriving the receiving address at index 0.
    pub fn new(root: MasterKey, config: WalletConfig, events: EventBus) -> Result<Self, WalletError> {
        let address = derive_address(&root, &config.base_path, false, 0, &config.address_prefix)?;
        let nametags = NametagMap::new();
        let identity = build_identity(address, &nametags);

        Ok(IdentityController {
            root,
            config,
            current_index: 0,
            nametags,
            events,
            identity,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn nametags(&self) -> &NametagMap {
        &self.nametags
    }

    /// `switchAddress(i)`: derive at `basePath/0/i`, recompute
    /// `directAddress`, look up the primary nametag, and emit
    /// `identity:changed` after the state change is visible (spec.md §4.9,
    /// §5 "Ordering guarantees").
    pub fn switch_address(&mut self, index: u32) -> Result<(), WalletError> {
        let address = derive_address(&self.root, &self.config.base_path, false, index, &self.config.address_prefix)?;
        let identity = build_identity(address, &self.nametags);

        self.current_index = index;
        let emitted_address = identity.address.address.clone();
        self.identity = identity;

        self.events.emit(WalletEvent::IdentityChanged {
            address: emitted_address,
            index,
        });
        Ok(())
    }

    /// `registerNametag(name)`: validate, refuse if a primary nametag
    /// already exists for the active address, ask the external registry to
    /// publish, then record `(addressId → 0 → name)` on success.
    pub async fn register_nametag(
        &mut self,
        name: &str,
        transport: &mut dyn TransportProvider,
    ) -> Result<(), WalletError> {
        if !is_valid_nametag(name) {
            return Err(WalletError::invalid_nametag(name));
        }

        let address_id = self.identity.direct_address.clone();
        if self.nametags.primary(&address_id).is_some() {
            return Err(WalletError::NametagTaken(name.to_string()));
        }

        transport
            .register_nametag(name, &hex::encode(self.identity.address.public_key()))
            .await?;

        self.nametags.set(&address_id, 0, name.to_string());
        self.identity.nametag = Some(name.to_string());

        self.events.emit(WalletEvent::NametagRegistered {
            address: address_id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// `recoverNametag()`: consult the external registry by public key,
    /// insert at the next free index, and re-publish to keep the registry
    /// record current.
    pub async fn recover_nametag(
        &mut self,
        transport: &mut dyn TransportProvider,
    ) -> Result<Option<String>, WalletError> {
        let public_key_hex = hex::encode(self.identity.address.public_key());
        let Some(name) = transport.recover_nametag(&public_key_hex).await? else {
            return Ok(None);
        };

        let address_id = self.identity.direct_address.clone();
        let index = self.nametags.next_free_index(&address_id);
        self.nametags.set(&address_id, index, name.clone());
        if index == 0 {
            self.identity.nametag = Some(name.clone());
        }

        // Nametag re-sync failures are recovered locally, not fatal
        // (spec.md §7 "Propagation"): a transport hiccup here should not
        // undo the local recovery we just recorded.
        if let Err(e) = transport.register_nametag(&name, &public_key_hex).await {
            log::warn!(target: "wallet::identity", "nametag re-publish failed: {e}");
        }

        self.events.emit(WalletEvent::NametagRecovered {
            address: address_id,
            name: name.clone(),
        });
        Ok(Some(name))
    }

    /// `getNametag(addressId?) -> name?`, always the primary (index 0).
    pub fn get_nametag(&self, address_id: Option<&str>) -> Option<&String> {
        match address_id {
            Some(id) => self.nametags.primary(id),
            None => self.identity.nametag.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{master_from_seed, mnemonic_to_seed};

    const TREZOR_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn controller() -> IdentityController {
        let seed = mnemonic_to_seed(TREZOR_MNEMONIC, "TREZOR").unwrap();
        let root = master_from_seed(&seed).unwrap();
        IdentityController::new(root, WalletConfig::default(), EventBus::new()).unwrap()
    }

    #[test]
    fn nametag_validation() {
        assert!(is_valid_nametag("abc"));
        assert!(is_valid_nametag("a-b_c9"));
        assert!(!is_valid_nametag("ab"));
        assert!(!is_valid_nametag(&"a".repeat(21)));
        assert!(!is_valid_nametag("has space"));
        assert!(!is_valid_nametag("emoji🎉"));
    }

    #[test]
    fn s8_switch_address_is_deterministic_and_reversible() {
        let mut controller = controller();
        let addr0 = controller.identity().address.address.clone();

        controller.switch_address(3).unwrap();
        let addr3 = controller.identity().address.address.clone();
        assert_ne!(addr0, addr3);

        controller.switch_address(0).unwrap();
        assert_eq!(controller.identity().address.address, addr0);
    }

    #[test]
    fn nametag_map_tracks_next_free_index() {
        let mut map = NametagMap::new();
        assert_eq!(map.next_free_index("addr1"), 0);
        map.set("addr1", 0, "alice".into());
        assert_eq!(map.next_free_index("addr1"), 1);
        map.set("addr1", 1, "alice2".into());
        assert_eq!(map.next_free_index("addr1"), 2);
    }

    #[test]
    fn direct_address_and_ipns_are_deterministic() {
        let c1 = controller();
        let c2 = controller();
        assert_eq!(c1.identity().direct_address, c2.identity().direct_address);
        assert_eq!(c1.identity().ipns_name, c2.identity().ipns_name);
        assert!(c1.identity().direct_address.starts_with("DIRECT://"));
        assert!(c1.identity().ipns_name.starts_with("12D3KooW"));
    }
}
