//! # Collaborator contracts (§6.4)
//!
//! The core depends on four external collaborators through narrow,
//! object-safe traits. Each method that performs I/O returns a boxed future
//! via `#[async_trait]` — the standard idiom for object-safe async traits in
//! the async-Rust ecosystem — rather than requiring a generic parameter per
//! call site. The core never assumes
//! anything about how a provider implements these beyond its declared
//! contract (spec.md §5 "Shared-resource policy": "Each remote store is an
//! independent actor; crosstalk is only via the local store.").

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::WalletError;
use crate::merge::MergeOutcome;
use crate::store::TokenStore;

/// Local-storage provider: string-keyed, string-valued key/value store,
/// namespaced per active address (spec.md §6.4, §9 "Global keyspace vs
/// namespaced keyspace").
#[async_trait]
pub trait LocalStorageProvider: Send + Sync {
    async fn connect(&mut self) -> Result<(), WalletError>;
    async fn disconnect(&mut self) -> Result<(), WalletError>;
    fn is_connected(&self) -> bool;

    /// Replace the identity namespace every subsequent call is scoped to.
    /// The provider is responsible for not mixing keys across namespaces;
    /// the core never mutates the provider's namespace table directly
    /// (spec.md §9 "do not mutate the provider in place").
    async fn set_identity(&mut self, namespace: &str) -> Result<(), WalletError>;

    async fn get(&self, key: &str) -> Result<Option<String>, WalletError>;
    async fn set(&mut self, key: &str, value: String) -> Result<(), WalletError>;
    async fn remove(&mut self, key: &str) -> Result<(), WalletError>;
    async fn has(&self, key: &str) -> Result<bool, WalletError>;
    async fn keys(&self) -> Result<Vec<String>, WalletError>;
    async fn clear(&mut self) -> Result<(), WalletError>;
}

/// Remote token-storage provider: content-addressed, handle treated
/// opaquely by the core (spec.md §6.4).
#[async_trait]
pub trait RemoteStoreProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self) -> Result<(), WalletError>;
    async fn shutdown(&mut self) -> Result<(), WalletError>;

    /// Load a snapshot, optionally pinned to a specific content id.
    async fn load(&self, cid: Option<&str>) -> Result<TokenStore, WalletError>;

    /// Persist `data`; returns the new content id, if the provider assigns one.
    async fn save(&mut self, data: &TokenStore) -> Result<Option<String>, WalletError>;

    /// Ask the provider to reconcile `local_snapshot` against its own state
    /// and return the merge outcome (spec.md §4.8).
    async fn sync(&mut self, local_snapshot: &TokenStore) -> Result<MergeOutcome, WalletError>;

    async fn clear(&mut self) -> Result<(), WalletError> {
        Ok(())
    }
}

/// Transport provider: pub/sub delivery of transfer bundles and messages,
/// out of scope for the core's own logic but consumed as a named contract
/// (spec.md §1, §6.4).
#[async_trait]
pub trait TransportProvider: Send + Sync {
    async fn connect(&mut self) -> Result<(), WalletError>;
    async fn disconnect(&mut self) -> Result<(), WalletError>;
    fn is_connected(&self) -> bool;

    async fn send_message(&mut self, to: &str, payload: Value) -> Result<(), WalletError>;
    async fn send_token_transfer(&mut self, to: &str, payload: Value) -> Result<(), WalletError>;

    async fn register_nametag(&mut self, name: &str, public_key: &str) -> Result<(), WalletError> {
        let _ = (name, public_key);
        Err(WalletError::provider_unavailable(
            "transport",
            "nametag registration not supported",
        ))
    }

    async fn resolve_nametag(&self, name: &str) -> Result<Option<String>, WalletError> {
        let _ = name;
        Ok(None)
    }

    async fn recover_nametag(&self, public_key: &str) -> Result<Option<String>, WalletError> {
        let _ = public_key;
        Ok(None)
    }

    fn connected_relay_count(&self) -> usize {
        0
    }
}

/// Oracle provider: submit-commitment / wait-for-proof / validate-token
/// operations, opaque to the core (spec.md §6.4).
#[async_trait]
pub trait OracleProvider: Send + Sync {
    async fn initialize(&mut self) -> Result<(), WalletError>;
    async fn submit_commitment(&mut self, commitment: Value) -> Result<Value, WalletError>;
    async fn wait_for_proof(&mut self, request_id: &str) -> Result<Value, WalletError>;
    async fn validate_token(&self, token: Value) -> Result<bool, WalletError>;
}
