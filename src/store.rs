//! # Token store (C4)
//!
//! A key-prefix namespaced container: active / archived / forked tokens,
//! plus reserved side tables (spec.md §3.2). The backing map is a plain
//! `BTreeMap<String, serde_json::Value>`, chosen over a hash map because
//! §4.7's merge algorithm needs deterministic iteration order for its prefix
//! scans — ordered/deterministic collections at state boundaries are the
//! same choice made elsewhere in this crate to get a canonical encoding
//! before signing or hashing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WalletError;
use crate::txf::{get_current_state_hash, DisplayToken, TxfToken};

/// `_meta` (spec.md §3.1 "Store metadata").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreMeta {
    pub version: u64,
    pub address: String,
    pub ipns_name: String,
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// `{ tokenId, stateHash, timestamp }` (spec.md §3.1 "Tombstone").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub token_id: String,
    pub state_hash: String,
    pub timestamp: u64,
}

/// Lifecycle of a pending outgoing transfer (spec.md §3.1 "Outbox entry").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Submitted,
    Confirmed,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: String,
    pub status: OutboxStatus,
    pub source_token_id: String,
    pub salt: String,
    pub commitment_json: Value,
    pub recipient_pubkey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_nametag: Option<String>,
    pub amount: String,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MintType {
    Split,
    Faucet,
    Other,
}

/// `{ id, status, type, salt, requestIdHex, mintDataJson, createdAt, updatedAt, error? }`
/// (spec.md §3.1 "Mint-outbox entry").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MintOutboxEntry {
    pub id: String,
    pub status: OutboxStatus,
    #[serde(rename = "type")]
    pub mint_type: MintType,
    pub salt: String,
    pub request_id_hex: String,
    pub mint_data_json: Value,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{ tokenId, recipient, txHash, sentAt }` (spec.md §3.1 "Sent entry").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentEntry {
    pub token_id: String,
    pub recipient: String,
    pub tx_hash: String,
    pub sent_at: u64,
}

/// `{ tokenId, reason, detectedAt }` (spec.md §3.1 "Invalid entry").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidEntry {
    pub token_id: String,
    pub reason: String,
    pub detected_at: u64,
}

/// `{ name }` rows for `_invalidatedNametags`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvalidatedNametag {
    pub name: String,
    pub detected_at: u64,
}

pub const META_KEY: &str = "_meta";
pub const LEGACY_NAMETAG_KEY: &str = "_nametag";
pub const TOMBSTONES_KEY: &str = "_tombstones";
pub const OUTBOX_KEY: &str = "_outbox";
pub const MINT_OUTBOX_KEY: &str = "_mintOutbox";
pub const SENT_KEY: &str = "_sent";
pub const INVALID_KEY: &str = "_invalid";
pub const INVALIDATED_NAMETAGS_KEY: &str = "_invalidatedNametags";
pub const INTEGRITY_KEY: &str = "_integrity";

const FORKED_PREFIX: &str = "_forked_";
const ARCHIVED_PREFIX: &str = "archived-";

/// Reserved top-level keys. Per spec.md §9's Open Question on
/// `isTokenKey`, this is the *superset* across the source's two conflicting
/// definitions (it includes `_sent`/`_invalid`/`_integrity` either way).
pub const RESERVED_KEYS: &[&str] = &[
    META_KEY,
    LEGACY_NAMETAG_KEY,
    TOMBSTONES_KEY,
    OUTBOX_KEY,
    MINT_OUTBOX_KEY,
    SENT_KEY,
    INVALID_KEY,
    INVALIDATED_NAMETAGS_KEY,
    INTEGRITY_KEY,
];

pub fn is_forked_key(key: &str) -> bool {
    key.starts_with(FORKED_PREFIX)
}

pub fn is_archived_key(key: &str) -> bool {
    key.starts_with(ARCHIVED_PREFIX)
}

/// `isTokenKey(k)`: `k` starts with `_`, is not reserved, and is not a
/// forked-key (spec.md §3.2). Archived keys never start with `_`, so no
/// separate exclusion is needed for them.
pub fn is_token_key(key: &str) -> bool {
    key.starts_with('_') && !RESERVED_KEYS.contains(&key) && !is_forked_key(key)
}

/// Token IDs must match `^[0-9a-fA-F]{64}$` (spec.md §3.2).
pub fn is_valid_token_id(id: &str) -> bool {
    id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit())
}

fn active_key(token_id: &str) -> String {
    format!("_{token_id}")
}

fn archived_key(token_id: &str) -> String {
    format!("{ARCHIVED_PREFIX}{token_id}")
}

fn forked_key(token_id: &str, state_hash: &str) -> String {
    format!("{FORKED_PREFIX}{token_id}_{state_hash}")
}

fn token_id_from_active_key(key: &str) -> Option<&str> {
    if is_token_key(key) {
        Some(&key[1..])
    } else {
        None
    }
}

fn token_id_from_archived_key(key: &str) -> Option<&str> {
    key.strip_prefix(ARCHIVED_PREFIX)
}

/// The container described in spec.md §3.2: a flat string-keyed map
/// partitioned by key prefix into active/archived/forked tokens and a fixed
/// set of reserved side tables.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    rows: BTreeMap<String, Value>,
}

impl TokenStore {
    pub fn new(meta: StoreMeta) -> Self {
        let mut rows = BTreeMap::new();
        rows.insert(META_KEY.to_string(), serde_json::to_value(meta).unwrap());
        TokenStore { rows }
    }

    pub fn from_rows(rows: BTreeMap<String, Value>) -> Self {
        TokenStore { rows }
    }

    pub fn rows(&self) -> &BTreeMap<String, Value> {
        &self.rows
    }

    pub fn into_rows(self) -> BTreeMap<String, Value> {
        self.rows
    }

    pub fn meta(&self) -> Result<StoreMeta, WalletError> {
        let raw = self
            .rows
            .get(META_KEY)
            .ok_or_else(|| WalletError::integrity_violation("missing _meta"))?;
        serde_json::from_value(raw.clone())
            .map_err(|e| WalletError::integrity_violation(e.to_string()))
    }

    pub(crate) fn set_meta(&mut self, meta: &StoreMeta) -> Result<(), WalletError> {
        let value = serde_json::to_value(meta)
            .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
        self.rows.insert(META_KEY.to_string(), value);
        Ok(())
    }

    fn bump_version(&mut self) -> Result<(), WalletError> {
        let mut meta = self.meta()?;
        meta.version += 1;
        self.set_meta(&meta)
    }

    /// `put(token)`: validate, normalise, write under `_{tokenId}`, bump
    /// `_meta.version` (spec.md §4.4).
    pub fn put(&mut self, token_id: &str, token: &TxfToken) -> Result<(), WalletError> {
        if !is_valid_token_id(token_id) {
            return Err(WalletError::integrity_violation(format!(
                "invalid token id: {token_id}"
            )));
        }
        let normalized = crate::txf::codec::normalize(
            &serde_json::to_value(token).map_err(|e| WalletError::integrity_violation(e.to_string()))?,
        )?;
        let value = serde_json::to_value(&normalized)
            .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
        self.rows.insert(active_key(token_id), value);
        self.bump_version()
    }

    /// `archive(tokenId)`: move `_{tokenId}` → `archived-{tokenId}`.
    pub fn archive(&mut self, token_id: &str) -> Result<(), WalletError> {
        let key = active_key(token_id);
        let value = self
            .rows
            .remove(&key)
            .ok_or_else(|| WalletError::integrity_violation(format!("no active token {token_id}")))?;
        self.rows.insert(archived_key(token_id), value);
        self.bump_version()
    }

    /// `fork(tokenId, stateHash, txf)`: write `_forked_{tokenId}_{stateHash}`.
    pub fn fork(&mut self, token_id: &str, state_hash: &str, txf: &TxfToken) -> Result<(), WalletError> {
        let value = serde_json::to_value(txf)
            .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
        self.rows.insert(forked_key(token_id, state_hash), value);
        self.bump_version()
    }

    /// `tombstone(tokenId, stateHash, now)`: append to `_tombstones`; remove
    /// `_{tokenId}` iff its current state hash equals `stateHash`.
    pub fn tombstone(&mut self, token_id: &str, state_hash: &str, now: u64) -> Result<(), WalletError> {
        let mut tombstones = self.tombstones()?;
        tombstones.push(Tombstone {
            token_id: token_id.to_string(),
            state_hash: state_hash.to_string(),
            timestamp: now,
        });
        self.set_tombstones(&tombstones)?;

        if let Some(active) = self.get_token(token_id)? {
            if get_current_state_hash(&active).as_deref() == Some(state_hash) {
                self.rows.remove(&active_key(token_id));
            }
        }

        self.bump_version()
    }

    fn get_token(&self, token_id: &str) -> Result<Option<TxfToken>, WalletError> {
        match self.rows.get(&active_key(token_id)) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| WalletError::integrity_violation(e.to_string())),
            None => Ok(None),
        }
    }

    /// `getActive() -> TxfToken[]`.
    pub fn get_active(&self) -> Result<Vec<(String, TxfToken)>, WalletError> {
        self.rows
            .iter()
            .filter(|(k, _)| is_token_key(k))
            .map(|(k, v)| {
                let token: TxfToken = serde_json::from_value(v.clone())
                    .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
                Ok((token_id_from_active_key(k).unwrap().to_string(), token))
            })
            .collect()
    }

    /// `getArchived()`.
    pub fn get_archived(&self) -> Result<Vec<(String, TxfToken)>, WalletError> {
        self.rows
            .iter()
            .filter(|(k, _)| is_archived_key(k))
            .map(|(k, v)| {
                let token: TxfToken = serde_json::from_value(v.clone())
                    .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
                Ok((token_id_from_archived_key(k).unwrap().to_string(), token))
            })
            .collect()
    }

    /// `getForked()`.
    pub fn get_forked(&self) -> Result<Vec<(String, TxfToken)>, WalletError> {
        self.rows
            .iter()
            .filter(|(k, _)| is_forked_key(k))
            .map(|(k, v)| {
                let token: TxfToken = serde_json::from_value(v.clone())
                    .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
                Ok((k.clone(), token))
            })
            .collect()
    }

    /// `toDisplay(tokenId) -> Token`.
    pub fn to_display(&self, token_id: &str, now_ms: u64) -> Result<DisplayToken, WalletError> {
        let token = self
            .get_token(token_id)?
            .ok_or_else(|| WalletError::integrity_violation(format!("no active token {token_id}")))?;
        crate::txf::codec::txf_to_token(token_id, &token, now_ms)
    }

    pub(crate) fn list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, WalletError> {
        match self.rows.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| WalletError::integrity_violation(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn set_list<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<(), WalletError> {
        if items.is_empty() {
            self.rows.remove(key);
            return Ok(());
        }
        let value = serde_json::to_value(items)
            .map_err(|e| WalletError::integrity_violation(e.to_string()))?;
        self.rows.insert(key.to_string(), value);
        Ok(())
    }

    pub fn tombstones(&self) -> Result<Vec<Tombstone>, WalletError> {
        self.list(TOMBSTONES_KEY)
    }

    pub fn set_tombstones(&mut self, tombstones: &[Tombstone]) -> Result<(), WalletError> {
        self.set_list(TOMBSTONES_KEY, tombstones)
    }

    pub fn outbox(&self) -> Result<Vec<OutboxEntry>, WalletError> {
        self.list(OUTBOX_KEY)
    }

    pub fn set_outbox(&mut self, entries: &[OutboxEntry]) -> Result<(), WalletError> {
        self.set_list(OUTBOX_KEY, entries)
    }

    pub fn mint_outbox(&self) -> Result<Vec<MintOutboxEntry>, WalletError> {
        self.list(MINT_OUTBOX_KEY)
    }

    pub fn set_mint_outbox(&mut self, entries: &[MintOutboxEntry]) -> Result<(), WalletError> {
        self.set_list(MINT_OUTBOX_KEY, entries)
    }

    pub fn sent(&self) -> Result<Vec<SentEntry>, WalletError> {
        self.list(SENT_KEY)
    }

    pub fn set_sent(&mut self, entries: &[SentEntry]) -> Result<(), WalletError> {
        self.set_list(SENT_KEY, entries)
    }

    pub fn invalid(&self) -> Result<Vec<InvalidEntry>, WalletError> {
        self.list(INVALID_KEY)
    }

    pub fn set_invalid(&mut self, entries: &[InvalidEntry]) -> Result<(), WalletError> {
        self.set_list(INVALID_KEY, entries)
    }

    pub fn invalidated_nametags(&self) -> Result<Vec<InvalidatedNametag>, WalletError> {
        self.list(INVALIDATED_NAMETAGS_KEY)
    }

    pub fn set_invalidated_nametags(&mut self, entries: &[InvalidatedNametag]) -> Result<(), WalletError> {
        self.set_list(INVALIDATED_NAMETAGS_KEY, entries)
    }

    /// The row at `key`, if any — used by the merge algorithm (§4.7), which
    /// needs raw `Value` access to carry archived/forked rows through
    /// verbatim without round-tripping them through a typed struct.
    pub fn row(&self, key: &str) -> Option<&Value> {
        self.rows.get(key)
    }

    pub fn insert_row(&mut self, key: String, value: Value) {
        self.rows.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txf::{Authenticator, Genesis, GenesisData, InclusionProof, MerkleTreePath, TokenState};

    fn meta(version: u64) -> StoreMeta {
        StoreMeta {
            version,
            address: "alpha1abc".into(),
            ipns_name: "12D3KooWabc".into(),
            format_version: "2.0".into(),
            last_cid: None,
            device_id: None,
        }
    }

    fn sample_token(token_id: &str) -> TxfToken {
        TxfToken {
            version: "2.0".into(),
            genesis: Genesis {
                data: GenesisData {
                    token_id: token_id.to_string(),
                    token_type: "bb".repeat(32),
                    coin_data: vec![("coin1".into(), "100".into())],
                    token_data: Value::Null,
                    salt: "cc".repeat(32),
                    recipient: "alpha1abc".into(),
                    recipient_data_hash: None,
                    reason: None,
                },
                inclusion_proof: InclusionProof {
                    authenticator: Authenticator {
                        algorithm: "secp256k1".into(),
                        public_key: "02".repeat(33),
                        signature: "00".repeat(64),
                        state_hash: "11".repeat(32),
                    },
                    merkle_tree_path: MerkleTreePath {
                        root: "ab".repeat(32),
                        steps: vec![],
                    },
                    transaction_hash: "cd".repeat(32),
                    unicity_certificate: Value::Null,
                },
            },
            state: TokenState {
                data: Value::Null,
                predicate: Value::Null,
            },
            transactions: vec![],
            nametags: None,
            integrity: None,
        }
    }

    #[test]
    fn key_classification() {
        assert!(is_token_key("_aabb"));
        assert!(!is_token_key("_meta"));
        assert!(!is_token_key("_forked_aabb_ccdd"));
        assert!(is_forked_key("_forked_aabb_ccdd"));
        assert!(is_archived_key("archived-aabb"));
        assert!(!is_token_key("archived-aabb"));
    }

    #[test]
    fn put_bumps_version_and_is_retrievable() {
        let token_id = "aa".repeat(32);
        let mut store = TokenStore::new(meta(1));
        store.put(&token_id, &sample_token(&token_id)).unwrap();

        assert_eq!(store.meta().unwrap().version, 2);
        let active = store.get_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, token_id);
    }

    #[test]
    fn archive_moves_key() {
        let token_id = "aa".repeat(32);
        let mut store = TokenStore::new(meta(1));
        store.put(&token_id, &sample_token(&token_id)).unwrap();
        store.archive(&token_id).unwrap();

        assert!(store.get_active().unwrap().is_empty());
        assert_eq!(store.get_archived().unwrap().len(), 1);
    }

    #[test]
    fn tombstone_removes_matching_state_only() {
        let token_id = "aa".repeat(32);
        let mut store = TokenStore::new(meta(1));
        store.put(&token_id, &sample_token(&token_id)).unwrap();

        store.tombstone(&token_id, &"99".repeat(32), 100).unwrap();
        assert_eq!(store.get_active().unwrap().len(), 1, "non-matching state hash is kept");

        store.tombstone(&token_id, &"11".repeat(32), 200).unwrap();
        assert!(store.get_active().unwrap().is_empty(), "matching state hash is removed");
        assert_eq!(store.tombstones().unwrap().len(), 2);
    }

    #[test]
    fn to_display_computes_amount_and_status() {
        let token_id = "aa".repeat(32);
        let mut store = TokenStore::new(meta(1));
        store.put(&token_id, &sample_token(&token_id)).unwrap();

        let display = store.to_display(&token_id, 1_000).unwrap();
        assert_eq!(display.amount, "100");
        assert_eq!(display.status, crate::txf::TokenStatus::Confirmed);
    }

    #[test]
    fn empty_side_tables_are_omitted_from_rows() {
        let mut store = TokenStore::new(meta(1));
        store.set_outbox(&[]).unwrap();
        assert!(!store.rows().contains_key(OUTBOX_KEY));
    }
}
