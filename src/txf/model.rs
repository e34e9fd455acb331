//! # TXF model (C3)
//!
//! Typed representation of a token, its genesis and transaction chain, and
//! the inclusion proofs it carries opaquely. Byte-bearing fields are held as
//! `String` canonical lower-case hex (spec.md §3.3 invariant 6), not raw
//! bytes, so the normalisation boundary in [`crate::txf::codec`] is the one
//! place bytes are decoded/encoded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::TXF_VERSION;

/// One `(coinId, amount)` pair; `amount` is a base-10 integer string in
/// `[0, 2^128)` (spec.md §3.3 invariant 5).
pub type CoinEntry = (String, String);

/// `genesis.data` (spec.md §3.1 "Token (TXF)").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenesisData {
    pub token_id: String,
    pub token_type: String,
    pub coin_data: Vec<CoinEntry>,
    pub token_data: Value,
    pub salt: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_data_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `{ algorithm, publicKey, signature, stateHash }` (spec.md §3.1 "Proofs").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub algorithm: String,
    pub public_key: String,
    pub signature: String,
    pub state_hash: String,
}

/// `{ root, steps[] }`; `steps` is kept opaque (not interpreted by the core).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreePath {
    pub root: String,
    #[serde(default)]
    pub steps: Vec<Value>,
}

/// `{ authenticator, merkleTreePath, transactionHash, unicityCertificate }`
/// (spec.md §3.1 "Proofs"). The core carries this opaquely; it never
/// validates the proof cryptographically (spec.md §1 Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub authenticator: Authenticator,
    pub merkle_tree_path: MerkleTreePath,
    pub transaction_hash: String,
    pub unicity_certificate: Value,
}

/// `genesis = { data, inclusionProof }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub data: GenesisData,
    pub inclusion_proof: InclusionProof,
}

/// `state = { data, predicate }`. Both fields are opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub data: Value,
    pub predicate: Value,
}

/// One entry of `transactions[]`. `inclusion_proof = None` means
/// *uncommitted* (pending aggregator signature) (spec.md §3.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxfTransaction {
    pub previous_state_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state_hash: Option<String>,
    pub predicate: Value,
    pub inclusion_proof: Option<InclusionProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// `_integrity = { genesisDataJSONHash, currentStateHash? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    pub genesis_data_json_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state_hash: Option<String>,
}

/// A full TXF token (spec.md §3.1 "Token (TXF)").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxfToken {
    pub version: String,
    pub genesis: Genesis,
    pub state: TokenState,
    #[serde(default)]
    pub transactions: Vec<TxfTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nametags: Option<Vec<String>>,
    #[serde(rename = "_integrity", default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

impl TxfToken {
    pub fn new_version() -> String {
        TXF_VERSION.to_string()
    }
}

/// Consult, in order: last tx `newStateHash`, last tx
/// `authenticator.stateHash`, `_integrity.currentStateHash`, genesis
/// `authenticator.stateHash` (spec.md §4.5 "Helpers").
pub fn get_current_state_hash(token: &TxfToken) -> Option<String> {
    if let Some(last) = token.transactions.last() {
        if let Some(hash) = &last.new_state_hash {
            return Some(hash.clone());
        }
        if let Some(proof) = &last.inclusion_proof {
            return Some(proof.authenticator.state_hash.clone());
        }
    }

    if let Some(integrity) = &token.integrity {
        if let Some(hash) = &integrity.current_state_hash {
            return Some(hash.clone());
        }
    }

    Some(token.genesis.inclusion_proof.authenticator.state_hash.clone())
}

/// `true` iff the last transaction's inclusion proof is `None`.
pub fn has_uncommitted_transactions(token: &TxfToken) -> bool {
    token
        .transactions
        .last()
        .map(|tx| tx.inclusion_proof.is_none())
        .unwrap_or(false)
}

/// Count of transactions whose inclusion proof is present.
pub fn count_committed_transactions(token: &TxfToken) -> usize {
    token
        .transactions
        .iter()
        .filter(|tx| tx.inclusion_proof.is_some())
        .count()
}

/// `true` iff any committed transaction is missing `newStateHash`.
pub fn has_missing_new_state_hash(token: &TxfToken) -> bool {
    token
        .transactions
        .iter()
        .any(|tx| tx.inclusion_proof.is_some() && tx.new_state_hash.is_none())
}

/// `status` of a [`DisplayToken`]: `pending` iff the last transaction's
/// inclusion proof is null; otherwise `confirmed` (spec.md §3.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Pending,
    Confirmed,
}

/// UI-facing projection of a TXF token (spec.md §3.1 "Display token").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayToken {
    pub id: String,
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Sum over `coinData` entries, as a base-10 string (may exceed `u64`).
    pub amount: String,
    pub status: TokenStatus,
    pub created_at: u64,
    pub updated_at: u64,
    pub sdk_data: Value,
}
