//! # TXF codec (C5)
//!
//! Normalizes external token JSON (hex/bytes) into canonical form, extracts
//! display metadata, and round-trips between a [`TxfToken`] and a
//! [`DisplayToken`]. `normalize` never mutates its input (spec.md §4.5).

use serde_json::Value;

use crate::constants::{DEFAULT_TOKEN_DECIMALS, DEFAULT_TOKEN_SYMBOL, NFT_TOKEN_TYPE_HASH, TXF_VERSION};
use crate::errors::WalletError;
use crate::txf::model::{
    count_committed_transactions, get_current_state_hash, has_uncommitted_transactions,
    CoinEntry, DisplayToken, Integrity, TokenStatus, TxfToken,
};

/// `"00"` × 32, the placeholder integrity hash `tokenToTxf` fills in when
/// absent (spec.md §4.5).
fn zero_hash() -> String {
    "0".repeat(64)
}

fn decode_byte_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Object(map) => {
            if let Some(Value::Array(arr)) = map.get("bytes") {
                return bytes_from_array(arr).map(hex::encode);
            }
            if map.get("type").and_then(Value::as_str) == Some("Buffer") {
                if let Some(Value::Array(arr)) = map.get("data") {
                    return bytes_from_array(arr).map(hex::encode);
                }
            }
            None
        }
        _ => None,
    }
}

fn bytes_from_array(arr: &[Value]) -> Option<Vec<u8>> {
    arr.iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn normalize_field(obj: &mut Value, field: &str) {
    let Some(current) = obj.get(field).cloned() else {
        return;
    };
    if let Some(hexed) = decode_byte_field(&current) {
        obj[field] = Value::String(hexed);
    }
}

fn normalize_authenticator(proof: Option<&mut Value>) {
    let Some(proof) = proof else { return };
    if proof.is_null() {
        return;
    }
    if let Some(auth) = proof.get_mut("authenticator") {
        normalize_field(auth, "publicKey");
        normalize_field(auth, "signature");
    }
}

fn normalize_in_place(value: &mut Value) {
    if let Some(genesis) = value.get_mut("genesis") {
        if let Some(data) = genesis.get_mut("data") {
            for field in ["tokenId", "tokenType", "salt"] {
                normalize_field(data, field);
            }
        }
        normalize_authenticator(genesis.get_mut("inclusionProof"));
    }

    if let Some(Value::Array(txs)) = value.get_mut("transactions") {
        for tx in txs {
            normalize_authenticator(tx.get_mut("inclusionProof"));
        }
    }
}

/// Rewrite every recognised byte-encoded field (hex string, `{bytes:[..]}`,
/// `{type:"Buffer",data:[..]}`) into canonical lower-case hex, without
/// mutating `sdk_token_json`, then parse into a [`TxfToken`].
///
/// Idempotent: `normalize(normalize(t)) = normalize(t)` (spec.md §8 invariant 3).
pub fn normalize(sdk_token_json: &Value) -> Result<TxfToken, WalletError> {
    let mut value = sdk_token_json.clone();
    normalize_in_place(&mut value);
    serde_json::from_value(value).map_err(|e| WalletError::integrity_violation(e.to_string()))
}

/// Like [`normalize`] but stays at the `Value` level (used by
/// [`token_to_txf`], which must tolerate structurally-incomplete input
/// rather than failing the whole conversion on the first unknown field).
fn normalize_value(sdk_token_json: &Value) -> Value {
    let mut value = sdk_token_json.clone();
    normalize_in_place(&mut value);
    value
}

fn sum_coin_data(coin_data: &[CoinEntry]) -> Result<u128, WalletError> {
    coin_data.iter().try_fold(0u128, |acc, (_, amount)| {
        let parsed: u128 = amount
            .parse()
            .map_err(|_| WalletError::integrity_violation(format!("invalid coin amount: {amount}")))?;
        acc.checked_add(parsed)
            .ok_or_else(|| WalletError::integrity_violation("coin amount sum overflowed u128"))
    })
}

fn symbol_and_decimals(token_type: &str) -> (String, u8) {
    if token_type.eq_ignore_ascii_case(NFT_TOKEN_TYPE_HASH) {
        ("NFT".to_string(), 0)
    } else {
        (DEFAULT_TOKEN_SYMBOL.to_string(), DEFAULT_TOKEN_DECIMALS)
    }
}

fn canonical_coin_id(coin_data: &[CoinEntry]) -> Option<String> {
    coin_data
        .iter()
        .find(|(_, amount)| amount.parse::<u128>().map(|a| a != 0).unwrap_or(false))
        .or_else(|| coin_data.first())
        .map(|(coin_id, _)| coin_id.clone())
}

fn status_of(token: &TxfToken) -> TokenStatus {
    if token.transactions.is_empty() {
        // An uncommitted genesis (no transactions yet) is confirmed only if
        // the genesis inclusion proof itself is present, which it always is
        // by construction; absent transactions means nothing is pending.
        TokenStatus::Confirmed
    } else if has_uncommitted_transactions(token) {
        TokenStatus::Pending
    } else {
        TokenStatus::Confirmed
    }
}

/// `txfToToken`: project a [`TxfToken`] into its UI-facing [`DisplayToken`].
pub fn txf_to_token(id: &str, txf: &TxfToken, now_ms: u64) -> Result<DisplayToken, WalletError> {
    let amount = sum_coin_data(&txf.genesis.data.coin_data)?;
    let (symbol, decimals) = symbol_and_decimals(&txf.genesis.data.token_type);
    let coin_id = canonical_coin_id(&txf.genesis.data.coin_data).unwrap_or_default();

    Ok(DisplayToken {
        id: id.to_string(),
        coin_id,
        symbol,
        name: txf.genesis.data.token_type.clone(),
        decimals,
        amount: amount.to_string(),
        status: status_of(txf),
        created_at: now_ms,
        updated_at: now_ms,
        sdk_data: serde_json::to_value(txf)
            .map_err(|e| WalletError::integrity_violation(e.to_string()))?,
    })
}

/// `tokenToTxf`: parse `display_token.sdk_data`, re-normalise, and fill in
/// `version`/`transactions`/`_integrity` defaults. Returns `None` on any
/// structural failure (spec.md §4.5), matching the source's "best effort,
/// null on failure" contract rather than propagating a typed error.
pub fn token_to_txf(display_token: &DisplayToken) -> Option<TxfToken> {
    let mut normalized = normalize_value(&display_token.sdk_data);

    let obj = normalized.as_object_mut()?;
    obj.entry("version")
        .or_insert_with(|| Value::String(TXF_VERSION.to_string()));
    obj.entry("transactions")
        .or_insert_with(|| Value::Array(vec![]));

    if !obj.contains_key("_integrity") {
        obj.insert(
            "_integrity".to_string(),
            serde_json::to_value(Integrity {
                genesis_data_json_hash: zero_hash(),
                current_state_hash: None,
            })
            .ok()?,
        );
    }

    serde_json::from_value(normalized).ok()
}

/// `getCurrentStateHash` re-exported for callers that only hold codec imports.
pub use crate::txf::model::get_current_state_hash as current_state_hash;

/// `countCommittedTransactions` re-exported for callers that only hold codec imports.
pub use crate::txf::model::count_committed_transactions as committed_transaction_count;
