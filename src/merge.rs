//! # Multi-device merge (C7) — the heart of the core
//!
//! A pure function over two [`TokenStore`] snapshots (spec.md §4.7). The
//! algorithm, tie-breaks, and `O(|L| + |R| + |T|)` complexity bound are
//! authoritative and implemented exactly as written: version is the max of
//! both sides plus one, tombstones suppress matching rows from either side,
//! and every row-level conflict resolves to the local side (spec.md §3.3
//! invariants 2–4).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::WalletError;
use crate::store::{
    is_archived_key, is_forked_key, is_token_key, InvalidEntry, InvalidatedNametag,
    MintOutboxEntry, OutboxEntry, SentEntry, StoreMeta, Tombstone, TokenStore,
};
use crate::txf::{get_current_state_hash, TxfToken};

/// Result of [`merge`]: the merged store plus the three spec-mandated counters.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: TokenStore,
    pub added: usize,
    pub removed: usize,
    pub conflicts: usize,
}

fn token_id_of(key: &str) -> &str {
    debug_assert!(is_token_key(key));
    &key[1..]
}

fn row_state_hash(value: &Value) -> Option<String> {
    let token: TxfToken = serde_json::from_value(value.clone()).ok()?;
    get_current_state_hash(&token)
}

/// Local-wins dedup by `key_fn`: `remote` entries are inserted first so any
/// `local` entry with the same key overwrites it (spec.md §4.7 step 6).
fn merge_dedup<T, K, F>(local: Vec<T>, remote: Vec<T>, key_fn: F) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut by_key: BTreeMap<K, T> = BTreeMap::new();
    for item in remote {
        by_key.insert(key_fn(&item), item);
    }
    for item in local {
        by_key.insert(key_fn(&item), item);
    }
    by_key.into_values().collect()
}

/// `merge(local, remote) -> { merged, added, removed, conflicts }`.
pub fn merge(local: &TokenStore, remote: &TokenStore, now_ms: u64) -> Result<MergeOutcome, WalletError> {
    let local_meta = local.meta()?;
    let remote_meta = remote.meta()?;

    // base = whichever side has the higher version; ties -> local.
    let mut merged_meta = if remote_meta.version > local_meta.version {
        remote_meta.clone()
    } else {
        local_meta.clone()
    };
    merged_meta.version = local_meta.version.max(remote_meta.version) + 1;

    // Step 3: union tombstone set, keyed by (tokenId, stateHash); greater
    // timestamp wins on a collision.
    let mut tombstones: BTreeMap<(String, String), Tombstone> = BTreeMap::new();
    for t in local
        .tombstones()?
        .into_iter()
        .chain(remote.tombstones()?.into_iter())
    {
        let key = (t.token_id.clone(), t.state_hash.clone());
        let replace = match tombstones.get(&key) {
            Some(existing) => t.timestamp > existing.timestamp,
            None => true,
        };
        if replace {
            tombstones.insert(key, t);
        }
    }
    let is_tombstoned =
        |token_id: &str, state_hash: &str| tombstones.contains_key(&(token_id.to_string(), state_hash.to_string()));

    // Step 5: merge token rows.
    let mut merged_rows: BTreeMap<String, Value> = BTreeMap::new();
    let mut added = 0usize;
    let mut removed = 0usize;
    let mut conflicts = 0usize;

    let local_token_keys: Vec<&String> = local.rows().keys().filter(|k| is_token_key(k)).collect();
    let remote_token_keys: Vec<&String> = remote.rows().keys().filter(|k| is_token_key(k)).collect();

    let mut all_keys: Vec<&String> = local_token_keys.iter().copied().collect();
    for key in &remote_token_keys {
        if !all_keys.contains(key) {
            all_keys.push(key);
        }
    }

    for key in all_keys {
        let token_id = token_id_of(key);
        let local_row = local.row(key);
        let remote_row = remote.row(key);

        let current_row = local_row.or(remote_row).expect("key came from one side");
        let Some(state_hash) = row_state_hash(current_row) else {
            continue;
        };

        if is_tombstoned(token_id, &state_hash) {
            if local_row.is_some() {
                removed += 1;
            }
            continue;
        }

        match (local_row, remote_row) {
            (Some(l), Some(_)) => {
                merged_rows.insert(key.clone(), l.clone());
                conflicts += 1;
            }
            (None, Some(r)) => {
                merged_rows.insert(key.clone(), r.clone());
                added += 1;
            }
            (Some(l), None) => {
                merged_rows.insert(key.clone(), l.clone());
            }
            (None, None) => unreachable!("key must come from local or remote"),
        }
    }

    // Step 8: carry archived-*/_forked_* through by union, local-wins.
    for (key, value) in remote.rows().iter().filter(|(k, _)| is_archived_key(k) || is_forked_key(k)) {
        merged_rows.insert(key.clone(), value.clone());
    }
    for (key, value) in local.rows().iter().filter(|(k, _)| is_archived_key(k) || is_forked_key(k)) {
        merged_rows.insert(key.clone(), value.clone());
    }

    let mut merged = TokenStore::from_rows(merged_rows);
    merged.set_meta(&merged_meta)?;
    merged.set_tombstones(&tombstones.into_values().collect::<Vec<_>>())?;

    // Step 6: merge each category table by dedup key, local-wins.
    merged.set_outbox(&merge_dedup(
        local.outbox()?,
        remote.outbox()?,
        |e: &OutboxEntry| e.id.clone(),
    ))?;
    merged.set_sent(&merge_dedup(
        local.sent()?,
        remote.sent()?,
        |e: &SentEntry| e.token_id.clone(),
    ))?;
    merged.set_mint_outbox(&merge_dedup(
        local.mint_outbox()?,
        remote.mint_outbox()?,
        |e: &MintOutboxEntry| e.id.clone(),
    ))?;
    merged.set_invalid(&merge_dedup(
        local.invalid()?,
        remote.invalid()?,
        |e: &InvalidEntry| e.token_id.clone(),
    ))?;
    merged.set_invalidated_nametags(&merge_dedup(
        local.invalidated_nametags()?,
        remote.invalidated_nametags()?,
        |e: &InvalidatedNametag| e.name.clone(),
    ))?;

    let _ = now_ms; // reserved for a future `updatedAt` field on StoreMeta
    Ok(MergeOutcome {
        merged,
        added,
        removed,
        conflicts,
    })
}
