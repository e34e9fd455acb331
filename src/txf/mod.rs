//! # TXF model and codec (C3, C5)

pub mod codec;
pub mod model;

pub use model::{
    count_committed_transactions, get_current_state_hash, has_missing_new_state_hash,
    has_uncommitted_transactions, Authenticator, CoinEntry, DisplayToken, Genesis, GenesisData,
    InclusionProof, Integrity, MerkleTreePath, TokenState, TokenStatus, TxfToken, TxfTransaction,
};
