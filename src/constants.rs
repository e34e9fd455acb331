//! Fixed protocol constants that are not user-configurable.
//!
//! Values a caller might reasonably want to change live in [`crate::config`]
//! instead.

/// Default bech32 human-readable prefix for derived addresses.
pub(crate) const DEFAULT_ADDRESS_PREFIX: &str = "alpha";

/// Default BIP32 base path (receiving/change chains hang off this).
pub(crate) const DEFAULT_BASE_PATH: &str = "m/44'/0'/0'";

/// PBKDF2-HMAC-SHA512 iteration count for `mnemonicToSeed` (fixed by BIP39).
pub(crate) const BIP39_SEED_ITERATIONS: u32 = 2048;

/// Default PBKDF2-HMAC-SHA256 iteration count for the structured JSON envelope.
pub(crate) const DEFAULT_ENVELOPE_ITERATIONS: u32 = 100_000;

/// Salt/IV length (bytes) for the structured envelope.
pub(crate) const ENVELOPE_SALT_LEN: usize = 16;
pub(crate) const ENVELOPE_IV_LEN: usize = 16;

/// Derived key length (bytes) for AES-256.
pub(crate) const AES_256_KEY_LEN: usize = 32;

/// Legacy `.txt` backup: PBKDF2-HMAC-SHA1 iteration count and fixed salt.
pub(crate) const TEXT_BACKUP_ITERATIONS: u32 = 100_000;
pub(crate) const TEXT_BACKUP_SALT: &str = "alpha_wallet_salt";

/// Legacy `.txt` backup: default descriptor path when none is given.
pub(crate) const TEXT_BACKUP_DEFAULT_PATH: &str = "84'/1'/0'";

/// SQLite file magic, used to sniff `.dat` backups.
pub(crate) const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Marker preceding a `CMasterKey` record inside a `.dat` backup.
pub(crate) const DAT_MKEY_MARKER: &[u8; 4] = b"mkey";

/// Default sync-engine write-behind debounce window.
pub(crate) const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 250;

/// Default cap on concurrent in-flight operations (mirrors the SDK client's
/// own outbound-submission semaphore).
pub(crate) const DEFAULT_CONCURRENCY: usize = 64;

/// Store format version written to `_meta.formatVersion`.
pub(crate) const STORE_FORMAT_VERSION: &str = "2.0";

/// TXF schema version written to `token.version`.
pub(crate) const TXF_VERSION: &str = "2.0";

/// Hex-encoded token-type hash the store recognises as the one hard-coded NFT type.
pub(crate) const NFT_TOKEN_TYPE_HASH: &str =
    "a3f1f1c1e6c1b1a1d1e1f1a1b1c1d1e1f1a1b1c1d1e1f1a1b1c1d1e1f1a1b1c1";

/// Default decimals/symbol for any token type other than [`NFT_TOKEN_TYPE_HASH`].
pub(crate) const DEFAULT_TOKEN_DECIMALS: u8 = 8;
pub(crate) const DEFAULT_TOKEN_SYMBOL: &str = "UCT";
