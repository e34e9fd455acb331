//! # Wallet-file detection dispatcher
//!
//! Detection is by filename suffix first, content sniff second (spec.md
//! §4.6). Only the content sniff is modeled here — the caller is
//! responsible for any filename-suffix fast path before falling back to
//! this.

use super::{dat_backup, json_backup, mnemonic_text, text_backup};

/// The detected envelope kind (spec.md §8 S5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFileType {
    Dat,
    Txt,
    Mnemonic,
    Json,
    Unknown,
}

/// Sniff `bytes` (and, for text formats, its UTF-8 decoding) to classify
/// the backup envelope. `filename` is accepted for parity with the
/// source's `detectLegacyFileType(filename, bytes)` signature but the
/// content sniff always takes precedence, matching spec.md §8 S5's test
/// vectors (which key purely off byte/string content).
pub fn detect_legacy_file_type(_filename: &str, bytes: &[u8]) -> LegacyFileType {
    if dat_backup::is_sqlite_file(bytes) {
        return LegacyFileType::Dat;
    }

    let Ok(text) = std::str::from_utf8(bytes) else {
        return LegacyFileType::Unknown;
    };

    if text_backup::looks_like_text_backup(text) {
        return LegacyFileType::Txt;
    }
    if json_backup::looks_like_json_backup(text) {
        return LegacyFileType::Json;
    }
    if mnemonic_text::looks_like_mnemonic(text) {
        return LegacyFileType::Mnemonic;
    }
    LegacyFileType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SQLITE_MAGIC;

    #[test]
    fn s5_sqlite_magic_detects_dat() {
        let mut bytes = SQLITE_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest of file");
        assert_eq!(detect_legacy_file_type("x.dat", &bytes), LegacyFileType::Dat);
    }

    #[test]
    fn s5_unicity_marker_detects_txt() {
        let content = "UNICITY WALLET DETAILS\nMASTER PRIVATE KEY (keep secret!): deadbeef\n";
        assert_eq!(
            detect_legacy_file_type("x.txt", content.as_bytes()),
            LegacyFileType::Txt
        );
    }

    #[test]
    fn s5_twelve_lowercase_words_detect_mnemonic() {
        let content = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert_eq!(
            detect_legacy_file_type("seed.txt", content.as_bytes()),
            LegacyFileType::Mnemonic
        );
    }

    #[test]
    fn detects_json_backup() {
        let content = r#"{"version":"1.0","type":"sphere-wallet"}"#;
        assert_eq!(
            detect_legacy_file_type("backup.json", content.as_bytes()),
            LegacyFileType::Json
        );
    }

    #[test]
    fn unrecognised_content_is_unknown() {
        assert_eq!(
            detect_legacy_file_type("x.bin", b"just some bytes"),
            LegacyFileType::Unknown
        );
    }
}
