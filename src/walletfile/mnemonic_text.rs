//! # Mnemonic text envelope
//!
//! Recognises a bare mnemonic phrase pasted as a backup file: lower-case,
//! whitespace-split, exactly 12 or 24 alphabetic tokens, checksum-valid
//! (spec.md §4.6 "Mnemonic text").

use crate::crypto::validate_mnemonic;

/// True if `content` looks like a standalone mnemonic phrase.
///
/// Per spec.md §4.6: lower-case the input, split on whitespace, accept
/// exactly 12 or 24 tokens each matching `[a-z]+`, then validate against
/// BIP39. This does not mutate `content`; callers still pass the original
/// casing through to [`parse`].
pub fn looks_like_mnemonic(content: &str) -> bool {
    let lowered = content.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let word_count_ok = words.len() == 12 || words.len() == 24;
    let all_alphabetic = words
        .iter()
        .all(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_lowercase()));

    word_count_ok && all_alphabetic && validate_mnemonic(&lowered)
}

/// Extract the normalised (lower-cased, single-spaced) mnemonic phrase from
/// `content`, or `None` if it does not satisfy [`looks_like_mnemonic`].
pub fn parse(content: &str) -> Option<String> {
    if !looks_like_mnemonic(content) {
        return None;
    }
    Some(content.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREZOR_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn accepts_valid_twelve_word_phrase() {
        assert!(looks_like_mnemonic(TREZOR_MNEMONIC));
        assert_eq!(parse(TREZOR_MNEMONIC).as_deref(), Some(TREZOR_MNEMONIC));
    }

    #[test]
    fn accepts_mixed_case_and_extra_whitespace() {
        let messy = "Abandon  abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(looks_like_mnemonic(messy));
        assert_eq!(parse(messy).as_deref(), Some(TREZOR_MNEMONIC));
    }

    #[test]
    fn rejects_wrong_word_count() {
        assert!(!looks_like_mnemonic("abandon abandon abandon"));
    }

    #[test]
    fn rejects_non_alphabetic_tokens() {
        let with_digits = TREZOR_MNEMONIC.replace("about", "about1");
        assert!(!looks_like_mnemonic(&with_digits));
    }

    #[test]
    fn rejects_bad_checksum() {
        let bad = vec!["abandon"; 12].join(" ");
        assert!(!looks_like_mnemonic(&bad));
    }
}
