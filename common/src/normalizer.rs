//! Name normalization
//!
//! Turns product names and image filenames into comparable keys.
//!
//! ## Pipeline
//! 1. lowercase
//! 2. strip everything outside `[a-z0-9\s]`
//! 3. collapse whitespace runs, trim
//!
//! `tokenize` builds on the normalized form and drops short connector words
//! so that "Rice & Peas" and "rice and peas" produce the same token set.

use lazy_static::lazy_static;
use regex::Regex;

/// Tokens of this length or shorter are discarded by default.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Connector words that survive the length filter but carry no meaning.
const STOP_WORDS: &[&str] = &["and", "the", "with", "for", "from"];

lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9\s]").expect("invalid regex");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("invalid regex");
}

/// Normalize a display name or filename into a matching key.
///
/// Total and pure: empty or punctuation-only input yields `""`.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NON_ALNUM_RE.replace_all(&lower, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Split the normalized form into meaningful tokens.
///
/// # Arguments
/// * `text` - raw name or filename stem
/// * `min_len` - tokens with `len <= min_len` are dropped
///
/// # Returns
/// Tokens in first-seen order, without duplicates.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    let normalized = normalize(text);
    let mut tokens: Vec<String> = Vec::new();

    for token in normalized.split(' ') {
        if token.chars().count() <= min_len || STOP_WORDS.contains(&token) {
            continue;
        }
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }

    tokens
}

/// Two tokens are related when equal or when one contains the other
/// ("plantain" / "plantains").
pub fn tokens_related(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(b) || b.contains(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Apple Cider Vinegar"), "apple cider vinegar");
        assert_eq!(normalize("  Grace   Cock-Soup  Mix! "), "grace cocksoup mix");
    }

    #[test]
    fn test_normalize_keeps_digits() {
        assert_eq!(normalize("Malta Goya 12oz (6-Pack)"), "malta goya 12oz 6pack");
    }

    #[test]
    fn test_normalize_punctuation_only_is_empty() {
        assert_eq!(normalize("!!!---..."), "");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    #[test]
    fn test_normalize_filename_with_extension() {
        assert_eq!(normalize("Apple Cider Vinegar.jpg"), "apple cider vinegarjpg");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("Ackee & Saltfish (Canned)");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_tokenize_drops_short_and_stop_words() {
        let tokens = tokenize("Rice and Peas with a Twist", DEFAULT_MIN_TOKEN_LEN);
        assert_eq!(tokens, vec!["rice", "peas", "twist"]);
    }

    #[test]
    fn test_tokenize_threshold_is_configurable() {
        let tokens = tokenize("Ox Tail Mix", 1);
        assert_eq!(tokens, vec!["ox", "tail", "mix"]);
        let tokens = tokenize("Ox Tail Mix", 3);
        assert_eq!(tokens, vec!["tail"]);
    }

    #[test]
    fn test_tokenize_deduplicates() {
        let tokens = tokenize("Hot Hot Pepper Sauce", DEFAULT_MIN_TOKEN_LEN);
        assert_eq!(tokens, vec!["hot", "pepper", "sauce"]);
    }

    #[test]
    fn test_tokens_related() {
        assert!(tokens_related("plantain", "plantains"));
        assert!(tokens_related("plantains", "plantain"));
        assert!(tokens_related("yam", "yam"));
        assert!(!tokens_related("yam", "cassava"));
        assert!(!tokens_related("", "yam"));
    }
}
