//! Article keys and the names under which data lives in the store.
//!
//! A key is derived from the article's title and author: the first character
//! of the author followed by the top ten bits of a 32-bit FNV-1a hash of
//! `title ++ author`, e.g. `R694` for ("UNIX", "Richie/Thompson").
//!
//! Only 1024 numeric suffixes exist per leading character, so two different
//! articles can map to the same key. Nothing detects this: inserting the second
//! article replaces the first one's record, and both share one rater set and one
//! leaderboard entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hash map holding every article record, keyed by [`ArticleKey`].
pub const ARTICLES: &str = "articles";

/// Prefix of the per-article rater sets (`ratings:<key>`).
pub const RATINGS_PREFIX: &str = "ratings:";

/// Sorted set mapping article keys to their running average rating.
pub const SCORES: &str = "scores";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Bits dropped from the hash; what remains fits in 0..=1023.
const SUFFIX_SHIFT: u32 = 22;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleKey(String);

impl ArticleKey {
    /// Derives the key for an article.
    ///
    /// An empty author has no leading character, so the key is just the
    /// numeric suffix.
    pub fn derive(title: &str, author: &str) -> Self {
        let hash = title
            .bytes()
            .chain(author.bytes())
            .fold(FNV_OFFSET_BASIS, fnv1a_step);
        let suffix = hash >> SUFFIX_SHIFT;

        match author.chars().next() {
            Some(initial) => Self(format!("{initial}{suffix}")),
            None => Self(suffix.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the set holding the accounts that rated this article.
    pub fn raters_key(&self) -> String {
        format!("{RATINGS_PREFIX}{}", self.0)
    }
}

fn fnv1a_step(hash: u32, byte: u8) -> u32 {
    (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArticleKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ArticleKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fnv1a(input: &str) -> u32 {
        input.bytes().fold(FNV_OFFSET_BASIS, fnv1a_step)
    }

    #[test]
    fn hash_matches_reference_vectors() {
        assert_eq!(fnv1a(""), 0x811c_9dc5);
        assert_eq!(fnv1a("a"), 0xe40c_292c);
        assert_eq!(fnv1a("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn derives_known_keys() {
        assert_eq!(ArticleKey::derive("UNIX", "Richie/Thompson").as_str(), "R694");
        assert_eq!(ArticleKey::derive("ETH", "Metcalfe/Boggs").as_str(), "M226");
        assert_eq!(ArticleKey::derive("CSP", "Hoare").as_str(), "H68");
        assert_eq!(ArticleKey::derive("RDB", "Codd").as_str(), "C389");
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = ArticleKey::derive("GoTo", "Dijkstra");
        let second = ArticleKey::derive("GoTo", "Dijkstra");
        assert_eq!(first, second);
    }

    #[test]
    fn different_articles_may_share_a_key() {
        assert_eq!(
            ArticleKey::derive("T5", "Codd"),
            ArticleKey::derive("T15", "Codd")
        );
    }

    #[test]
    fn empty_author_yields_bare_suffix() {
        assert_eq!(ArticleKey::derive("", "").as_str(), "516");
        assert_eq!(ArticleKey::derive("a", "").as_str(), "912");
    }

    #[test]
    fn leading_character_is_a_full_code_point() {
        let key = ArticleKey::derive("Paper", "Ærø");
        assert!(key.as_str().starts_with('Æ'));
    }

    #[test]
    fn raters_key_is_prefixed() {
        let key = ArticleKey::from("C884");
        assert_eq!(key.raters_key(), "ratings:C884");
    }
}
