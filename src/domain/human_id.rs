//! Short display identifiers
//!
//! Backend identifiers are 32-character hex strings. For display the CLI
//! shows a six character "human ID" derived from the end of the identifier:
//!
//! ```text
//! d67c1aba0b017a1c9372e726c6512a1f
//!                           ^^^^^^  last 6 chars "512a1f"
//!                                   reversed     "f1a215"
//!                                   uppercased   "F1A215"
//! ```
//!
//! The transform is one-way and lossy. Distinct identifiers (especially in
//! different projects) can collapse to the same human ID, so two equal human
//! IDs never prove the underlying identifiers match.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of an encoded human ID
pub const HUMAN_ID_LEN: usize = 6;

/// A short, uppercase, display-only identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HumanId(String);

impl HumanId {
    /// Derives the human ID for a backend identifier
    pub fn encode(remote_id: &str) -> Self {
        let chars: Vec<char> = remote_id.chars().collect();
        if chars.len() < HUMAN_ID_LEN {
            return Self(remote_id.to_uppercase());
        }

        let tail: String = chars[chars.len() - HUMAN_ID_LEN..].iter().rev().collect();
        Self(tail.to_uppercase())
    }

    /// Wraps user input, normalizing it for comparison
    pub fn from_input(input: &str) -> Self {
        Self(input.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fragment sent to the remote search endpoint.
    ///
    /// The backend matches identifiers ending with the fragment or its
    /// reverse, lowercase only.
    pub fn search_fragment(&self) -> String {
        self.0.to_lowercase()
    }

    /// Returns true if `remote_id` encodes to this human ID
    pub fn matches(&self, remote_id: &str) -> bool {
        Self::encode(remote_id) == *self
    }
}

/// Returns true if the input is short enough to be a human ID rather than a
/// full backend identifier
pub fn looks_like_human_id(input: &str) -> bool {
    let len = input.trim().chars().count();
    len > 0 && len <= HUMAN_ID_LEN
}

impl fmt::Display for HumanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for HumanId {
    fn from(value: String) -> Self {
        Self::from_input(&value)
    }
}

impl From<HumanId> for String {
    fn from(id: HumanId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_reverses_last_six() {
        assert_eq!(
            HumanId::encode("d67c1aba0b017a1c9372e726c6512a1f").as_str(),
            "F1A215"
        );
        assert_eq!(
            HumanId::encode("e4fcf23e74fe3a9c74dec23350b554cc").as_str(),
            "CC455B"
        );
    }

    #[test]
    fn encode_short_input_is_uppercased() {
        for s in ["", "a", "ab1", "abcde", "XyZ"] {
            assert_eq!(HumanId::encode(s).as_str(), s.to_uppercase());
        }
    }

    #[test]
    fn encode_exactly_six() {
        assert_eq!(HumanId::encode("abc123").as_str(), "321CBA");
    }

    #[test]
    fn encode_is_deterministic() {
        let id = "0123456789abcdef0123456789abcdef";
        assert_eq!(HumanId::encode(id), HumanId::encode(id));
    }

    #[test]
    fn encode_is_not_round_trippable() {
        let id = "d67c1aba0b017a1c9372e726c6512a1f";
        let once = HumanId::encode(id);
        let twice = HumanId::encode(once.as_str());

        assert_ne!(twice.as_str(), id);
        assert_ne!(twice, once);
        assert_eq!(twice.as_str(), "512A1F");
    }

    #[test]
    fn distinct_ids_can_collide() {
        let a = HumanId::encode("aaaaaaaaaaaaaaaaaaaaaaaaaa512a1f");
        let b = HumanId::encode("bbbbbbbbbbbbbbbbbbbbbbbbbb512a1f");
        assert_eq!(a, b);
    }

    #[test]
    fn input_is_case_insensitive() {
        let wanted = HumanId::from_input(" f1a215 ");
        assert_eq!(wanted.as_str(), "F1A215");
        assert_eq!(wanted.search_fragment(), "f1a215");
        assert!(wanted.matches("d67c1aba0b017a1c9372e726c6512a1f"));
        assert!(!wanted.matches("d67c1aba0b017a1c9372e726c6512a1e"));
    }

    #[test]
    fn human_id_detection() {
        assert!(looks_like_human_id("CC455B"));
        assert!(looks_like_human_id("abc"));
        assert!(!looks_like_human_id(""));
        assert!(!looks_like_human_id("e4fcf23e74fe3a9c74dec23350b554cc"));
    }

    #[test]
    fn serde_normalizes_case() {
        let id: HumanId = serde_json::from_str("\"cc455b\"").unwrap();
        assert_eq!(id.as_str(), "CC455B");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CC455B\"");
    }
}
