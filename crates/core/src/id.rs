use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest identifier accepted. Four characters are needed for the two-level
/// directory sharding used by the filesystem backend and the thumbnail cache.
pub const MIN_ID_LEN: usize = 4;

/// Longest identifier accepted.
pub const MAX_ID_LEN: usize = 128;

/// Returned by [`ContentId::parse`] for strings that cannot name an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid content identifier '{value}': {reason}")]
pub struct InvalidContentId {
    /// The rejected input.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Content-derived identifier of an attachment.
///
/// Produced by a content store at ingest time (a SHA-256 hex digest for the
/// filesystem backend, a CID for IPFS) and never mutated afterwards. Only
/// ASCII alphanumerics are allowed so an identifier is always safe to use as
/// a path component or a key suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Validate and wrap an identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidContentId> {
        let value = value.into();
        if value.len() < MIN_ID_LEN {
            return Err(InvalidContentId {
                value,
                reason: "too short",
            });
        }
        if value.len() > MAX_ID_LEN {
            return Err(InvalidContentId {
                value,
                reason: "too long",
            });
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(InvalidContentId {
                value,
                reason: "only ASCII letters and digits are allowed",
            });
        }
        Ok(Self(value))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two shard segments derived from the identifier: characters
    /// `[0..2]` and `[2..4]`.
    #[must_use]
    pub fn shards(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = InvalidContentId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for ContentId {
    type Error = InvalidContentId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sha256_hex() {
        let hex = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        let id = ContentId::parse(hex).unwrap();
        assert_eq!(id.as_str(), hex);
        assert_eq!(id.shards(), ("9f", "86"));
    }

    #[test]
    fn accepts_ipfs_cid() {
        let id = ContentId::parse("QmTeHHV878utbtigQ8FeNPJ1rNqNXEPHTN9KWwF78hMYpf").unwrap();
        assert_eq!(id.shards(), ("Qm", "Te"));
    }

    #[test]
    fn rejects_path_traversal() {
        let err = ContentId::parse("../../etc/passwd").unwrap_err();
        assert_eq!(err.reason, "only ASCII letters and digits are allowed");
    }

    #[test]
    fn rejects_short_and_long() {
        assert!(ContentId::parse("abc").is_err());
        assert!(ContentId::parse("a".repeat(MAX_ID_LEN + 1)).is_err());
        assert!(ContentId::parse("a".repeat(MAX_ID_LEN)).is_ok());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: ContentId = serde_json::from_str("\"abcd1234\"").unwrap();
        assert_eq!(ok.as_str(), "abcd1234");
        assert!(serde_json::from_str::<ContentId>("\"a/b/c/d\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"abcd1234\"");
    }
}
